// End-to-end CLI checks that need no model files: the failure paths must
// trigger before any model loading and must leave stdout empty.

use assert_cmd::Command;
use predicates::prelude::*;

fn lora_embed() -> Command {
    Command::cargo_bin("lora-embed").unwrap()
}

fn empty_models_root(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("lora-embed-cli-{tag}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn empty_input_is_a_fatal_input_error() {
    lora_embed()
        .write_stdin("")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing input text"));
}

#[test]
fn whitespace_only_input_is_rejected() {
    lora_embed()
        .args(["--text", "   "])
        .write_stdin("  \n\t ")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing input text"));
}

#[test]
fn path_traversal_model_name_is_rejected_before_model_loading() {
    let root = empty_models_root("traversal");
    lora_embed()
        .args(["--text", "hello world", "--model", "../evil"])
        .args(["--models-root", root.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("invalid model name"));
}

#[test]
fn absolute_model_name_is_rejected() {
    let root = empty_models_root("absolute");
    lora_embed()
        .args(["--text", "hello world", "--model", "/etc/passwd"])
        .args(["--models-root", root.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid model name"));
}

#[test]
fn missing_adapter_directory_is_a_config_error() {
    let root = empty_models_root("missing-adapter");
    lora_embed()
        .args(["--text", "hello world", "--model", "no-such-adapter"])
        .args(["--models-root", root.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing LoRA directory"));
}

#[test]
fn models_root_env_var_is_honored() {
    let root = empty_models_root("env-root");
    lora_embed()
        .env("LORA_EMBED_MODELS_ROOT", root.to_str().unwrap())
        .args(["--text", "hello world", "--model", "no-such-adapter"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing LoRA directory"));
}
