// model_paths.rs — Models-root resolution and model-name validation.
//
// Model names are untrusted CLI input and become directory names under the
// models root; anything that is not a bare directory name is rejected before
// we touch the filesystem.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::config;

/// Resolve the models root: --models-root flag, then LORA_EMBED_MODELS_ROOT,
/// then `models/` next to the executable.
pub fn models_root(cli_override: Option<&str>) -> anyhow::Result<PathBuf> {
    if let Some(p) = cli_override {
        return Ok(PathBuf::from(p));
    }
    if let Ok(v) = std::env::var(config::models::MODELS_ROOT_ENV) {
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    let exe = std::env::current_exe().context("cannot determine executable path")?;
    let exe_dir = exe.parent().context("executable has no parent directory")?;
    Ok(exe_dir.join(config::models::MODELS_DIR_REL))
}

/// Validate a model name and apply the default for empty input.
///
/// Accepted: a single bare directory name. Rejected: names containing a path
/// separator, `.` or `..`, and anything else that does not round-trip through
/// `Path::file_name` (absolute paths, trailing separators, drive prefixes).
pub fn validate_model_name(raw: &str) -> anyhow::Result<String> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Ok(config::models::DEFAULT_MODEL.to_string());
    }
    if cleaned == "." || cleaned == ".." || cleaned.chars().any(std::path::is_separator) {
        bail!("invalid model name: {cleaned:?}");
    }
    match Path::new(cleaned).file_name() {
        Some(f) if f == cleaned => Ok(cleaned.to_string()),
        _ => bail!("invalid model name: {cleaned:?}"),
    }
}

/// Resolve the LoRA adapter directory for a validated model name.
pub fn resolve_adapter_dir(root: &Path, model_name: &str) -> anyhow::Result<PathBuf> {
    let name = validate_model_name(model_name)?;
    let dir = root.join(&name);
    if !dir.is_dir() {
        bail!("missing LoRA directory: {}", dir.display());
    }
    Ok(dir)
}

/// Directory name for a base-model repo id under the models root.
/// Hugging Face repo ids contain a slash (`org/name`); map it so the files
/// cache under one flat directory per model.
pub fn base_model_dir_name(repo_id: &str) -> String {
    repo_id.replace('/', "--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_falls_back_to_default() {
        assert_eq!(validate_model_name("").unwrap(), config::models::DEFAULT_MODEL);
        assert_eq!(validate_model_name("   ").unwrap(), config::models::DEFAULT_MODEL);
    }

    #[test]
    fn test_bare_name_accepted() {
        assert_eq!(validate_model_name("epoch_11_75k_data").unwrap(), "epoch_11_75k_data");
        assert_eq!(validate_model_name(" my-model ").unwrap(), "my-model");
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(validate_model_name("../evil").is_err());
        assert!(validate_model_name("..").is_err());
        assert!(validate_model_name(".").is_err());
        assert!(validate_model_name("a/b").is_err());
        assert!(validate_model_name("/abs").is_err());
    }

    #[test]
    fn test_resolve_rejects_before_fs_access() {
        // Root does not exist; invalid names must fail on the name, not the path.
        let err = resolve_adapter_dir(Path::new("/nonexistent-root"), "../evil").unwrap_err();
        assert!(err.to_string().contains("invalid model name"));
    }

    #[test]
    fn test_base_model_dir_name() {
        assert_eq!(base_model_dir_name("nomic-ai/nomic-embed-text-v1"), "nomic-ai--nomic-embed-text-v1");
        assert_eq!(base_model_dir_name("nomic-embed-text"), "nomic-embed-text");
    }
}
