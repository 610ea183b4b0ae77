mod config;
mod embeddings;
mod logging;
mod model_paths;

use std::io::Read;

use anyhow::{bail, Context};
use serde::Serialize;

#[derive(Serialize)]
struct EmbedPayload {
    embedding: Vec<f32>,
}

fn main() {
    if let Err(e) = real_main() {
        // Stdout stays clean for the JSON payload; errors go to stderr + log file.
        eprintln!("[lora-embed] fatal error: {e:?}");
        log::error!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    logging::init_logging()?;

    let args: Vec<String> = std::env::args().collect();
    let text = read_input_text(&args)?;

    let model_name = read_arg_value(&args, "--model").unwrap_or_default();
    let models_root = model_paths::models_root(read_arg_value(&args, "--models-root").as_deref())?;
    log::info!("Models root: {}", models_root.display());

    let engine = embeddings::engine::load_for_model(&models_root, &model_name)?;
    let embedding = engine.embed(&text).context("embed query")?;
    log::info!("Embedded {} chars into {} dims", text.len(), embedding.len());

    let payload = EmbedPayload { embedding };
    println!("{}", serde_json::to_string(&payload).context("serialize embedding")?);
    Ok(())
}

/// Query text from --text, falling back to stdin. Empty input (after
/// trimming) is a fatal input error; nothing is printed on stdout.
fn read_input_text(args: &[String]) -> anyhow::Result<String> {
    let mut text = read_arg_value(args, "--text").unwrap_or_default().trim().to_string();
    if text.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read query text from stdin")?;
        text = buf.trim().to_string();
    }
    if text.is_empty() {
        bail!("missing input text (pass --text or pipe it on stdin)");
    }
    Ok(text)
}

fn read_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
