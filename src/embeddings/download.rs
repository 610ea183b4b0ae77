// download.rs — Base-model file download with SHA256 sidecar verification.
//
// Fetches missing base-model files from Hugging Face on first use, caches
// them under the models root. There is no compile-time hash pin for an
// arbitrary repo, so each file's SHA256 is recorded in a `.sha256` sidecar
// on first fetch and re-verified on every later load.

use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};

use crate::config;
use crate::model_paths;

/// Ensure the base model's files exist (and verify cached ones).
/// Returns the base model directory under the models root.
pub fn ensure_base_model_files(models_root: &Path, repo_id: &str) -> anyhow::Result<PathBuf> {
    let dir = models_root.join(model_paths::base_model_dir_name(repo_id));

    let missing: Vec<&str> = config::download::BASE_MODEL_FILES
        .iter()
        .copied()
        .filter(|f| !dir.join(f).exists())
        .collect();

    if missing.is_empty() {
        for file in config::download::BASE_MODEL_FILES {
            verify_cached_file(&dir.join(file))?;
        }
        log::info!("Base model files cached at {}", dir.display());
        return Ok(dir);
    }

    // Repo ids without an org (e.g. the bare fallback name) are not fetchable;
    // those models must be provisioned locally.
    if !repo_id.contains('/') {
        bail!(
            "base model directory {} is incomplete (missing {}) and {repo_id:?} is not a downloadable repo id",
            dir.display(),
            missing.join(", ")
        );
    }

    log::info!("Downloading base model {} to {}", repo_id, dir.display());
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create model dir {}", dir.display()))?;

    for file in missing {
        let url = format!("{}/{}/resolve/main/{}", config::download::HF_RESOLVE_BASE, repo_id, file);
        download_and_record(&url, &dir.join(file))?;
    }

    log::info!("Base model download complete");
    Ok(dir)
}

/// Download a file, sanity-check it, record its SHA256 sidecar, write atomically.
fn download_and_record(url: &str, dest: &Path) -> anyhow::Result<()> {
    let filename = dest.file_name().unwrap_or_default().to_string_lossy().to_string();
    log::info!("Downloading {} from {}", filename, url);

    let resp = ureq::get(url)
        .timeout(std::time::Duration::from_secs(config::download::DOWNLOAD_TIMEOUT_SECS))
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    let status = resp.status();
    if status != 200 {
        bail!("HTTP {status} downloading {url}");
    }

    let mut body = Vec::new();
    resp.into_reader()
        .read_to_end(&mut body)
        .with_context(|| format!("failed to read response body for {url}"))?;

    // A weights file that does not parse must never land in the cache.
    if filename.ends_with(".safetensors") {
        safetensors::SafeTensors::deserialize(&body)
            .with_context(|| format!("downloaded {filename} is not a valid safetensors file"))?;
    }

    let hash = hex::encode(Sha256::digest(&body));
    log::info!("SHA256 for {} is {}", filename, &hash[..12]);

    // Write atomically: write to .tmp, then rename
    let tmp_path = dest.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    file.write_all(&body)?;
    file.flush()?;
    drop(file);

    fs::rename(&tmp_path, dest)
        .with_context(|| format!("failed to rename {} -> {}", tmp_path.display(), dest.display()))?;

    fs::write(sidecar_path(dest), &hash)
        .with_context(|| format!("failed to write sha256 sidecar for {}", dest.display()))?;

    Ok(())
}

/// Verify a cached file against its SHA256 sidecar.
/// Files provisioned by hand have no sidecar; those are accepted as-is.
fn verify_cached_file(path: &Path) -> anyhow::Result<()> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        log::debug!("No sha256 sidecar for {}, skipping verification", path.display());
        return Ok(());
    }

    let expected = fs::read_to_string(&sidecar)
        .with_context(|| format!("read {}", sidecar.display()))?
        .trim()
        .to_string();
    let body = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let actual = hex::encode(Sha256::digest(&body));

    if actual != expected {
        bail!(
            "SHA256 mismatch for {}: expected {}, got {} (cached file corrupted?)",
            path.display(),
            expected,
            actual
        );
    }
    Ok(())
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".sha256");
    path.with_file_name(name)
}
