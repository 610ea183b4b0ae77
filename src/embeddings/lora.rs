// lora.rs — LoRA adapter loading and merge-at-load.
//
// Adapters are PEFT-style: adapter_config.json plus adapter_model.safetensors
// holding lora_A/lora_B pairs per target module. We merge each pair into the
// base weight before the model is built (W' = W + B·A·alpha/r), so the
// forward pass runs over fused weights and needs no adapter-aware layers.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context};
use candle_core::{DType, Device, Tensor};
use serde::Deserialize;

use crate::config;

/// The subset of PEFT's adapter_config.json this tool reads.
#[derive(Debug, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    base_model_name_or_path: Option<String>,
    #[serde(default)]
    base_model_name: Option<String>,
    #[serde(default = "default_rank")]
    pub r: usize,
    #[serde(default = "default_alpha")]
    pub lora_alpha: f64,
}

// PEFT defaults, used when the config omits the fields.
fn default_rank() -> usize {
    8
}

fn default_alpha() -> f64 {
    8.0
}

impl AdapterConfig {
    /// Base model repo id: `base_model_name_or_path`, then the legacy
    /// `base_model_name` key, then the compiled-in fallback.
    pub fn base_model_name(&self) -> &str {
        self.base_model_name_or_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.base_model_name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(config::models::BASE_MODEL_FALLBACK)
    }

    pub fn scaling(&self) -> anyhow::Result<f64> {
        ensure!(self.r >= 1, "adapter config: rank must be >= 1, got {}", self.r);
        Ok(self.lora_alpha / self.r as f64)
    }
}

/// Parse adapter_config.json from the adapter directory.
/// A missing file is not an error (the base fallback applies); a present but
/// unparsable file is.
pub fn load_adapter_config(adapter_dir: &Path) -> anyhow::Result<Option<AdapterConfig>> {
    let path = adapter_dir.join(config::models::ADAPTER_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AdapterConfig =
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(cfg))
}

/// Load the adapter weight tensors (F32, CPU).
pub fn load_adapter_tensors(adapter_dir: &Path, device: &Device) -> anyhow::Result<HashMap<String, Tensor>> {
    let path = adapter_dir.join(config::models::ADAPTER_WEIGHTS_FILE);
    if !path.exists() {
        bail!("missing adapter weights: {}", path.display());
    }
    candle_core::safetensors::load(&path, device)
        .with_context(|| format!("load adapter tensors from {}", path.display()))
}

/// Map an adapter lora_A key to the base weight key it patches.
///
/// `base_model.model.encoder.layer.0.attention.self.query.lora_A.weight`
/// → `encoder.layer.0.attention.self.query.weight`
fn base_weight_key(adapter_key: &str) -> Option<String> {
    let stem = adapter_key.strip_suffix(".lora_A.weight")?;
    let stem = stem
        .strip_prefix("base_model.model.")
        .or_else(|| stem.strip_prefix("base_model."))
        .unwrap_or(stem);
    Some(format!("{stem}.weight"))
}

/// Merge every lora_A/lora_B pair into the base tensor map.
/// Returns the number of patched modules.
pub fn merge_adapter(
    base: &mut HashMap<String, Tensor>,
    adapter: &HashMap<String, Tensor>,
    scaling: f64,
) -> anyhow::Result<usize> {
    let mut merged = 0;
    // Deterministic order keeps float accumulation (and logs) reproducible.
    let mut a_keys: Vec<&String> = adapter.keys().filter(|k| k.ends_with(".lora_A.weight")).collect();
    a_keys.sort();

    for a_key in a_keys {
        let b_key = a_key.replace(".lora_A.weight", ".lora_B.weight");
        let lora_a = &adapter[a_key.as_str()];
        let lora_b = adapter
            .get(&b_key)
            .with_context(|| format!("adapter tensor {a_key} has no matching {b_key}"))?;

        let target = base_weight_key(a_key)
            .with_context(|| format!("cannot derive base weight key from {a_key}"))?;
        let weight = base
            .get(&target)
            .with_context(|| format!("adapter patches {target}, which the base model does not have"))?;

        // [out, r] x [r, in] -> [out, in], same shape as the base weight.
        let delta = lora_b
            .to_dtype(DType::F32)?
            .matmul(&lora_a.to_dtype(DType::F32)?)
            .with_context(|| format!("lora delta matmul for {target}"))?;
        ensure!(
            delta.dims() == weight.dims(),
            "lora delta shape {:?} does not match base weight {target} shape {:?}",
            delta.dims(),
            weight.dims()
        );
        let patched = (weight.to_dtype(DType::F32)? + delta.affine(scaling, 0.0)?)?;
        base.insert(target, patched);
        merged += 1;
    }

    if merged == 0 {
        bail!("adapter contains no lora_A/lora_B tensor pairs");
    }
    Ok(merged)
}
