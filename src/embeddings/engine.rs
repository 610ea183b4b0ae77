// engine.rs — Candle BERT embedding engine with a LoRA adapter merged at load.
//
// Loads the base model from safetensors, fuses the adapter's low-rank deltas
// into the base weights, and generates one sentence embedding per call via
// attention-mask-aware mean pooling + L2 normalization.

use std::path::Path;

use anyhow::{bail, Context};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::config;
use crate::embeddings::{download, lora, pooling};
use crate::model_paths;

/// The embedding engine holds the loaded (LoRA-merged) model and tokenizer.
pub struct EmbeddingEngine {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

impl EmbeddingEngine {
    /// Load the adapter from `adapter_dir` on top of the base model it names.
    /// Base model files live under (or are fetched into) `models_root`.
    pub fn load(adapter_dir: &Path, models_root: &Path) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        let adapter_config = lora::load_adapter_config(adapter_dir)?;
        let base_name = adapter_config
            .as_ref()
            .map(|c| c.base_model_name().to_string())
            .unwrap_or_else(|| config::models::BASE_MODEL_FALLBACK.to_string());
        log::info!("Adapter {} on base model {}", adapter_dir.display(), base_name);

        let base_dir = download::ensure_base_model_files(models_root, &base_name)?;

        // Load config.json
        let config_path = base_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let bert_config: BertConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("parse {}", config_path.display()))?;

        log::info!(
            "Loading base model: hidden_size={}, layers={}, heads={}",
            bert_config.hidden_size,
            bert_config.num_hidden_layers,
            bert_config.num_attention_heads,
        );

        // Base weights as a plain tensor map so the adapter can patch them
        // before the model is built.
        let weights_path = base_dir.join("model.safetensors");
        let mut tensors = candle_core::safetensors::load(&weights_path, &device)
            .with_context(|| format!("load weights from {}", weights_path.display()))?;

        let adapter_tensors = lora::load_adapter_tensors(adapter_dir, &device)?;
        let scaling = match &adapter_config {
            Some(cfg) => cfg.scaling()?,
            None => 1.0,
        };
        let merged = lora::merge_adapter(&mut tensors, &adapter_tensors, scaling)
            .context("merge LoRA adapter into base weights")?;
        log::info!("Merged LoRA deltas into {merged} modules (scaling={scaling})");

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = BertModel::load(vb, &bert_config).context("load BERT model")?;

        // Tokenizer: adapter dir first (fine-tunes may ship their own), base dir otherwise.
        let tokenizer_path = [adapter_dir.join("tokenizer.json"), base_dir.join("tokenizer.json")]
            .into_iter()
            .find(|p| p.exists())
            .with_context(|| format!("no tokenizer.json in {} or {}", adapter_dir.display(), base_dir.display()))?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer {}: {e}", tokenizer_path.display()))?;

        log::info!("Embedding model loaded (dims={})", bert_config.hidden_size);

        Ok(Self {
            model,
            tokenizer,
            device,
            hidden_size: bert_config.hidden_size,
        })
    }

    /// Generate a unit-norm sentence embedding for the given text.
    pub fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let token_ids = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();

        // Truncate to MAX_TOKENS if needed
        let len = token_ids.len().min(config::embedding::MAX_TOKENS);
        if len == 0 {
            bail!("tokenizer produced no tokens");
        }
        let token_ids = &token_ids[..len];
        let attention_mask = &attention_mask[..len];

        // Create tensors [1, seq_len]
        let token_ids_t = Tensor::new(
            token_ids.iter().map(|&id| id as i64).collect::<Vec<_>>().as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let attention_mask_t = Tensor::new(
            attention_mask.iter().map(|&m| m as i64).collect::<Vec<_>>().as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let token_type_ids = token_ids_t.zeros_like()?;

        // Forward pass → [1, seq_len, hidden_size]
        let output = self
            .model
            .forward(&token_ids_t, &token_type_ids, Some(&attention_mask_t))?;

        // Pull the hidden states out as explicit rows; pooling works on plain
        // containers rather than tensor broadcasting.
        let token_rows: Vec<Vec<f32>> = output.squeeze(0)?.to_vec2()?;

        let pooled = pooling::mean_pool(&token_rows, Some(attention_mask))?;
        let embedding = pooling::l2_normalize(&pooled);

        if embedding.len() != self.hidden_size {
            bail!(
                "unexpected embedding dims: got {}, expected {}",
                embedding.len(),
                self.hidden_size
            );
        }

        Ok(embedding)
    }
}

/// Resolve and load the engine for a validated model name.
pub fn load_for_model(models_root: &Path, model_name: &str) -> anyhow::Result<EmbeddingEngine> {
    let adapter_dir = model_paths::resolve_adapter_dir(models_root, model_name)?;
    EmbeddingEngine::load(&adapter_dir, models_root)
}
