// embeddings/ — Local sentence embedding with a LoRA adapter, using candle (pure Rust).
//
// Provides:
// - Base-model download + SHA256 sidecar verification
// - LoRA adapter config parsing and merge-at-load
// - BERT inference with mask-aware mean pooling + L2 normalization

pub mod download;
pub mod engine;
pub mod lora;
pub mod pooling;
