// IMPORTANT:
// Keep ALL numeric values centralized here (repo rule: no hardcoded numeric values scattered around).

// NOTE: TOOL_VERSION must stay in sync with the `version` field in Cargo.toml.
pub const TOOL_VERSION: &str = "0.2.0";

pub mod logging {
    pub const LOG_DIR_REL: &str = ".lora-embed/logs";
    pub const LOG_FILE_NAME: &str = "lora_embed.log";

    pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const LOG_ROTATE_KEEP_FILES: usize = 5;
}

pub mod models {
    /// Adapter directory used when no --model argument is given.
    pub const DEFAULT_MODEL: &str = "epoch_11_75k_data";

    /// Base model assumed when adapter_config.json is missing or names none.
    pub const BASE_MODEL_FALLBACK: &str = "nomic-embed-text";

    /// Models root directory, relative to the executable.
    pub const MODELS_DIR_REL: &str = "models";

    /// Env var overriding the models root (same effect as --models-root).
    pub const MODELS_ROOT_ENV: &str = "LORA_EMBED_MODELS_ROOT";

    pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
    pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.safetensors";
}

pub mod embedding {
    /// Max word-piece tokens per input. Longer inputs are truncated by the
    /// tokenizer before the forward pass.
    pub const MAX_TOKENS: usize = 256;

    /// Floor for the mean-pooling divisor (count of unmasked tokens).
    /// Matches the reference tool's clamp(min=1e-9); only guards div-by-zero.
    pub const MEAN_POOL_EPS: f32 = 1e-9;

    /// Floor for the L2 norm divisor. Matches torch F.normalize's default.
    pub const L2_NORM_EPS: f32 = 1e-12;
}

pub mod download {
    /// Base URL for fetching missing base-model files by repo id.
    pub const HF_RESOLVE_BASE: &str = "https://huggingface.co";

    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 90;

    /// Files a base-model directory must contain.
    pub const BASE_MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];
}
