use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Socket address to bind (default: 127.0.0.1:8321).
    pub bind_addr: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the roster TOML file.
    pub roster_path: PathBuf,
    /// Euclidean distance at or below which a gallery entry is a match.
    pub match_tolerance: f32,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("ROLLCALL_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8321".to_string()),
            model_dir: std::env::var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            roster_path: std::env::var("ROLLCALL_ROSTER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("roster.toml")),
            match_tolerance: env_f32("ROLLCALL_MATCH_TOLERANCE", rollcall_core::DEFAULT_TOLERANCE),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face embedder model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("mobilefacenet.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
