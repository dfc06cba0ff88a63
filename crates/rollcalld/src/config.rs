use std::path::PathBuf;

/// Daemon configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// TCP address the HTTP API binds to.
    pub listen_addr: String,
    /// Path to the roster backing file.
    pub roster_path: PathBuf,
    /// Directory of enrollment photos for dataset rebuilds.
    pub dataset_dir: PathBuf,
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// TTF font used for image annotation.
    pub font_path: PathBuf,
    /// Default match tolerance when a request does not supply one.
    pub tolerance: f32,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        Self {
            listen_addr: std::env::var("ROLLCALL_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            roster_path: env_path("ROLLCALL_ROSTER_PATH", data_dir.join("roster.bin")),
            dataset_dir: env_path("ROLLCALL_DATASET_DIR", data_dir.join("dataset")),
            db_path: env_path("ROLLCALL_DB_PATH", data_dir.join("attendance.db")),
            model_dir: env_path("ROLLCALL_MODEL_DIR", data_dir.join("models")),
            font_path: env_path("ROLLCALL_FONT_PATH", data_dir.join("DejaVuSans.ttf")),
            tolerance: env_f32("ROLLCALL_TOLERANCE", 0.5),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
