//! Daemon configuration from environment variables.
//!
//! Everything has a sensible default under the user's data directory;
//! `VIGIL_*` variables override individual paths and tuning knobs.

use std::path::PathBuf;
use vigil_core::gallery::DEFAULT_MATCH_THRESHOLD;

const LOCATOR_MODEL_FILE: &str = "face-locator.onnx";
const ENCODER_MODEL_FILE: &str = "face-encoder.onnx";

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the ONNX model files.
    pub model_dir: PathBuf,
    /// Enrollment images, one `<name>.jpg` per identity.
    pub known_faces_dir: PathBuf,
    /// Archive directory for face crops that matched nobody.
    pub unknown_faces_dir: PathBuf,
    /// Motion event log (CSV).
    pub log_path: PathBuf,
    /// Maximum embedding distance accepted as a recognition.
    pub match_threshold: f32,
    /// Pacing sleep between pipeline iterations, in milliseconds.
    pub frame_interval_ms: u64,
    /// Persist the event log every N recorded events.
    pub events_per_flush: usize,
    /// Frames an enrollment capture may spend waiting for a face.
    pub enroll_attempts: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = env_path("VIGIL_DATA_DIR").unwrap_or_else(default_data_dir);

        Self {
            model_dir: env_path("VIGIL_MODEL_DIR").unwrap_or_else(|| data_dir.join("models")),
            known_faces_dir: env_path("VIGIL_KNOWN_FACES_DIR")
                .unwrap_or_else(|| data_dir.join("known_faces")),
            unknown_faces_dir: env_path("VIGIL_UNKNOWN_FACES_DIR")
                .unwrap_or_else(|| data_dir.join("unknown_faces")),
            log_path: env_path("VIGIL_LOG_PATH")
                .unwrap_or_else(|| data_dir.join("motion_log.csv")),
            match_threshold: env_parsed("VIGIL_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            frame_interval_ms: env_parsed("VIGIL_FRAME_INTERVAL_MS", 30),
            events_per_flush: env_parsed("VIGIL_EVENTS_PER_FLUSH", 10),
            enroll_attempts: env_parsed("VIGIL_ENROLL_ATTEMPTS", 30),
        }
    }

    pub fn locator_model_path(&self) -> PathBuf {
        self.model_dir.join(LOCATOR_MODEL_FILE)
    }

    pub fn encoder_model_path(&self) -> PathBuf {
        self.model_dir.join(ENCODER_MODEL_FILE)
    }

    /// Create every directory the daemon writes into.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.known_faces_dir)?;
        std::fs::create_dir_all(&self.unknown_faces_dir)?;
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(xdg) = env_path("XDG_DATA_HOME") {
        return xdg.join("vigil");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/share/vigil");
    }
    PathBuf::from("/var/lib/vigil")
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}
