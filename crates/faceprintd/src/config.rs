use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use faceprint_core::detector::{DetectorConfig, DEFAULT_CONFIDENCE_THRESHOLD};
use faceprint_core::{ExecutionPreference, OnnxModelSpec, DEFAULT_SIMILARITY_THRESHOLD};

const DEFAULT_MODEL: &str = "buffalo_l";

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind_addr: SocketAddr,
    /// Root directory holding one sub-directory per model pack.
    pub model_dir: PathBuf,
    /// Model packs to load; the first one embeds enrolled profiles.
    pub models: Vec<String>,
    /// Fusion weights per model; `None` means equal weights.
    pub model_weights: Option<HashMap<String, f32>>,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Drop all stored profiles at startup.
    pub reset_db: bool,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    pub execution: ExecutionPreference,
    /// Minimum SCRFD score for a detection.
    pub detection_threshold: f32,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
    /// Allow any origin (for the browser demo client).
    pub cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from `FACEPRINT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Malformed values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = get("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("faceprint");

        let bind_addr = parse_or(&get, "FACEPRINT_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)));

        let similarity_threshold = parse_or(&get, "FACEPRINT_SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD);
        let similarity_threshold = if similarity_threshold.is_finite() {
            similarity_threshold
        } else {
            tracing::warn!("FACEPRINT_SIMILARITY_THRESHOLD is not finite; using default");
            DEFAULT_SIMILARITY_THRESHOLD
        };

        Self {
            bind_addr,
            model_dir: get("FACEPRINT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("models")),
            models: get("FACEPRINT_MODELS")
                .map(|v| parse_models(&v))
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| vec![DEFAULT_MODEL.to_string()]),
            model_weights: get("FACEPRINT_MODEL_WEIGHTS")
                .map(|v| parse_weights(&v))
                .filter(|w| !w.is_empty()),
            db_path: get("FACEPRINT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("profiles.db")),
            reset_db: flag(&get, "FACEPRINT_RESET_DB", false),
            similarity_threshold,
            execution: if flag(&get, "FACEPRINT_USE_GPU", true) {
                ExecutionPreference::Gpu
            } else {
                ExecutionPreference::Cpu
            },
            detection_threshold: parse_or(&get, "FACEPRINT_DETECTION_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD),
            max_upload_bytes: parse_or(&get, "FACEPRINT_MAX_UPLOAD_MB", 10usize).saturating_mul(1024 * 1024),
            request_timeout_secs: parse_or(&get, "FACEPRINT_REQUEST_TIMEOUT_SECS", 30),
            cors: flag(&get, "FACEPRINT_CORS", true),
        }
    }

    /// One ONNX model spec per configured model pack.
    pub fn model_specs(&self) -> Vec<OnnxModelSpec> {
        self.models
            .iter()
            .map(|name| OnnxModelSpec {
                detector: DetectorConfig {
                    confidence_threshold: self.detection_threshold,
                    ..DetectorConfig::default()
                },
                execution: self.execution,
                ..OnnxModelSpec::in_root(&self.model_dir, name)
            })
            .collect()
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable configuration value; using default");
            default
        }),
    }
}

fn flag(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    get(key)
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(default)
}

/// Comma-separated model names, trimmed and de-duplicated in order.
fn parse_models(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|m| m == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// `name=weight,...`; malformed entries are skipped.
fn parse_weights(raw: &str) -> HashMap<String, f32> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('=').and_then(|(name, w)| {
                let w: f32 = w.trim().parse().ok()?;
                (w.is_finite() && w >= 0.0).then(|| (name.trim().to_string(), w))
            });
            if parsed.is_none() {
                tracing::warn!(entry, "ignoring malformed model weight");
            }
            parsed
        })
        .collect()
}
