/// Configuration management for inference-service
///
/// Loads configuration from environment variables (and `.env` when present)
/// with sensible defaults.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub swagger: SwaggerConfig,
    pub inference: InferenceConfig,
    pub detection: DetectionConfig,
    pub history: HistoryConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    /// Base URL advertised in the OpenAPI `servers` list
    pub advertised_host: String,
    pub max_frame_bytes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct SwaggerConfig {
    /// Directory holding Swagger UI assets. When unset the bundled UI is used.
    pub res_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct InferenceConfig {
    pub model_paths: Vec<PathBuf>,
    pub target_width: u32,
    pub target_height: u32,
    pub prediction_interval_ms: i32,
    pub image_queue_min_len: usize,
    pub detection_threshold: f32,
    pub latency_window: usize,
}

#[derive(Clone, Debug)]
pub struct DetectionConfig {
    pub on_detected_command: Option<String>,
    pub context_frames_dir: PathBuf,
    pub cooldown: Duration,
    pub starved_backoff: Duration,
}

/// Where prediction results are persisted and for how long.
#[derive(Clone, Debug)]
pub struct HistoryConfig {
    pub database_url: String,
    pub retention: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://predict.sqlite".to_string(),
            retention: Duration::from_secs(15 * 24 * 60 * 60),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_paths: Vec::new(),
            target_width: 224,
            target_height: 224,
            prediction_interval_ms: 600_000,
            image_queue_min_len: 16,
            detection_threshold: 0.5,
            latency_window: 10_000,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            on_detected_command: None,
            context_frames_dir: std::env::temp_dir(),
            cooldown: Duration::from_secs(90),
            starved_backoff: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let defaults = InferenceConfig::default();
        let detection_defaults = DetectionConfig::default();
        let history_defaults = HistoryConfig::default();

        let port: u16 = parse_or("APP_PORT", 4386)?;
        let advertised_host = std::env::var("ADVERTISED_HOST")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{}", port));
        if advertised_host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "ADVERTISED_HOST",
                value: advertised_host,
            });
        }

        let model_paths = parse_model_paths(
            &std::env::var("MODEL_PATHS").map_err(|_| ConfigError::Missing("MODEL_PATHS"))?,
        );
        if model_paths.is_empty() {
            return Err(ConfigError::Missing("MODEL_PATHS"));
        }

        let prediction_interval_ms: i32 =
            parse_or("PREDICTION_INTERVAL_MS", defaults.prediction_interval_ms)?;
        if prediction_interval_ms <= 0 {
            return Err(ConfigError::Invalid {
                key: "PREDICTION_INTERVAL_MS",
                value: prediction_interval_ms.to_string(),
            });
        }

        let image_queue_min_len: usize =
            parse_or("IMAGE_QUEUE_MIN_LEN", defaults.image_queue_min_len)?;
        if image_queue_min_len <= crate::services::PREDICTION_FRAME_INDEX {
            return Err(ConfigError::Invalid {
                key: "IMAGE_QUEUE_MIN_LEN",
                value: image_queue_min_len.to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port,
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                advertised_host,
                max_frame_bytes: parse_or("MAX_FRAME_BYTES", 8 * 1024 * 1024)?,
            },
            swagger: SwaggerConfig {
                res_path: std::env::var("SWAGGER_RES_PATH")
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
            },
            inference: InferenceConfig {
                model_paths,
                target_width: parse_or("TARGET_IMAGE_WIDTH", defaults.target_width)?,
                target_height: parse_or("TARGET_IMAGE_HEIGHT", defaults.target_height)?,
                prediction_interval_ms,
                image_queue_min_len,
                detection_threshold: parse_or("DETECTION_THRESHOLD", defaults.detection_threshold)?,
                latency_window: parse_or("LATENCY_WINDOW", defaults.latency_window)?,
            },
            detection: DetectionConfig {
                on_detected_command: std::env::var("ON_DETECTED_COMMAND")
                    .ok()
                    .filter(|c| !c.trim().is_empty()),
                context_frames_dir: std::env::var("CONTEXT_FRAMES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(detection_defaults.context_frames_dir),
                cooldown: Duration::from_secs(parse_or("DETECTION_COOLDOWN_SECS", 90u64)?),
                starved_backoff: Duration::from_secs(parse_or("STARVED_BACKOFF_SECS", 5u64)?),
            },
            history: HistoryConfig {
                database_url: std::env::var("PREDICTION_DB_URL")
                    .ok()
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or(history_defaults.database_url),
                retention: Duration::from_secs(
                    parse_or("PREDICTION_RETENTION_DAYS", 15u64)? * 24 * 60 * 60,
                ),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_model_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
