use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MockMailConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Hosted assistant endpoint. Inference can take minutes, hence the long timeout.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint_url: String,
    pub timeout_seconds: u64,
    pub missing_result_placeholder: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:9000/".to_string(),
            timeout_seconds: 300,
            missing_result_placeholder: crate::inference::MISSING_RESULT_PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TraceConfig {
    pub target_node: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            target_node: crate::trace::DEFAULT_TARGET_NODE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogsConfig {
    pub enabled: bool,
    pub endpoint_url: String,
    pub log_group: String,
    pub default_limit: u32,
    pub lookback_minutes: i64,
    pub timeout_seconds: u64,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_url: "https://logs.eu-central-1.amazonaws.com/".to_string(),
            log_group: "/aws/lambda/mail-assistant".to_string(),
            default_limit: 50,
            lookback_minutes: 60,
            timeout_seconds: 30,
        }
    }
}

impl MockMailConfig {
    /// Load `path` (optional TOML) layered under `MOCKMAIL_<SECTION>__<KEY>` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("MOCKMAIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}
