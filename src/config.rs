use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Empty means no model is configured; every turn runs in fallback mode.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Turns kept per session; oldest evicted first.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
        }
    }
}

fn default_history_cap() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulingConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Doctors inserted at startup if missing.
    #[serde(default = "default_seed_doctors")]
    pub seed_doctors: Vec<String>,
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            seed_doctors: default_seed_doctors(),
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            slot_minutes: default_slot_minutes(),
        }
    }
}

fn default_db_path() -> String {
    "clinicd.db".to_string()
}
fn default_seed_doctors() -> Vec<String> {
    [
        "Dr. Ahuja",
        "Dr. Mehta",
        "Dr. Sharma",
        "Dr. Roy",
        "Dr. Joy",
        "Dr. Joshi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_open_hour() -> u32 {
    9
}
fn default_close_hour() -> u32 {
    17
}
fn default_slot_minutes() -> u32 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationsConfig {
    /// Chat webhook for report notifications. Unset means simulated delivery.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields defaults (fallback mode,
    /// local database). The provider API key falls back to OPENAI_API_KEY
    /// from the environment so secrets can stay out of the config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: AppConfig = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?
        } else {
            tracing::info!(
                "No config file at {}; using defaults",
                path.display()
            );
            AppConfig::default()
        };

        if config.provider.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                config.provider.api_key = key;
            }
        }

        if config.scheduling.close_hour <= config.scheduling.open_hour {
            anyhow::bail!(
                "scheduling.close_hour ({}) must be after open_hour ({})",
                config.scheduling.close_hour,
                config.scheduling.open_hour
            );
        }

        Ok(config)
    }
}
