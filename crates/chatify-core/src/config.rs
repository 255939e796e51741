use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Chat endpoint of the hosting app
const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";

/// Hosted model API (generateContent)
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Which inference backend answers a send
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    /// POST to `<base_url>/api/chat`, streamed plain-text body
    #[default]
    Http,
    /// Call the hosted model directly, buffered body
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Authenticated user. Sends are rejected while this is unset.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            user_id: None,
            proxy: ProxyConfig::default(),
            render: RenderConfig::default(),
            debug: false,
        }
    }
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_data_dir() -> String {
    ".chatify".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub kind: ProxyKind,

    /// Base URL of the chat endpoint (http kind)
    #[serde(default = "default_proxy_url")]
    pub base_url: String,

    /// Upper bound on the wait for the first response byte
    #[serde(default = "default_first_byte_timeout")]
    pub first_byte_timeout_secs: u64,

    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_proxy_url() -> String {
    DEFAULT_PROXY_URL.into()
}

fn default_first_byte_timeout() -> u64 {
    10
}

fn default_gemini_url() -> String {
    DEFAULT_GEMINI_URL.into()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_max_output_tokens() -> u32 {
    512
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            kind: ProxyKind::default(),
            base_url: default_proxy_url(),
            first_byte_timeout_secs: default_first_byte_timeout(),
            gemini_api_key: None,
            gemini_base_url: default_gemini_url(),
            gemini_model: default_gemini_model(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl ProxyConfig {
    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_secs(self.first_byte_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Minimum spacing between live display updates
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

fn default_throttle_ms() -> u64 {
    100
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl RenderConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig {
        working_dir: wd.clone(),
        ..Default::default()
    };

    // Global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("chatify").join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    // Project-local config
    let local_path = wd.join("chatify.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    detect_env(&mut config);
    validate(&config)?;

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.user_id.is_some() {
        base.user_id = overlay.user_id;
    }
    if overlay.proxy.kind != ProxyKind::default() {
        base.proxy.kind = overlay.proxy.kind;
    }
    if overlay.proxy.base_url != default_proxy_url() {
        base.proxy.base_url = overlay.proxy.base_url;
    }
    if overlay.proxy.first_byte_timeout_secs != default_first_byte_timeout() {
        base.proxy.first_byte_timeout_secs = overlay.proxy.first_byte_timeout_secs;
    }
    if overlay.proxy.gemini_api_key.is_some() {
        base.proxy.gemini_api_key = overlay.proxy.gemini_api_key;
    }
    if overlay.proxy.gemini_base_url != default_gemini_url() {
        base.proxy.gemini_base_url = overlay.proxy.gemini_base_url;
    }
    if overlay.proxy.gemini_model != default_gemini_model() {
        base.proxy.gemini_model = overlay.proxy.gemini_model;
    }
    if overlay.proxy.max_output_tokens != default_max_output_tokens() {
        base.proxy.max_output_tokens = overlay.proxy.max_output_tokens;
    }
    if overlay.render.throttle_ms != default_throttle_ms() {
        base.render.throttle_ms = overlay.render.throttle_ms;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn detect_env(config: &mut AppConfig) {
    if let Some(user) = non_empty_env("CHATIFY_USER_ID") {
        config.user_id = Some(user);
    }
    if let Some(url) = non_empty_env("CHATIFY_PROXY_URL") {
        config.proxy.base_url = url;
    }
    if config.proxy.gemini_api_key.is_none() {
        config.proxy.gemini_api_key = non_empty_env("GEMINI_API_KEY");
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.proxy.first_byte_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "proxy.first_byte_timeout_secs must be positive".into(),
        ));
    }
    if config.proxy.kind == ProxyKind::Http && config.proxy.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField("proxy.base_url".into()));
    }
    Ok(())
}

impl AppConfig {
    pub fn data_path(&self) -> PathBuf {
        self.working_dir.join(&self.data_dir)
    }

    pub fn has_user(&self) -> bool {
        self.user_id.as_ref().is_some_and(|u| !u.trim().is_empty())
    }
}
