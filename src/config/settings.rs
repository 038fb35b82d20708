//! Resolver configuration
//!
//! Settings are loaded from defaults, an optional TOML file and environment
//! variables, in increasing order of precedence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Helper functions for serde defaults
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("stream-resolver/{}", crate::utils::version::VERSION)
}

fn default_key_system() -> String {
    "com.widevine.alpha".to_string()
}

fn default_player_url_template() -> String {
    "https://www.youtube.com/s/player/{version}/player_ias.vflset/en_US/base.js".to_string()
}

fn default_stage_timeout() -> u64 {
    30
}

/// Main configuration settings for the resolver
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkSettings,
    /// License exchange configuration
    #[serde(default)]
    pub license: LicenseSettings,
    /// Signature cipher configuration
    #[serde(default)]
    pub cipher: CipherSettings,
    /// Default selection policy
    #[serde(default)]
    pub selection: SelectionSettings,
    /// Orchestrator configuration
    #[serde(default)]
    pub resolve: ResolveSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network and proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// All protocols proxy URL
    #[serde(default)]
    pub all_proxy: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// How the license endpoint encodes its response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LicenseResponseFormat {
    /// JSON envelope `{"license": "<base64>"}`
    #[default]
    Json,
    /// Body is the license itself
    Raw,
}

/// License exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSettings {
    /// Key system identifier sent with every license request
    #[serde(default = "default_key_system")]
    pub key_system: String,
    /// Response body encoding
    #[serde(default)]
    pub response_format: LicenseResponseFormat,
}

/// Signature cipher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherSettings {
    /// Maximum number of cached programs, unbounded when unset
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Player script URL, `{version}` is replaced with the content version
    #[serde(default = "default_player_url_template")]
    pub player_url_template: String,
    /// File used to persist derived programs between runs
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

/// Default selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Bandwidth floor in bits per second
    #[serde(default)]
    pub min_bandwidth: Option<u64>,
    /// Drop variants that require DRM
    #[serde(default)]
    pub require_drm_free: bool,
    /// Rank DRM-free variants ahead of DRM ones
    #[serde(default = "default_true")]
    pub prefer_drm_free: bool,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveSettings {
    /// Timeout in seconds applied to each network stage, 0 disables it
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout: u64,
    /// Refresh credentials and retry the license exchange once on `Unauthorized`
    #[serde(default)]
    pub refresh_on_unauthorized: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl NetworkSettings {
    /// Effective proxy URL, picked in `https_proxy`, `http_proxy`, `all_proxy` order
    pub fn proxy_url(&self) -> Option<&str> {
        self.https_proxy
            .as_deref()
            .or(self.http_proxy.as_deref())
            .or(self.all_proxy.as_deref())
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            https_proxy: None,
            http_proxy: None,
            all_proxy: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LicenseSettings {
    fn default() -> Self {
        Self {
            key_system: default_key_system(),
            response_format: LicenseResponseFormat::default(),
        }
    }
}

impl Default for CipherSettings {
    fn default() -> Self {
        Self {
            max_entries: None,
            player_url_template: default_player_url_template(),
            cache_file: None,
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            min_bandwidth: None,
            require_drm_free: false,
            prefer_drm_free: default_true(),
        }
    }
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            stage_timeout: default_stage_timeout(),
            refresh_on_unauthorized: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> crate::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| crate::Error::config(name, &format!("Invalid value '{}': {}", value, e))),
        Err(_) => Ok(None),
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();
        settings.apply_env()?;
        Ok(settings)
    }

    fn apply_env(&mut self) -> crate::Result<()> {
        // Proxy variables follow the usual unprefixed convention
        if let Ok(proxy) = std::env::var("HTTPS_PROXY") {
            self.network.https_proxy = Some(proxy);
        }
        if let Ok(proxy) = std::env::var("HTTP_PROXY") {
            self.network.http_proxy = Some(proxy);
        }
        if let Ok(proxy) = std::env::var("ALL_PROXY") {
            self.network.all_proxy = Some(proxy);
        }

        if let Some(secs) = parse_env("RESOLVER_CONNECT_TIMEOUT")? {
            self.network.connect_timeout = secs;
        }
        if let Some(secs) = parse_env("RESOLVER_REQUEST_TIMEOUT")? {
            self.network.request_timeout = secs;
        }
        if let Ok(agent) = std::env::var("RESOLVER_USER_AGENT") {
            self.network.user_agent = agent;
        }

        if let Ok(key_system) = std::env::var("RESOLVER_KEY_SYSTEM") {
            self.license.key_system = key_system;
        }
        if let Ok(format) = std::env::var("RESOLVER_LICENSE_FORMAT") {
            self.license.response_format = match format.to_lowercase().as_str() {
                "json" => LicenseResponseFormat::Json,
                "raw" => LicenseResponseFormat::Raw,
                other => {
                    return Err(crate::Error::config(
                        "RESOLVER_LICENSE_FORMAT",
                        &format!("Unknown license format: {}", other),
                    ));
                }
            };
        }

        if let Some(max) = parse_env("RESOLVER_CIPHER_MAX_ENTRIES")? {
            self.cipher.max_entries = Some(max);
        }
        if let Ok(template) = std::env::var("RESOLVER_PLAYER_URL_TEMPLATE") {
            self.cipher.player_url_template = template;
        }
        if let Ok(path) = std::env::var("RESOLVER_CIPHER_CACHE_FILE") {
            self.cipher.cache_file = Some(PathBuf::from(path));
        }

        if let Some(min) = parse_env("RESOLVER_MIN_BANDWIDTH")? {
            self.selection.min_bandwidth = Some(min);
        }
        if let Some(require) = parse_env("RESOLVER_REQUIRE_DRM_FREE")? {
            self.selection.require_drm_free = require;
        }
        if let Some(prefer) = parse_env("RESOLVER_PREFER_DRM_FREE")? {
            self.selection.prefer_drm_free = prefer;
        }

        if let Some(secs) = parse_env("RESOLVER_STAGE_TIMEOUT")? {
            self.resolve.stage_timeout = secs;
        }
        if let Some(refresh) = parse_env("RESOLVER_REFRESH_ON_UNAUTHORIZED")? {
            self.resolve.refresh_on_unauthorized = refresh;
        }

        if let Ok(level) = std::env::var("RESOLVER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("RESOLVER_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Load settings from configuration file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config("file", &format!("Failed to read config file: {}", e))
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            crate::Error::config("file", &format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Apply environment variable overrides on top of these settings
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        self.apply_env()?;
        Ok(self)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.network.request_timeout == 0 {
            return Err(crate::Error::config(
                "request_timeout",
                "Invalid request timeout: cannot be 0",
            ));
        }

        if self.cipher.max_entries == Some(0) {
            return Err(crate::Error::config(
                "max_entries",
                "Invalid cipher cache size: cannot be 0",
            ));
        }

        if !self.cipher.player_url_template.contains("{version}") {
            return Err(crate::Error::config(
                "player_url_template",
                "Player URL template must contain {version}",
            ));
        }

        if self.license.key_system.trim().is_empty() {
            return Err(crate::Error::config("key_system", "Key system cannot be empty"));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_level",
                    &format!("Invalid log level: {}", self.logging.level),
                ));
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "text" | "json" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_format",
                    &format!("Invalid log format: {}", self.logging.format),
                ));
            }
        }

        for (name, proxy_url) in [
            ("https_proxy", &self.network.https_proxy),
            ("http_proxy", &self.network.http_proxy),
            ("all_proxy", &self.network.all_proxy),
        ]
        .iter()
        {
            if let Some(url_str) = proxy_url
                && let Err(e) = url::Url::parse(url_str)
            {
                return Err(crate::Error::config(
                    *name,
                    &format!("Invalid proxy URL '{}': {}", url_str, e),
                ));
            }
        }

        Ok(())
    }
}
