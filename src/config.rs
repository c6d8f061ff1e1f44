//! Configuration for ltipass, read from `ltipass.toml`.
//!
//! Layered file → environment → CLI:
//! - the file is `--config`, else `$LTIPASS_CONFIG`, else `./ltipass.toml`,
//!   else `<config dir>/ltipass/ltipass.toml`; with none present, defaults
//! - `$LTIPASS_DB` overrides `[store] path`
//! - `$LTIPASS_API_TOKEN` overrides `[server] api_token`
//! - `$LTIPASS_LOG` overrides `[logging] level` (`RUST_LOG` still wins)
//! - CLI flags are applied last by the caller
//!
//! # Configuration File Format
//!
//! ```toml
//! [store]
//! path = "/opt/tljh/state/ltipass.db"
//! busy_timeout_ms = 5000
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8765
//! api_token = "long-random-string"
//!
//! [links]
//! redirect_path = "/lti/redirect"
//! checkout_path = "/hub/user-redirect/git-pull"
//!
//! [bridge]
//! prefix = "LTI_"
//! keys = ["user_id", "context_title"]
//!
//! [outcome]
//! timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [consumers]
//! "consumer-key" = "shared-secret"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{self, ParamBridge};
use crate::link::{self, LinkParser};
use crate::outcome::ConsumerSecrets;
use crate::server::ApiToken;
use crate::store::StoreOptions;

pub const CONFIG_FILE_NAME: &str = "ltipass.toml";
pub const CONFIG_ENV: &str = "LTIPASS_CONFIG";
pub const DB_ENV: &str = "LTIPASS_DB";
pub const API_TOKEN_ENV: &str = "LTIPASS_API_TOKEN";
pub const LOG_ENV: &str = "LTIPASS_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// How long a writer waits on another process's lock
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ltipass").join("ltipass.db"))
        .unwrap_or_else(|| PathBuf::from("ltipass.db"))
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token every `/api/*` caller must present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksSection {
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,
    #[serde(default = "default_checkout_path")]
    pub checkout_path: String,
}

fn default_redirect_path() -> String {
    link::REDIRECT_PATH.to_string()
}

fn default_checkout_path() -> String {
    link::CHECKOUT_PATH.to_string()
}

impl Default for LinksSection {
    fn default() -> Self {
        Self {
            redirect_path: default_redirect_path(),
            checkout_path: default_checkout_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSection {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Launch parameters to export; empty exports all of them
    #[serde(default = "bridge::default_keys")]
    pub keys: Vec<String>,
}

fn default_prefix() -> String {
    bridge::DEFAULT_PREFIX.to_string()
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            keys: bridge::default_keys(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for OutcomeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parsed `ltipass.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LtipassConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub links: LinksSection,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub outcome: OutcomeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Consumer key → shared secret
    #[serde(default)]
    pub consumers: BTreeMap<String, String>,
}

impl LtipassConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse ltipass.toml")
    }

    /// Find the config file to use. An explicit path always wins, even if it
    /// does not exist, so a typo is reported instead of silently ignored.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join("ltipass").join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// Load from the located file (or defaults) and apply environment
    /// overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `$LTIPASS_DB`, `$LTIPASS_API_TOKEN` and `$LTIPASS_LOG`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(path) = var(DB_ENV) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(token) = var(API_TOKEN_ENV) {
            self.server.api_token = Some(token);
        }
        if let Some(level) = var(LOG_ENV) {
            self.logging.level = level;
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize ltipass.toml")?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn link_parser(&self) -> LinkParser {
        LinkParser::new(&self.links.redirect_path, &self.links.checkout_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
            links: self.link_parser(),
        }
    }

    pub fn param_bridge(&self) -> ParamBridge {
        ParamBridge::new(&self.bridge.prefix, self.bridge.keys.clone())
    }

    pub fn consumer_secrets(&self) -> ConsumerSecrets {
        ConsumerSecrets::new(self.consumers.clone())
    }

    /// `None` when no token, or only a blank one, is configured.
    pub fn api_token(&self) -> Option<ApiToken> {
        self.server.api_token.as_deref().and_then(ApiToken::new)
    }

    pub fn outcome_timeout(&self) -> Duration {
        Duration::from_secs(self.outcome.timeout_secs)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the service will bind a random port".to_string());
        }
        if self.api_token().is_none() {
            warnings.push(format!(
                "No server.api_token (or ${}) set: `ltipass serve` will refuse to start",
                API_TOKEN_ENV
            ));
        }

        for (name, path) in [
            ("links.redirect_path", &self.links.redirect_path),
            ("links.checkout_path", &self.links.checkout_path),
        ] {
            if !path.starts_with('/') {
                warnings.push(format!("{} '{}' should start with '/'", name, path));
            }
        }

        if self.bridge.prefix.is_empty() {
            warnings.push(
                "bridge.prefix is empty: every environment variable would be imported".to_string(),
            );
        }

        if self.outcome.timeout_secs == 0 {
            warnings.push("outcome.timeout_secs is 0: grade reports will time out".to_string());
        }

        if self.consumers.is_empty() {
            warnings.push("No [consumers] configured: grade reporting is disabled".to_string());
        }
        for (key, secret) in &self.consumers {
            if secret.trim().is_empty() {
                warnings.push(format!("Consumer '{}' has an empty shared secret", key));
            }
        }

        warnings
    }
}
