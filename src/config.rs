use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

use crate::balance::BalanceLimits;

/// Plugin configuration
///
/// The `store` adapter and the condition validator are wired in code;
/// everything else the embedder tunes lives here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PluginConfig {
    pub auth: AuthConfig,
    #[serde(default)]
    pub info: InfoConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Trustline identity and credit line
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// Local account label (opaque)
    pub account: String,
    /// Signalling rendezvous identifier
    pub room: String,
    /// Signalling server endpoint
    pub host: String,
    /// Max credit we extend to the peer (decimal string, > 0)
    pub limit: String,
    /// Optional absolute upper bound on the balance; defaults to `limit`
    #[serde(default)]
    pub max: Option<String>,
}

/// Currency metadata surfaced through `get_info` (opaque to the core)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InfoConfig {
    pub precision: u32,
    pub scale: u32,
    pub currency_code: String,
    pub currency_symbol: String,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            precision: 15,
            scale: 15,
            currency_code: "USD".to_string(),
            currency_symbol: "$".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub use_json: bool,
    pub rotation: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "./logs".to_string(),
            file: "plugin.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

impl PluginConfig {
    /// Load config from a YAML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let mut config: Self =
            serde_yaml::from_str(&content).context("Failed to parse config yaml")?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over YAML config.
    /// Format: ILP_<SECTION>_<FIELD> (uppercase with underscores)
    ///
    /// Supported overrides:
    /// - ILP_AUTH_ACCOUNT: local account label
    /// - ILP_AUTH_ROOM: signalling rendezvous identifier
    /// - ILP_AUTH_HOST: signalling server endpoint
    /// - ILP_AUTH_LIMIT: max credit extended to the peer
    /// - ILP_LOG_LEVEL: log level (trace/debug/info/warn/error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(account) = std::env::var("ILP_AUTH_ACCOUNT") {
            self.auth.account = account;
        }
        if let Ok(room) = std::env::var("ILP_AUTH_ROOM") {
            self.auth.room = room;
        }
        if let Ok(host) = std::env::var("ILP_AUTH_HOST") {
            self.auth.host = host;
        }
        if let Ok(limit) = std::env::var("ILP_AUTH_LIMIT") {
            self.auth.limit = limit;
        }
        if let Ok(level) = std::env::var("ILP_LOG_LEVEL") {
            self.log.level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.auth.account.is_empty() {
            anyhow::bail!("auth.account must not be empty");
        }
        if self.auth.room.is_empty() {
            anyhow::bail!("auth.room must not be empty");
        }

        let limit = Decimal::from_str(&self.auth.limit)
            .with_context(|| format!("auth.limit is not a decimal: {}", self.auth.limit))?;
        if limit <= Decimal::ZERO {
            anyhow::bail!("auth.limit must be positive, got {}", limit);
        }

        if let Some(max) = &self.auth.max {
            let max = Decimal::from_str(max)
                .with_context(|| format!("auth.max is not a decimal: {}", max))?;
            if max <= Decimal::ZERO {
                anyhow::bail!("auth.max must be positive, got {}", max);
            }
        }

        Ok(())
    }

    /// Derive the trustline bounds: `max` is the configured absolute
    /// bound (or `limit`), `min` mirrors the credit line as `-limit`.
    pub fn balance_limits(&self) -> Result<BalanceLimits> {
        self.validate()?;
        let limit = Decimal::from_str(&self.auth.limit).expect("validated above");
        let max = match &self.auth.max {
            Some(raw) => Decimal::from_str(raw).expect("validated above"),
            None => limit,
        };
        Ok(BalanceLimits { min: -limit, max })
    }
}
