//! Configuration management for apisign.
//!
//! All configuration is driven by environment variables. Loading goes through
//! [`ApiSignConfig::from_lookup`] so callers (and tests) can supply any source
//! of `name -> value` pairs; [`ApiSignConfig::from_env`] reads the process
//! environment.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::{ApiSignError, ApiSignResult};

/// Deployment mode of the verifying process.
///
/// Only [`DeploymentMode::Debug`] permits debug signature issuance. Any mode
/// string other than `debug` maps to [`DeploymentMode::Release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentMode {
    /// Development mode; debug issuance is allowed.
    Debug,
    /// Any non-debug mode; debug issuance is forbidden.
    #[default]
    Release,
}

impl DeploymentMode {
    /// Whether debug signature issuance is allowed in this mode.
    #[must_use]
    pub fn allows_debug_issuance(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// The canonical string form of this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl From<&str> for DeploymentMode {
    fn from(value: &str) -> Self {
        if value == "debug" {
            Self::Debug
        } else {
            Self::Release
        }
    }
}

impl From<String> for DeploymentMode {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DeploymentMode> for String {
    fn from(mode: DeploymentMode) -> Self {
        mode.as_str().to_owned()
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global configuration for apisign.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSignConfig {
    /// Deployment mode gating debug issuance.
    pub run_mode: DeploymentMode,
    /// Maximum age of a signed request, in seconds.
    pub signature_lifetime_secs: u64,
    /// Whether consumed nonces are tracked to reject replays.
    pub replay_protection: bool,
    /// Upper bound on nonces tracked at once when replay protection is on.
    pub nonce_capacity: usize,
    /// Path to the key registry JSON document.
    pub keys_file: String,
    /// Log level.
    pub log_level: String,
}

impl Default for ApiSignConfig {
    fn default() -> Self {
        Self {
            run_mode: DeploymentMode::Release,
            signature_lifetime_secs: 300,
            replay_protection: false,
            nonce_capacity: 100_000,
            keys_file: "keys.json".to_owned(),
            log_level: "info".to_owned(),
        }
    }
}

impl ApiSignConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ApiSignError::InvalidEnv`] if a numeric or boolean variable
    /// cannot be parsed, or [`ApiSignError::Config`] if the result fails
    /// [`ApiSignConfig::validate`].
    pub fn from_env() -> ApiSignResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ApiSignConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ApiSignResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("APISIGN_RUN_MODE") {
            config.run_mode = DeploymentMode::from(v);
        }
        if let Some(v) = lookup("APISIGN_SIGNATURE_LIFETIME") {
            config.signature_lifetime_secs = parse_number("APISIGN_SIGNATURE_LIFETIME", &v)?;
        }
        if let Some(v) = lookup("APISIGN_REPLAY_PROTECTION") {
            config.replay_protection = parse_flag("APISIGN_REPLAY_PROTECTION", &v)?;
        }
        if let Some(v) = lookup("APISIGN_NONCE_CAPACITY") {
            config.nonce_capacity = parse_number("APISIGN_NONCE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("APISIGN_KEYS_FILE") {
            config.keys_file = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config.validate()?;

        debug!(
            run_mode = %config.run_mode,
            signature_lifetime_secs = config.signature_lifetime_secs,
            replay_protection = config.replay_protection,
            "loaded apisign configuration"
        );

        Ok(config)
    }

    /// Check the configuration for values that would make verification unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ApiSignError::Config`] for a zero signature lifetime, or a zero
    /// nonce capacity while replay protection is enabled.
    pub fn validate(&self) -> ApiSignResult<()> {
        if self.signature_lifetime_secs == 0 {
            return Err(ApiSignError::Config(
                "signature lifetime must be at least one second".to_owned(),
            ));
        }
        if self.replay_protection && self.nonce_capacity == 0 {
            return Err(ApiSignError::Config(
                "nonce capacity must be positive when replay protection is enabled".to_owned(),
            ));
        }
        Ok(())
    }

    /// The signature lifetime window as a [`Duration`].
    #[must_use]
    pub fn signature_lifetime(&self) -> Duration {
        Duration::from_secs(self.signature_lifetime_secs)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ApiSignResult<T> {
    value.trim().parse().map_err(|_| ApiSignError::InvalidEnv {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_flag(name: &str, value: &str) -> ApiSignResult<bool> {
    match value.trim() {
        "1" => Ok(true),
        "0" | "" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ApiSignError::InvalidEnv {
            name: name.to_owned(),
            value: value.to_owned(),
        }),
    }
}
