//! Orchestration configuration.
//!
//! Defaults match the deadlines used in production; every value can be
//! overridden from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TssError, TssResult};

pub const DEFAULT_KEYGEN_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SIGNING_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PRE_PARAMS_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_JOIN_RETRANSMIT_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TssConfig {
    /// Deadline of a whole key generation, join included.
    pub keygen_timeout_secs: u64,
    /// Deadline of a whole signing, join included.
    pub signing_timeout_secs: u64,
    pub pre_params_timeout_secs: u64,
    /// How often a waiting member re-broadcasts its join.
    pub join_retransmit_interval_ms: u64,
    /// Refuse key generation without pre-parameters instead of warning.
    pub require_pre_params: bool,
}

impl Default for TssConfig {
    fn default() -> Self {
        Self {
            keygen_timeout_secs: DEFAULT_KEYGEN_TIMEOUT_SECS,
            signing_timeout_secs: DEFAULT_SIGNING_TIMEOUT_SECS,
            pre_params_timeout_secs: DEFAULT_PRE_PARAMS_TIMEOUT_SECS,
            join_retransmit_interval_ms: DEFAULT_JOIN_RETRANSMIT_INTERVAL_MS,
            require_pre_params: false,
        }
    }
}

impl TssConfig {
    /// Defaults overridden by `TSS_*` environment variables.
    pub fn from_env() -> TssResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TssResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("TSS_KEYGEN_TIMEOUT_SECS") {
            config.keygen_timeout_secs = parse("TSS_KEYGEN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("TSS_SIGNING_TIMEOUT_SECS") {
            config.signing_timeout_secs = parse("TSS_SIGNING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("TSS_PRE_PARAMS_TIMEOUT_SECS") {
            config.pre_params_timeout_secs = parse("TSS_PRE_PARAMS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("TSS_JOIN_RETRANSMIT_INTERVAL_MS") {
            config.join_retransmit_interval_ms = parse("TSS_JOIN_RETRANSMIT_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("TSS_REQUIRE_PRE_PARAMS") {
            config.require_pre_params = parse("TSS_REQUIRE_PRE_PARAMS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TssResult<()> {
        let durations = [
            ("keygen_timeout_secs", self.keygen_timeout_secs),
            ("signing_timeout_secs", self.signing_timeout_secs),
            ("pre_params_timeout_secs", self.pre_params_timeout_secs),
            ("join_retransmit_interval_ms", self.join_retransmit_interval_ms),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(TssError::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    pub fn keygen_timeout(&self) -> Duration {
        Duration::from_secs(self.keygen_timeout_secs)
    }

    pub fn signing_timeout(&self) -> Duration {
        Duration::from_secs(self.signing_timeout_secs)
    }

    pub fn pre_params_timeout(&self) -> Duration {
        Duration::from_secs(self.pre_params_timeout_secs)
    }

    pub fn join_retransmit_interval(&self) -> Duration {
        Duration::from_millis(self.join_retransmit_interval_ms)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> TssResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TssError::Config(format!("invalid {}: {}", key, e)))
}
