//! Coordinator configuration: TOML file plus environment-variable
//! overrides, in the same two-stage (`from_file` then `apply_env_overrides`)
//! shape the ambient stack uses elsewhere in this codebase.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoordinatorConfig {
    pub scheduling: SchedulingConfig,
    pub workers: WorkerAddresses,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}

impl CoordinatorConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read config file: {e}"))?;
        toml::from_str(&contents).map_err(|e| format!("failed to parse config: {e}"))
    }

    /// Load from `SPEC_COORD_CONFIG` if set, else defaults, then apply
    /// environment overrides either way.
    pub fn load() -> Self {
        let mut config = if let Ok(path) = std::env::var("SPEC_COORD_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    info!(%path, "loaded coordinator config");
                    cfg
                }
                Err(e) => {
                    warn!(%path, error = %e, "failed to load config, using defaults");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SPEC_COORD_GAMMA") {
            if let Ok(n) = v.parse() {
                self.scheduling.gamma = n;
            }
        }
        if let Ok(v) = std::env::var("SPEC_COORD_MAX_NEW_TOKENS") {
            if let Ok(n) = v.parse() {
                self.scheduling.max_new_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("SPEC_COORD_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.scheduling.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("SPEC_COORD_TOP_P") {
            if let Ok(n) = v.parse() {
                self.scheduling.top_p = n;
            }
        }
        if let Ok(v) = std::env::var("SPEC_COORD_DRAFT_SERVER") {
            self.workers.draft_server = v;
        }
        if let Ok(v) = std::env::var("SPEC_COORD_TARGET_SERVER") {
            self.workers.target_server = v;
        }
        if let Ok(v) = std::env::var("SPEC_COORD_RPC_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.timeouts.rpc_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SPEC_COORD_LOG") {
            self.logging.level = v;
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.scheduling.gamma == 0 {
            errors.push("gamma must be at least 1".to_string());
        }
        if self.scheduling.max_new_tokens == 0 {
            errors.push("max_new_tokens must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.scheduling.top_p) {
            errors.push("top_p must be in [0, 1]".to_string());
        }
        if self.workers.draft_server.is_empty() || self.workers.target_server.is_empty() {
            errors.push("draft_server and target_server must be set".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("failed to serialize config: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub gamma: u32,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub rng_seed: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            gamma: 4,
            max_new_tokens: 50,
            temperature: 1.0,
            top_p: 0.9,
            rng_seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAddresses {
    pub draft_server: String,
    pub target_server: String,
}

impl Default for WorkerAddresses {
    fn default() -> Self {
        Self {
            draft_server: "127.0.0.1:7001".to_string(),
            target_server: "127.0.0.1:7002".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub rpc_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { rpc_timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_gamma_is_invalid() {
        let mut config = CoordinatorConfig::default();
        config.scheduling.gamma = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let config = CoordinatorConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(!toml.is_empty());
    }
}
