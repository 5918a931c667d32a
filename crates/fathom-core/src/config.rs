use std::path::{Path, PathBuf};

use fathom_device::DeviceConfig;
use fathom_explore::{
    policy_rng, rng::{FALLBACK_STREAM, RANDOM_STREAM}, InputPolicy, NavigateConfig,
    NavigateThenExplore, RandomConfig, RandomPolicy, Script, ScriptError, ScriptedPolicy,
};
use fathom_model::{AbstractionConfig, ActionSpace};
use serde::{Deserialize, Serialize};

use crate::limits::ExplorationLimits;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_max_tries() -> u32 {
    5
}

/// Which input policy a session runs, and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Random(RandomConfig),
    NavigateThenExplore(NavigateConfig),
    Scripted {
        /// Inline script; takes precedence over `script_path`.
        #[serde(default)]
        script: Option<Script>,
        #[serde(default)]
        script_path: Option<PathBuf>,
        #[serde(default = "default_max_tries")]
        max_tries: u32,
        /// Policy acting when the script cannot be followed.
        #[serde(default)]
        fallback: Box<PolicyConfig>,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::NavigateThenExplore(NavigateConfig::default())
    }
}

impl PolicyConfig {
    /// Build the policy, seeding every random stream from `seed`.
    pub fn build(&self, seed: u64) -> Result<Box<dyn InputPolicy>, ConfigError> {
        match self {
            PolicyConfig::Random(config) => Ok(Box::new(RandomPolicy::new(
                policy_rng(seed, RANDOM_STREAM),
                config.clone(),
            ))),
            PolicyConfig::NavigateThenExplore(config) => Ok(Box::new(NavigateThenExplore::new(
                config.clone(),
                policy_rng(seed, FALLBACK_STREAM),
            ))),
            PolicyConfig::Scripted {
                script,
                script_path,
                max_tries,
                fallback,
            } => {
                let script = match (script, script_path) {
                    (Some(script), _) => script.clone(),
                    (None, Some(path)) => Script::from_file(path)?,
                    (None, None) => {
                        return Err(ConfigError::Invalid(
                            "scripted policy needs `script` or `script_path`".into(),
                        ))
                    }
                };
                if matches!(**fallback, PolicyConfig::Scripted { .. }) {
                    return Err(ConfigError::Invalid(
                        "scripted policy cannot fall back to another script".into(),
                    ));
                }
                let fallback = fallback.build(seed)?;
                Ok(Box::new(ScriptedPolicy::new(script, *max_tries, fallback)))
            }
        }
    }
}

/// Everything one exploration session needs besides the app and the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed for every randomized decision.
    pub seed: u64,
    pub abstraction: AbstractionConfig,
    pub action_space: ActionSpace,
    pub device: DeviceConfig,
    pub limits: ExplorationLimits,
    pub policy: PolicyConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            abstraction: AbstractionConfig::default(),
            action_space: ActionSpace::default(),
            device: DeviceConfig::default(),
            limits: ExplorationLimits::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        if self.abstraction.max_depth == 0 || self.abstraction.max_widgets == 0 {
            return Err(ConfigError::Invalid(
                "abstraction bounds must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
