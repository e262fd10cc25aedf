//! Configuration management for the controller runtime.
//!
//! Provides hierarchical settings loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`CONTROLLER__*`)
mod runtime;
mod retry;
pub use runtime::*;
pub use retry::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Tunables for one controller runtime.
///
/// Sources are merged in the following order (later sources override earlier):
/// 1. Type defaults
/// 2. Configuration file from `CONFIG_PATH` (if set)
/// 3. Environment variables with `CONTROLLER__` prefix
#[derive(Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ControllerSettings {
    /// Worker loop and resync timing
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Requeue backoff for failed keys
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl Debug for ControllerSettings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ControllerSettings")
            .field("runtime", &self.runtime)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl ControllerSettings {
    /// Loads settings from hierarchical sources without validation.
    ///
    /// Callers must call [`validate`](Self::validate) once all overrides
    /// are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONTROLLER__RUNTIME__WORKERS", "4");
    /// let settings = ControllerSettings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Applies overrides from `path`, then re-applies environment variables.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn validate(self) -> Result<Self> {
        self.runtime.validate()?;
        self.backoff.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("CONTROLLER")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
