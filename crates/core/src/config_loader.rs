use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Prefix for environment overrides, e.g. `FUNDING_CURVE_BUILDER__EMIT_ON_ROLL=false`.
pub const ENV_PREFIX: &str = "FUNDING_CURVE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering defaults, the TOML file at `path`
    /// (when present) and `FUNDING_CURVE_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value fails validation.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base(path).merge(Self::env()).extract()?;
        config.validate()?;
        tracing::debug!(path, emit_on_roll = config.builder.emit_on_roll, "Loaded config");
        Ok(config)
    }

    /// Loads configuration with a profile file (`Config.<profile>.toml`)
    /// layered between the base file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be parsed or a value fails validation.
    pub fn load_with_profile(path: &str, profile: &str) -> Result<AppConfig> {
        let profile_path = Path::new(path).with_file_name(format!("Config.{profile}.toml"));
        let config: AppConfig = Self::base(path)
            .merge(Toml::file(profile_path))
            .merge(Self::env())
            .extract()?;
        config.validate()?;
        tracing::debug!(path, profile, "Loaded config with profile");
        Ok(config)
    }

    fn base(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }
}
