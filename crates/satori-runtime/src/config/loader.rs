//! Configuration loader using figment.
//!
//! # Sources (lowest to highest priority)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Profile-specific file (`satori.{profile}.toml`)
//! 4. Main file (`satori.toml` / `config.toml`, or the YAML equivalents)
//! 5. Environment variables (`SATORI_*`, `__` separates nested keys)
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `satori.toml`, `config.toml`
//! - `yaml-config`: `satori.yaml`, `satori.yml`, `config.yaml`, `config.yml`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./deploy/satori.toml")
//!     .load()?;
//!
//! // SATORI_HOST_ID=10000 SATORI_DISPATCH__MAX_CONCURRENCY=8
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SatoriConfig;

/// Prefix of the environment variables read by the loader.
pub const ENV_PREFIX: &str = "SATORI_";

/// Configuration profile for environment-specific files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `SATORI_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("SATORI_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Overrides the search when set.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `{config_dir}/satori` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("satori")),
            None => self,
        }
    }

    /// Loads exactly this file; a missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration value over the defaults.
    pub fn merge(mut self, config: SatoriConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<SatoriConfig> {
        let profile = self.profile.clone();
        let config: SatoriConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            serve = ?config.serve,
            endpoints = config.satori.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let overrides = std::mem::take(&mut self.figment);
        let mut figment = Figment::from(Serialized::defaults(SatoriConfig::default())).merge(overrides);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("satori"));
        }
        paths
    }

    /// Merges the first base file found (and its profile variant).
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: impl Fn(Figment, &Path) -> Figment,
    ) -> (Figment, bool) {
        for dir in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };
                let base_path = dir.join(base_name);
                if !base_path.exists() {
                    continue;
                }

                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = merge_fn(figment, &profile_path);
                }
                info!(path = %base_path.display(), "Loading configuration file");
                return (merge_fn(figment, &base_path), true);
            }
        }
        (figment, false)
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_mut)
    )]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (merged, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["satori.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = merged;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (merged, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["satori.yaml", "satori.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = merged;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => {
            let _ = figment;
            Err(ConfigError::UnsupportedFormat(ext.to_string()))
        }
    }
}

#[cfg(all(test, feature = "toml-config"))]
mod tests {
    use figment::Jail;
    use satori_adapter::ServeMode;

    use super::*;
    use crate::config::LogLevel;

    const CONFIG: &str = r#"
        host_id = "10000"
        serve = "dev"
        data_dir = "state"

        [logging]
        level = "debug"

        [logging.filters]
        satori_adapter = "trace"

        [dispatch]
        max_concurrency = 8

        [[satori]]
        [satori.websocket]
        ip = "10.0.0.2"
        port = 5500
        token = "secret"

        [satori.webhook_client]
        port = 8800
        path = "/hook"
    "#;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.serve, ServeMode::WebSocket);
            assert_eq!(config.data_dir, PathBuf::from("data"));
            assert!(config.satori.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_load_file_from_search_path() {
        Jail::expect_with(|jail| {
            jail.create_file("satori.toml", CONFIG)?;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.host_id, "10000");
            assert_eq!(config.serve, ServeMode::Dev);
            assert_eq!(config.data_dir, PathBuf::from("state"));
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.logging.filters["satori_adapter"], LogLevel::Trace);
            assert_eq!(config.dispatch.max_concurrency, 8);

            let endpoint = &config.satori[0];
            assert_eq!(endpoint.version, 1);
            let ws = endpoint.websocket.as_ref().unwrap();
            assert_eq!(ws.port, 5500);
            assert_eq!(ws.heartbeat_interval, 5);
            assert_eq!(endpoint.webhook_client.as_ref().unwrap().ip, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file("satori.toml", r#"host_id = "1""#)?;
            jail.create_file(
                "satori.production.toml",
                "host_id = \"2\"\ndata_dir = \"prod\"",
            )?;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .profile("prod")
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.host_id, "1");
            assert_eq!(config.data_dir, PathBuf::from("prod"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("satori.toml", CONFIG)?;
            jail.set_env("SATORI_HOST_ID", "20000");
            jail.set_env("SATORI_DISPATCH__MAX_CONCURRENCY", "2");
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.host_id, "20000");
            assert_eq!(config.dispatch.max_concurrency, 2);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        Jail::expect_with(|jail| {
            let missing = jail.directory().join("missing.toml");
            assert!(matches!(
                ConfigLoader::new().file(&missing).load(),
                Err(ConfigError::FileNotFound(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("satori.ini", "host_id = 1")?;
            let path = jail.directory().join("satori.ini");
            assert!(matches!(
                ConfigLoader::new().file(&path).without_env().load(),
                Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
            ));
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
