//! Configuration loader for jobcast
//!
//! Handles layered configuration loading from TOML files and environment
//! variables with proper precedence.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Environment variable for configuration directory
const CONFIG_DIR_ENV: &str = "JOBCAST_CONFIG_DIR";

/// Environment variable for a single configuration file
const CONFIG_FILE_ENV: &str = "JOBCAST_CONFIG_FILE";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "JOBCAST";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader that handles layered configuration loading
///
/// Sources in order of priority:
/// 1. `default.toml` - base configuration (optional; every field has a default)
/// 2. `{environment}.toml` - environment-specific configuration (optional)
/// 3. `local.toml` - local development overrides (optional)
/// 4. `JOBCAST_*` environment variables (highest priority)
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// Single configuration file; when set, skips layered loading.
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a new configuration loader from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if both `JOBCAST_CONFIG_DIR` and `JOBCAST_CONFIG_FILE`
    /// are set, as they are mutually exclusive.
    pub fn new() -> AppResult<Self> {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_file.is_some() && std::env::var(CONFIG_DIR_ENV).is_ok() {
            return Err(AppError::Configuration {
                key: CONFIG_FILE_ENV.to_string(),
                source: anyhow::anyhow!(
                    "{} and {} cannot both be set",
                    CONFIG_DIR_ENV,
                    CONFIG_FILE_ENV
                ),
            });
        }

        let environment = AppEnvironment::from_env();

        Ok(Self {
            config_dir,
            config_file,
            environment,
        })
    }

    /// Loader pinned to a single configuration file, as selected by the
    /// `--config` CLI flag.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
            environment: AppEnvironment::from_env(),
        }
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Load and validate settings from all sources.
    pub fn load(&self) -> AppResult<Settings> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| AppError::Configuration {
            key: "settings".to_string(),
            source: anyhow::Error::new(e).context("failed to deserialize configuration"),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> AppResult<Config> {
        let builder = Config::builder();

        let builder = if let Some(ref config_file) = self.config_file {
            Self::add_file_source(builder, config_file, true)
        } else {
            self.build_layered_config(builder)
        };

        let builder = Self::add_env_source(builder);

        builder.build().map_err(|e| AppError::Configuration {
            key: "config".to_string(),
            source: anyhow::Error::new(e),
        })
    }

    fn build_layered_config(
        &self,
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> config::ConfigBuilder<config::builder::DefaultState> {
        let default_path = self.config_dir.join("default.toml");
        let builder = Self::add_file_source(builder, &default_path, false);

        let env_path = self
            .config_dir
            .join(format!("{}.toml", self.environment.as_str()));
        let builder = Self::add_file_source(builder, &env_path, false);

        let local_path = self.config_dir.join("local.toml");
        Self::add_file_source(builder, &local_path, false)
    }

    fn add_file_source(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: &Path,
        required: bool,
    ) -> config::ConfigBuilder<config::builder::DefaultState> {
        builder.add_source(
            File::new(path.to_str().unwrap_or_default(), FileFormat::Toml).required(required),
        )
    }

    /// Environment variables with prefix `JOBCAST_` are mapped to configuration
    /// keys, with `__` separating nested keys.
    ///
    /// Examples:
    /// - `JOBCAST_STORE__URL` -> `store.url`
    /// - `JOBCAST_BUS__REDIS__URL` -> `bus.redis.url`
    fn add_env_source(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> config::ConfigBuilder<config::builder::DefaultState> {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: None,
            environment: AppEnvironment::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::config::settings::{EmailProvider, StoreBackend};

    // Tests mutate process-wide environment variables, so they run sequentially.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            let path = temp_dir.path().join(name);
            fs::write(&path, content).expect("Failed to write config file");
        }
        temp_dir
    }

    struct EnvGuard {
        vars_to_restore: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self {
                vars_to_restore: Vec::new(),
            }
        }

        fn set(&mut self, key: &str, value: &str) {
            let original = std::env::var(key).ok();
            self.vars_to_restore.push((key.to_string(), original));
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            let original = std::env::var(key).ok();
            self.vars_to_restore.push((key.to_string(), original));
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original_value) in &self.vars_to_restore {
                unsafe {
                    match original_value {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    const MEMORY_CONFIG: &str = r#"
[store]
backend = "memory"

[cache]
backend = "memory"

[bus]
backend = "memory"

[blob]
backend = "memory"

[email]
provider = "recording"
"#;

    #[test]
    fn mutual_exclusivity_error() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        env.set(CONFIG_DIR_ENV, "/custom/config");
        env.set(CONFIG_FILE_ENV, "/path/to/config.toml");

        assert!(ConfigLoader::new().is_err());
    }

    #[test]
    fn loads_layered_config() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let local_config = r#"
[bus]
group = "jobcast-local"
"#;

        let temp_dir = setup_config_dir(&[
            ("default.toml", MEMORY_CONFIG),
            ("local.toml", local_config),
        ]);

        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.remove(CONFIG_FILE_ENV);
        env.remove(AppEnvironment::ENV_VAR);

        let loader = ConfigLoader::new().expect("Should create loader");
        let settings = loader.load().expect("Should load settings");

        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.email.provider, EmailProvider::Recording);
        assert_eq!(settings.bus.group, "jobcast-local");
        // Untouched sections keep their defaults.
        assert_eq!(settings.bus.intake_topic, "job.notification.pending");
    }

    #[test]
    fn env_vars_override_files() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", MEMORY_CONFIG)]);

        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.remove(CONFIG_FILE_ENV);
        env.remove(AppEnvironment::ENV_VAR);
        env.set("JOBCAST_CACHE__REDIS__KEY_PREFIX", "override");

        let loader = ConfigLoader::new().expect("Should create loader");
        let settings = loader.load().expect("Should load settings");

        assert_eq!(settings.cache.redis.key_prefix, "override");
    }

    #[test]
    fn single_file_mode() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("single.toml", MEMORY_CONFIG)]);
        let config_file_path = temp_dir.path().join("single.toml");

        env.remove(CONFIG_DIR_ENV);
        env.set(CONFIG_FILE_ENV, config_file_path.to_str().unwrap());
        env.remove(AppEnvironment::ENV_VAR);

        let loader = ConfigLoader::new().expect("Should create loader");
        let settings = loader.load().expect("Should load settings");

        assert_eq!(settings.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        // Postgres backend with no URL.
        let temp_dir = setup_config_dir(&[(
            "default.toml",
            r#"
[store]
backend = "postgres"

[email]
provider = "recording"
"#,
        )]);

        env.set(CONFIG_DIR_ENV, temp_dir.path().to_str().unwrap());
        env.remove(CONFIG_FILE_ENV);
        env.remove(AppEnvironment::ENV_VAR);

        let loader = ConfigLoader::new().expect("Should create loader");
        assert!(loader.load().is_err());
    }
}
