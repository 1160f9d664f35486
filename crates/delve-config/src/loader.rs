use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::DelveConfig;

/// Loads the Delve configuration from disk and the environment.
pub struct ConfigLoader {
    config: DelveConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > DELVE_CONFIG env > ~/.delve/delve.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("DELVE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".delve")
            .join("delve.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> delve_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            DelveConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(delve_core::DelveError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, config_path: &Path) -> delve_core::Result<DelveConfig> {
        toml::from_str::<DelveConfig>(raw).map_err(|e| {
            delve_core::DelveError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> DelveConfig {
        self.config.clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (DELVE_API_URL, DELVE_BATCH_SIZE, etc.)
    fn apply_env_overrides(mut config: DelveConfig) -> DelveConfig {
        if let Ok(v) = std::env::var("DELVE_API_URL") {
            config.api.base_url = v;
        }
        // The file wins for the email; the env var only fills a blank.
        if config.api.commander_email.is_empty() {
            if let Ok(v) = std::env::var("DELVE_COMMANDER_EMAIL") {
                config.api.commander_email = v;
            }
        }
        if let Ok(v) = std::env::var("DELVE_REQUEST_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                config.api.request_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("DELVE_BATCH_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                config.explorer.batch_size = size;
            }
        }
        if let Ok(v) = std::env::var("DELVE_SHUFFLE") {
            if let Ok(shuffle) = v.parse::<bool>() {
                config.explorer.shuffle = shuffle;
            }
        }
        if let Ok(v) = std::env::var("DELVE_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
