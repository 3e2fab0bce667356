//! This module provides configuration loading and parsing for the environment utilities.
//! It reads a JSON configuration file, deserializes it into Rust structs, and provides helper
//! functions to retrieve the remote provider, runtime and discretization settings, falling back
//! to logged defaults for anything missing.

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fs, fs::File, io::Read, path::Path, path::PathBuf};

use crate::space_util::discretize::DEFAULT_ACTIONS_PER_LEAF;

/// Name of the configuration file looked up in the current working directory.
pub const DEFAULT_CONFIG_FILE: &str = "relayrl_env_utils.json";

pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;
pub const DEFAULT_THREAD_NAME: &str = "relayrl::provider_actor";

/// The default configuration file path, resolved lazily at runtime.
/// `None` when no configuration file exists in the cwd.
pub static DEFAULT_CONFIG_PATH: Lazy<Option<PathBuf>> =
    Lazy::new(|| find_config_json_path(PathBuf::from(DEFAULT_CONFIG_FILE)));

/// Process-wide configuration, loaded from [DEFAULT_CONFIG_PATH] on first use.
pub static DEFAULT_CONFIG: Lazy<ConfigLoader> = Lazy::new(|| ConfigLoader::new(None));

pub const DEFAULT_CONFIG_CONTENT: &str = r#"{
    "remote_provider": {
        "mailbox_capacity": 64
    },
    "runtime": {
        "_comment": "worker_threads defaults to one less than the core count when omitted.",
        "worker_threads": 2,
        "thread_name": "relayrl::provider_actor"
    },
    "discretization": {
        "default_actions_per_leaf": 10
    }
}"#;

fn find_config_json_path(path: PathBuf) -> Option<PathBuf> {
    if path.exists() {
        info!(
            "[ConfigLoader - find_config_json_path] Found config in current directory: {:?}",
            path
        );
        Some(path)
    } else {
        None
    }
}

/// The root configuration structure.
///
/// Every section is optional; missing sections resolve to defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub remote_provider: Option<RemoteProviderParams>,
    pub runtime: Option<RuntimeParams>,
    pub discretization: Option<DiscretizationParams>,
}

/// Settings of actor-hosted episode parameter providers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoteProviderParams {
    pub mailbox_capacity: usize,
}

/// Settings of the tokio runtime hosting provider actors.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RuntimeParams {
    pub worker_threads: Option<usize>,
    pub thread_name: String,
}

/// Defaults of the discretization utilities.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DiscretizationParams {
    pub default_actions_per_leaf: u64,
}

/// The main configuration loader.
///
/// This struct holds the parsed configuration with every default already resolved.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub remote_provider: RemoteProviderParams,
    pub runtime: RuntimeParams,
    pub discretization: DiscretizationParams,
}

impl ConfigLoader {
    /// Constructs a new [ConfigLoader] instance.
    ///
    /// Loads the configuration from `config_path`, or from [DEFAULT_CONFIG_PATH] when none is
    /// given. Without any configuration file every setting takes its default.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config: Config = match config_path.or_else(|| DEFAULT_CONFIG_PATH.clone()) {
            Some(path) => Self::load_config(&path),
            None => {
                info!("[ConfigLoader - new] No config file found, loading defaults...");
                Config::default()
            }
        };
        Self::from_config(&config)
    }

    /// Resolves every section of an already parsed [Config].
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_provider: Self::set_remote_provider_params(config),
            runtime: Self::set_runtime_params(config),
            discretization: Self::set_discretization_params(config),
        }
    }

    /// Loads and deserializes the configuration file at the given path.
    ///
    /// A file that cannot be read or parsed yields an empty [Config].
    pub fn load_config(config_path: &Path) -> Config {
        match File::open(config_path) {
            Ok(mut file) => {
                let mut contents: String = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!(
                        "[ConfigLoader - load_config] Failed to read configuration file {:?}, loading defaults. Error: {}",
                        config_path, e
                    );
                    return Config::default();
                }
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    warn!(
                        "[ConfigLoader - load_config] Failed to parse configuration, loading empty defaults... Error: {}",
                        e
                    );
                    Config::default()
                })
            }
            Err(e) => {
                warn!(
                    "[ConfigLoader - load_config] Failed to load configuration from {:?}, loading defaults. Error: {:?}",
                    config_path, e
                );
                Config::default()
            }
        }
    }

    /// Writes [DEFAULT_CONFIG_CONTENT] to `path`.
    pub fn write_default_config(path: &Path) -> std::io::Result<()> {
        fs::write(path, DEFAULT_CONFIG_CONTENT)?;
        info!(
            "[ConfigLoader - write_default_config] Created new config at: {:?}",
            path
        );
        Ok(())
    }

    /// Returns a reference to the remote provider parameters.
    pub fn get_remote_provider_params(&self) -> &RemoteProviderParams {
        &self.remote_provider
    }

    /// Returns a reference to the runtime parameters.
    pub fn get_runtime_params(&self) -> &RuntimeParams {
        &self.runtime
    }

    pub fn get_default_actions_per_leaf(&self) -> u64 {
        self.discretization.default_actions_per_leaf
    }

    /// Retrieves the remote provider parameters from the configuration.
    ///
    /// A missing section or a zero mailbox capacity falls back to [DEFAULT_MAILBOX_CAPACITY].
    fn set_remote_provider_params(config: &Config) -> RemoteProviderParams {
        match config.remote_provider.clone() {
            Some(params) if params.mailbox_capacity > 0 => params,
            Some(_) => {
                warn!(
                    "[ConfigLoader - set_remote_provider_params] Mailbox capacity must be positive, loading defaults..."
                );
                RemoteProviderParams {
                    mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
                }
            }
            None => {
                warn!(
                    "[ConfigLoader - set_remote_provider_params] Failed to load remote provider configuration, loading defaults..."
                );
                RemoteProviderParams {
                    mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
                }
            }
        }
    }

    /// Retrieves the runtime parameters from the configuration.
    ///
    /// A zero worker count is treated as unset.
    fn set_runtime_params(config: &Config) -> RuntimeParams {
        let mut params = config.runtime.clone().unwrap_or_else(|| {
            warn!(
                "[ConfigLoader - set_runtime_params] Failed to load runtime configuration, loading defaults..."
            );
            RuntimeParams {
                worker_threads: None,
                thread_name: DEFAULT_THREAD_NAME.to_string(),
            }
        });
        if params.worker_threads == Some(0) {
            warn!(
                "[ConfigLoader - set_runtime_params] Worker thread count must be positive, using the core count instead..."
            );
            params.worker_threads = None;
        }
        params
    }

    /// Retrieves the discretization defaults from the configuration.
    fn set_discretization_params(config: &Config) -> DiscretizationParams {
        config.discretization.clone().unwrap_or_else(|| {
            warn!(
                "[ConfigLoader - set_discretization_params] Failed to load discretization configuration, loading defaults..."
            );
            DiscretizationParams {
                default_actions_per_leaf: DEFAULT_ACTIONS_PER_LEAF,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_content_matches_defaults() {
        let config: Config = serde_json::from_str(DEFAULT_CONFIG_CONTENT).unwrap();
        let loader = ConfigLoader::from_config(&config);
        assert_eq!(
            loader.get_remote_provider_params().mailbox_capacity,
            DEFAULT_MAILBOX_CAPACITY
        );
        assert_eq!(loader.get_runtime_params().thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(loader.get_default_actions_per_leaf(), DEFAULT_ACTIONS_PER_LEAF);
    }

    #[test]
    fn missing_sections_fall_back() {
        let loader = ConfigLoader::from_config(&Config::default());
        assert_eq!(loader.get_runtime_params().worker_threads, None);
        assert_eq!(
            loader.get_remote_provider_params().mailbox_capacity,
            DEFAULT_MAILBOX_CAPACITY
        );
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"{"remote_provider": {"mailbox_capacity": 0}, "discretization": {"default_actions_per_leaf": 21}}"#,
        )
        .unwrap();
        let loader = ConfigLoader::new(Some(path));
        assert_eq!(loader.get_default_actions_per_leaf(), 21);
        assert_eq!(
            loader.get_remote_provider_params().mailbox_capacity,
            DEFAULT_MAILBOX_CAPACITY
        );
    }

    #[test]
    fn writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        ConfigLoader::write_default_config(&path).unwrap();
        let loader = ConfigLoader::new(Some(path));
        assert_eq!(loader.get_runtime_params().worker_threads, Some(2));
    }
}
