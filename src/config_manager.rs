//! Configuration loading, validation, and hot-reload for the RIP engine.
//!
//! Mirrors the structure of a prior ambient configuration layer: JSON on
//! disk, validated before being applied, with a `notify`-driven watcher
//! that reloads and republishes changes over a `tokio::sync::watch`
//! channel whenever the file is modified on disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use log::warn;

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Top-level on-disk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub router_id: String,
    pub interfaces: Vec<InterfaceConfig>,
    pub rip: RipConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub address: String,
    pub enabled: bool,
    pub cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RipConfig {
    pub enabled: bool,
    pub port: u16,
    pub advertise_interval_secs: u64,
    pub timeout_secs: u64,
    pub infinity_metric: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub console_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub collection_interval: u64,
}

#[derive(Debug, Clone)]
struct ConfigSnapshot {
    version: u32,
    timestamp: DateTime<Utc>,
    config: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigHistoryEntry {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDiff {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub previous: String,
    pub current: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_id: "192.168.1.1".to_string(),
            interfaces: vec![InterfaceConfig {
                name: "eth0".to_string(),
                address: "192.168.1.1/24".to_string(),
                enabled: true,
                cost: 1,
            }],
            rip: RipConfig {
                enabled: true,
                port: crate::protocol::RIP_PORT,
                advertise_interval_secs: crate::ADVERT_INTERVAL_SECS,
                timeout_secs: crate::RIP_TIMEOUT_SECS,
                infinity_metric: crate::INFINITY,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                console_output: true,
            },
            metrics: MetricsConfig {
                enabled: true,
                collection_interval: 60,
            },
        }
    }
}

/// Configuration validation result.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
        self.valid = false;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }
}

/// Configuration manager with hot-reload support.
pub struct ConfigManager {
    config_path: PathBuf,
    current_config: Arc<RwLock<RouterConfig>>,
    config_version: Arc<RwLock<u32>>,
    change_sender: watch::Sender<RouterConfig>,
    history: Arc<RwLock<VecDeque<ConfigSnapshot>>>,
    history_limit: usize,
    _watcher: RecommendedWatcher,
}

impl ConfigManager {
    pub async fn new(
        config_path: impl AsRef<Path>,
    ) -> Result<(Self, watch::Receiver<RouterConfig>)> {
        let config_path = config_path.as_ref().to_path_buf();

        let config = Self::load_config(&config_path).await.unwrap_or_else(|_| {
            warn!("Failed to load config, using defaults");
            RouterConfig::default()
        });

        let current_config = Arc::new(RwLock::new(config.clone()));
        let config_version = Arc::new(RwLock::new(1));
        let history = Arc::new(RwLock::new(VecDeque::new()));
        {
            let mut history_guard = history.write().await;
            history_guard.push_back(ConfigSnapshot {
                version: 1,
                timestamp: Utc::now(),
                config: config.clone(),
            });
        }
        let (change_sender, change_receiver) = watch::channel(config.clone());

        let watcher = Self::setup_file_watcher(
            &config_path,
            current_config.clone(),
            config_version.clone(),
            change_sender.clone(),
            history.clone(),
            DEFAULT_HISTORY_LIMIT,
        )?;

        let manager = Self {
            config_path,
            current_config,
            config_version,
            change_sender,
            history,
            history_limit: DEFAULT_HISTORY_LIMIT,
            _watcher: watcher,
        };

        Ok((manager, change_receiver))
    }

    async fn load_config(path: &Path) -> Result<RouterConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: RouterConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    fn setup_file_watcher(
        config_path: &Path,
        current_config: Arc<RwLock<RouterConfig>>,
        config_version: Arc<RwLock<u32>>,
        change_sender: watch::Sender<RouterConfig>,
        history: Arc<RwLock<VecDeque<ConfigSnapshot>>>,
        history_limit: usize,
    ) -> Result<RecommendedWatcher> {
        let config_path = config_path.to_path_buf();
        let watch_path = config_path.clone();
        let runtime = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let config_path = config_path.clone();
            let current_config = current_config.clone();
            let config_version = config_version.clone();
            let change_sender = change_sender.clone();
            let runtime = runtime.clone();
            let history = history.clone();

            runtime.spawn(async move {
                match res {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Modify(_)) {
                            log::info!("configuration file changed, reloading");

                            match Self::load_config(&config_path).await {
                                Ok(new_config) => {
                                    let validation = Self::validate_config(&new_config);
                                    if !validation.is_valid() {
                                        log::error!("invalid configuration detected:");
                                        for error in &validation.errors {
                                            log::error!("  - {}", error);
                                        }
                                        return;
                                    }
                                    for warning in &validation.warnings {
                                        log::warn!("{}", warning);
                                    }

                                    {
                                        let mut config = current_config.write().await;
                                        *config = new_config.clone();
                                    }
                                    {
                                        let mut version = config_version.write().await;
                                        *version += 1;
                                    }

                                    if let Err(e) = change_sender.send(new_config.clone()) {
                                        log::error!("failed to notify config change: {}", e);
                                    } else {
                                        log::info!("configuration reloaded successfully");
                                        let current_version = *config_version.read().await;
                                        Self::record_snapshot(
                                            &history,
                                            history_limit,
                                            current_version,
                                            new_config,
                                        )
                                        .await;
                                    }
                                }
                                Err(e) => {
                                    log::error!("failed to reload configuration: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        log::error!("file watcher error: {}", e);
                    }
                }
            });
        })?;

        watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    pub async fn get_config(&self) -> RouterConfig {
        self.current_config.read().await.clone()
    }

    pub async fn update_config(&self, new_config: RouterConfig) -> Result<()> {
        let validation = Self::validate_config(&new_config);
        if !validation.is_valid() {
            return Err(anyhow::anyhow!(
                "Configuration validation failed: {:?}",
                validation.errors
            ));
        }

        let json =
            serde_json::to_string_pretty(&new_config).context("Failed to serialize config")?;
        tokio::fs::write(&self.config_path, json)
            .await
            .context("Failed to write config file")?;

        {
            let mut config = self.current_config.write().await;
            *config = new_config.clone();
        }
        {
            let mut version = self.config_version.write().await;
            *version += 1;
        }

        if let Err(e) = self.change_sender.send(new_config.clone()) {
            warn!("Config change notification dropped: {}", e);
        }

        log::info!("configuration updated successfully");

        let current_version = *self.config_version.read().await;
        Self::record_snapshot(
            &self.history,
            self.history_limit,
            current_version,
            new_config,
        )
        .await;
        Ok(())
    }

    pub async fn list_history(&self) -> Vec<ConfigHistoryEntry> {
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .map(|snapshot| ConfigHistoryEntry {
                version: snapshot.version,
                timestamp: snapshot.timestamp,
            })
            .collect()
    }

    pub async fn diff(&self, version: u32) -> Result<ConfigDiff> {
        let snapshot = {
            let history = self.history.read().await;
            history
                .iter()
                .find(|entry| entry.version == version)
                .cloned()
        }
        .ok_or_else(|| anyhow::anyhow!("Snapshot not found"))?;

        let current = self.get_config().await;

        Ok(ConfigDiff {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            previous: serde_json::to_string_pretty(&snapshot.config)
                .context("Failed to serialize snapshot config")?,
            current: serde_json::to_string_pretty(&current)
                .context("Failed to serialize current config")?,
        })
    }

    pub async fn rollback_to(&self, version: u32) -> Result<()> {
        let snapshot = {
            let history = self.history.read().await;
            history
                .iter()
                .find(|entry| entry.version == version)
                .cloned()
        }
        .ok_or_else(|| anyhow::anyhow!("Snapshot not found"))?;

        self.update_config(snapshot.config).await
    }

    async fn record_snapshot(
        history: &Arc<RwLock<VecDeque<ConfigSnapshot>>>,
        limit: usize,
        version: u32,
        config: RouterConfig,
    ) {
        let mut guard = history.write().await;
        guard.retain(|snapshot| snapshot.version != version);
        guard.push_back(ConfigSnapshot {
            version,
            timestamp: Utc::now(),
            config,
        });
        while guard.len() > limit {
            guard.pop_front();
        }
    }

    pub fn validate_config(config: &RouterConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.router_id.is_empty() {
            result.add_error("Router ID cannot be empty".to_string());
        } else if config.router_id.parse::<std::net::IpAddr>().is_err() {
            result.add_warning("Router ID should be a valid IP address".to_string());
        }

        if config.interfaces.is_empty() {
            result.add_error("At least one interface must be configured".to_string());
        }

        for interface in &config.interfaces {
            if interface.name.is_empty() {
                result.add_error("Interface name cannot be empty".to_string());
            }
            if interface.address.parse::<std::net::SocketAddr>().is_err()
                && interface.address.parse::<std::net::IpAddr>().is_err()
                && !interface.address.contains('/')
            {
                result.add_error(format!("Invalid interface address: {}", interface.address));
            }
            if interface.cost == 0 {
                result.add_warning(format!(
                    "Interface {} has cost 0, which may cause issues",
                    interface.name
                ));
            }
        }

        if config.rip.enabled {
            if config.rip.port == 0 {
                result.add_error("RIP port cannot be 0".to_string());
            }
            if config.rip.advertise_interval_secs == 0 {
                result.add_error("RIP advertise interval cannot be 0".to_string());
            }
            if config.rip.infinity_metric == 0 {
                result.add_error("RIP infinity metric cannot be 0".to_string());
            }
            if config.rip.infinity_metric != crate::INFINITY {
                result.add_warning(format!(
                    "RIP infinity metric {} differs from the standard value 16",
                    config.rip.infinity_metric
                ));
            }
        }

        if config.logging.level.is_empty() {
            result.add_error("Log level cannot be empty".to_string());
        } else {
            let valid_levels = ["error", "warn", "info", "debug", "trace"];
            if !valid_levels.contains(&config.logging.level.as_str()) {
                result.add_error(format!("Invalid log level: {}", config.logging.level));
            }
        }

        result
    }

    pub async fn get_config_version(&self) -> u32 {
        *self.config_version.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = RouterConfig::default();
        let result = ConfigManager::validate_config(&config);
        assert!(result.is_valid());
    }

    #[test]
    fn empty_router_id_and_interfaces_are_rejected() {
        let mut config = RouterConfig::default();
        config.router_id = "".to_string();
        config.interfaces.clear();

        let result = ConfigManager::validate_config(&config);
        assert!(!result.is_valid());
        assert!(result.errors.len() >= 2);
    }

    #[tokio::test]
    async fn update_config_persists_to_disk_and_bumps_version() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let config = RouterConfig::default();
        let config_json = serde_json::to_string_pretty(&config).unwrap();
        tokio::fs::write(&config_path, config_json).await.unwrap();

        let (manager, _) = ConfigManager::new(&config_path).await.unwrap();
        assert_eq!(manager.get_config_version().await, 1);

        let mut new_config = config.clone();
        new_config.router_id = "192.168.2.1".to_string();
        manager.update_config(new_config.clone()).await.unwrap();

        assert_eq!(manager.get_config_version().await, 2);
        assert_eq!(manager.get_config().await.router_id, new_config.router_id);

        let on_disk = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(on_disk.contains("192.168.2.1"));
    }
}
