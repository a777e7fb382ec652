use anyhow::{bail, Result};
use podium_certification::WorkflowConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub workflow: WorkflowSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Only "memory" is supported; snapshots give it durability
    pub backend: String,
    pub snapshots_enabled: bool,
    pub max_snapshots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub require_trimmed_reason: bool,
    pub max_reason_len: usize,
    pub max_comment_len: usize,
    pub snapshot_on_shutdown: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json"
    pub format: String,
    pub file_output: Option<PathBuf>,
    /// Per-module levels, e.g. `podium_storage = "debug"`
    pub module_filters: BTreeMap<String, String>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "podium-node".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            snapshots_enabled: true,
            max_snapshots: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        let defaults = WorkflowConfig::default();
        Self {
            require_trimmed_reason: defaults.require_trimmed_reason,
            max_reason_len: defaults.max_reason_len,
            max_comment_len: defaults.max_comment_len,
            snapshot_on_shutdown: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: BTreeMap::new(),
        }
    }
}

impl From<&WorkflowSettings> for WorkflowConfig {
    fn from(settings: &WorkflowSettings) -> Self {
        WorkflowConfig {
            max_reason_len: settings.max_reason_len,
            require_trimmed_reason: settings.require_trimmed_reason,
            max_comment_len: settings.max_comment_len,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        // Env overrides are applied by the caller to keep CLI > env > file ordering
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = env::var("PODIUM_DATA_DIR") {
            if !data_dir.is_empty() {
                self.node.data_dir = PathBuf::from(data_dir);
            }
        }
        if let Ok(host) = env::var("PODIUM_API_HOST") {
            if !host.is_empty() {
                self.api.host = host;
            }
        }
        if let Ok(port) = env::var("PODIUM_API_PORT") {
            if let Ok(port) = port.parse() {
                self.api.port = port;
            }
        }
        if let Ok(level) = env::var("PODIUM_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(backend) = env::var("PODIUM_STORAGE_BACKEND") {
            if !backend.is_empty() {
                self.storage.backend = backend;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.backend != "memory" {
            bail!("Unsupported storage backend: {}", self.storage.backend);
        }
        if self.workflow.max_reason_len == 0 {
            bail!("workflow.max_reason_len must be positive");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("Unknown log format: {}", self.logging.format);
        }
        Ok(())
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        (&self.workflow).into()
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.node.data_dir.join("snapshots")
    }
}
