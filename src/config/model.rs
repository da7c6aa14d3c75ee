use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const DEFAULT_INTERVAL: u64 = 30;
const DEFAULT_PORT: u16 = 22;
const DEFAULT_COMMAND_TIMEOUT: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// One monitored machine. Identity for state tracking is `host`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub label: String,
}

impl HostConfig {
    pub fn new(name: &str, host: &str, user: &str) -> HostConfig {
        let mut hc = HostConfig {
            name: name.to_string(),
            host: host.to_string(),
            user: user.to_string(),
            port: 0,
            key_file: None,
            password: None,
            label: String::new(),
        };
        hc.apply_defaults();
        hc
    }

    fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.label.is_empty() {
            self.label = self.name.clone();
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where state transitions are reported. Either, both or neither may be set.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    /// POST URL for state changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// shell command, `{host}` `{label}` `{state}` replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl NotifyConfig {
    pub fn is_empty(&self) -> bool {
        self.webhook.is_none() && self.command.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostKeyPolicy {
    /// Trust whatever key the remote presents.
    #[default]
    Accept,
    /// Pin the fingerprint seen on first contact, reject later mismatches.
    Tofu,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// seconds between checks
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub dispatch_file: Option<PathBuf>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// seconds a single remote command may run
    #[serde(default)]
    pub command_timeout: u64,
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Config, ConfigError> {
        let mut cfg: Config = serde_yaml::from_str(raw)?;
        if cfg.interval == 0 {
            cfg.interval = DEFAULT_INTERVAL;
        }
        if cfg.command_timeout == 0 {
            cfg.command_timeout = DEFAULT_COMMAND_TIMEOUT;
        }
        if cfg.max_concurrency == Some(0) {
            cfg.max_concurrency = None;
        }
        for hc in cfg.hosts.iter_mut() {
            hc.apply_defaults();
        }
        Ok(cfg)
    }

    pub fn dispatch_path(&self) -> PathBuf {
        self.dispatch_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| state_dir().join("dispatch.json"))
    }

    pub fn known_hosts_path(&self) -> PathBuf {
        self.known_hosts_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| state_dir().join("known_hosts.json"))
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.pulse`, home of the dispatch and fingerprint files.
pub fn state_dir() -> PathBuf {
    home_dir().join(".pulse")
}

pub fn default_config_path() -> PathBuf {
    home_dir().join(".config").join("pulse").join("hosts.yaml")
}

/// Expands a leading `~/` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = Config::from_yaml(&raw)?;
    info!("loaded {} hosts from {}", cfg.hosts.len(), path.display());
    Ok(cfg)
}

const SAMPLE: &str = r#"# Pulse - Host Monitor Configuration
interval: 30  # seconds between checks

hosts:
  - name: example
    host: 192.168.1.100
    user: admin
    port: 22
    label: "Example Server"
    # key_file: ~/.ssh/id_ed25519
    # password: use key_file instead

# notify:
#   webhook: https://example.com/hooks/pulse
#   command: notify-send "pulse" "{label} ({host}) is {state}"

# max_concurrency: 32
# command_timeout: 10
# host_key_policy: tofu  # or accept
"#;

pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(write_err)?;
    }
    std::fs::write(path, SAMPLE).map_err(write_err)
}
