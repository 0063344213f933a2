use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./heaters.json")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("bosminerConfig")
}

fn default_render_dir() -> PathBuf {
    PathBuf::from("./tmpFile")
}

fn default_placeholder() -> String {
    "{hostname}".to_string()
}

fn default_remote_config_path() -> String {
    "/etc/bosminer.toml".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_private_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join("id_rsa")
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_operation_timeout_ms() -> u64 {
    60_000
}

fn default_hostname_suffix() -> String {
    ".local".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SshSettings {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Appended to a registry hostname to form the address (mDNS).
    #[serde(default = "default_hostname_suffix")]
    pub hostname_suffix: String,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            username: default_username(),
            private_key_path: default_private_key_path(),
            passphrase: None,
            port: default_ssh_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            hostname_suffix: default_hostname_suffix(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    #[serde(default = "default_render_dir")]
    pub render_dir: PathBuf,
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_remote_config_path")]
    pub remote_config_path: String,
    /// Per device class override of `remote_config_path`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub remote_config_paths: HashMap<String, String>,
    #[serde(default)]
    pub ssh: SshSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            registry_path: default_registry_path(),
            template_dir: default_template_dir(),
            render_dir: default_render_dir(),
            placeholder: default_placeholder(),
            remote_config_path: default_remote_config_path(),
            remote_config_paths: HashMap::new(),
            ssh: SshSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Read `config.yaml`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// `{template_dir}/bosminer-{class}-{action}.toml`
    pub fn template_path(&self, device_class: &str, action: &str) -> PathBuf {
        self.template_dir
            .join(format!("bosminer-{device_class}-{action}.toml"))
    }

    pub fn remote_config_path_for(&self, device_class: &str) -> &str {
        self.remote_config_paths
            .get(device_class)
            .map(String::as_str)
            .unwrap_or(&self.remote_config_path)
    }
}
