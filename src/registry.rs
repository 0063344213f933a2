use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use utoipa::ToSchema;

const DEFAULT_DEVICE_CLASS: &str = "default";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid registry format in {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read registry {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Heater '{0}' not found")]
    UnknownDevice(String),
}

/// One heater entry as stored in `heaters.json`.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "heaterName")]
    #[schema(example = "office-1")]
    pub heater_name: String,

    #[serde(default)]
    #[schema(example = "miner-office-1")]
    pub hostname: String,

    #[serde(rename = "ipAddress", default)]
    #[schema(example = "192.168.24.206")]
    pub ip_address: String,

    #[serde(default)]
    #[schema(example = "office")]
    pub location: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "s9")]
    pub device_class: Option<String>,
}

impl DeviceRecord {
    pub fn device_class(&self) -> &str {
        self.device_class
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_DEVICE_CLASS)
    }

    /// Value substituted into configuration templates.
    pub fn identifier(&self) -> &str {
        let hostname = self.hostname.trim();
        if hostname.is_empty() {
            &self.heater_name
        } else {
            hostname
        }
    }

    /// Address used to reach the device: the mDNS hostname when one is
    /// recorded, otherwise the raw IP address.
    pub fn remote_address(&self, hostname_suffix: &str) -> String {
        if self.hostname.trim().is_empty() {
            self.ip_address.clone()
        } else {
            format!("{}{}", self.hostname.trim(), hostname_suffix)
        }
    }
}

/// Load the whole registry. Either every record decodes or the call fails.
pub async fn load(path: &Path) -> Result<Vec<DeviceRecord>, RegistryError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RegistryError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(RegistryError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    serde_json::from_str(&text).map_err(|e| RegistryError::Format {
        path: path.to_path_buf(),
        source: e,
    })
}

/// First record whose name matches. Duplicate names are not rejected, so a
/// later entry with the same name is unreachable.
pub fn find<'a>(records: &'a [DeviceRecord], name: &str) -> Result<&'a DeviceRecord, RegistryError> {
    records
        .iter()
        .find(|r| r.heater_name == name)
        .ok_or_else(|| RegistryError::UnknownDevice(name.to_string()))
}

pub fn duplicate_names(records: &[DeviceRecord]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut dups: Vec<String> = Vec::new();
    for r in records {
        if !seen.insert(r.heater_name.as_str()) && !dups.contains(&r.heater_name) {
            dups.push(r.heater_name.clone());
        }
    }
    dups
}
