//! Controller configuration.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeClient;
use crate::crypto;
use crate::discovery::LocalScanner;
use crate::errors::Error;
use crate::transport::TuyaTransport;
use crate::warmth::WarmthTable;

type Result<T> = std::result::Result<T, Error>;

/// Everything the controller needs to reach its lights.
///
/// # Examples
///
/// ```
/// use lightdeck::ControllerConfig;
///
/// let config = ControllerConfig::from_json_str(r#"{
///     "devices": {"bf9a3d6f01": {"key": "0123456789abcdef", "name": "Desk"}},
///     "bridge": {"base_url": "http://10.0.0.2", "token": "s3cret"},
///     "scan": {"window_secs": 5}
/// }"#).unwrap();
///
/// assert_eq!(config.devices["bf9a3d6f01"].version, "3.3");
/// assert_eq!(config.scan.port, 6667);
/// assert!(ControllerConfig::from_json_str(r#"{"devices": {"x": {"key": "short"}}}"#).is_err());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Local bulbs by device id.
    #[serde(default)]
    pub devices: BTreeMap<String, LocalDeviceConfig>,
    pub bridge: Option<BridgeConfig>,
    /// Calibration file replacing the built-in warmth table.
    pub warmth_table: Option<PathBuf>,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDeviceConfig {
    /// The bulb's 16 character local key.
    pub key: String,
    pub name: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    /// Fixed address; the bulb is registered even when it stays silent.
    pub ip: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub base_url: String,
    pub token: String,
    /// Fade applied to every bridge write.
    pub transition_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            port: default_port(),
            window_secs: default_window(),
        }
    }
}

fn default_version() -> String {
    "3.3".to_string()
}

fn default_port() -> u16 {
    LocalScanner::PORT
}

fn default_window() -> u64 {
    LocalScanner::WINDOW.as_secs()
}

impl ControllerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ControllerConfig = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("cannot parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        for (id, device) in &self.devices {
            crypto::device_key(&device.key)
                .map_err(|e| Error::Config(format!("device {id}: {e}")))?;
            if device.version != TuyaTransport::VERSION {
                return Err(Error::Config(format!(
                    "device {id}: protocol {} is not supported, only {}",
                    device.version,
                    TuyaTransport::VERSION
                )));
            }
        }
        if self.scan.window_secs == 0 {
            return Err(Error::Config("scan window must be at least one second".into()));
        }
        Ok(())
    }

    /// The configured calibration, or the built-in one.
    pub fn warmth(&self) -> Result<WarmthTable> {
        match &self.warmth_table {
            Some(path) => WarmthTable::load(path),
            None => WarmthTable::builtin(),
        }
    }

    /// Friendly names of local bulbs by id.
    pub fn names(&self) -> HashMap<String, String> {
        self.devices
            .iter()
            .filter_map(|(id, device)| device.name.clone().map(|name| (id.clone(), name)))
            .collect()
    }

    pub fn local_scanner(&self) -> LocalScanner {
        LocalScanner::new()
            .with_port(self.scan.port)
            .with_window(Duration::from_secs(self.scan.window_secs))
            .with_names(self.names())
    }

    pub fn bridge_client(&self) -> Result<Option<BridgeClient>> {
        self.bridge
            .as_ref()
            .map(|bridge| BridgeClient::new(&bridge.base_url, &bridge.token))
            .transpose()
    }
}
