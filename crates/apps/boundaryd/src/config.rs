use std::fs;
use std::io;
use std::path::Path;

use boundary_bridge::BridgeConfig;
use serde::Deserialize;

/// Node configuration: up to two bridge interfaces plus loop pacing.
///
/// A boundary node usually runs both: a client-mode `[backbone]` uplink
/// toward the wide-area backbone and a server-mode `[local]` listener for
/// devices on the same segment. Either section may be omitted.
#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    /// WAN-side uplink, usually client mode toward a backbone daemon.
    pub backbone: Option<BridgeConfig>,

    /// LAN-side listener for local devices.
    pub local: Option<BridgeConfig>,

    /// Tick cadence for interface maintenance.
    #[serde(default = "defaults::poll_ms")]
    pub poll_ms: u64,

    /// Interval between status log lines.
    #[serde(default = "defaults::status_secs")]
    pub status_secs: u64,
}

mod defaults {
    pub fn poll_ms() -> u64 {
        10
    }
    pub fn status_secs() -> u64 {
        60
    }
}

impl NodeConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn has_interfaces(&self) -> bool {
        self.backbone.is_some() || self.local.is_some()
    }
}
