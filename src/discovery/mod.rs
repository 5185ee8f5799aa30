//! Device discovery.
//!
//! Local bulbs are found by listening for their UDP broadcasts, bridge lights
//! by asking the bridge. Both produce identity records that the controller
//! turns into devices.

mod bridge;
mod local;

use serde::Serialize;

use crate::device::DeviceKind;

pub use bridge::{BridgeDeviceRecord, BridgeScanner};
pub use local::{LocalDeviceRecord, LocalScanner, ScanState};

/// An identity record from either scanner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceRecord {
    Local(LocalDeviceRecord),
    Bridge(BridgeDeviceRecord),
}

impl DeviceRecord {
    pub fn id(&self) -> &str {
        match self {
            DeviceRecord::Local(record) => &record.id,
            DeviceRecord::Bridge(record) => &record.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DeviceRecord::Local(record) => record.name.as_deref(),
            DeviceRecord::Bridge(record) => Some(&record.name),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceRecord::Local(_) => DeviceKind::Local,
            DeviceRecord::Bridge(_) => DeviceKind::Bridge,
        }
    }
}

impl From<LocalDeviceRecord> for DeviceRecord {
    fn from(record: LocalDeviceRecord) -> Self {
        DeviceRecord::Local(record)
    }
}

impl From<BridgeDeviceRecord> for DeviceRecord {
    fn from(record: BridgeDeviceRecord) -> Self {
        DeviceRecord::Bridge(record)
    }
}
