//! Enumeration of lights behind a bridge.

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::bridge::BridgeClient;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Identity of a light as listed by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeDeviceRecord {
    pub id: String,
    /// Numeric index used in the bridge's URLs.
    pub index: u32,
    pub name: String,
    pub model: String,
    pub raw_state: Value,
}

/// Asks the bridge which lights it knows.
#[derive(Debug, Clone)]
pub struct BridgeScanner {
    client: BridgeClient,
}

impl BridgeScanner {
    pub fn new(client: BridgeClient) -> Self {
        BridgeScanner { client }
    }

    pub async fn scan(&self) -> Result<Vec<BridgeDeviceRecord>> {
        let lights = self.client.list_lights().await?;
        let mut records = Vec::with_capacity(lights.len());

        for (id, light) in lights {
            let Ok(index) = id.parse::<u32>() else {
                warn!("skipping bridge light with non-numeric id {id:?}");
                continue;
            };
            let text = |field: &str| {
                light
                    .get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            records.push(BridgeDeviceRecord {
                index,
                name: text("name"),
                model: text("modelid"),
                raw_state: light.get("state").cloned().unwrap_or(Value::Null),
                id,
            });
        }

        debug!("bridge lists {} light(s)", records.len());
        Ok(records)
    }
}
