//! HTTP client for the bridge's light API.

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// State of one bridge light, as reported by the bridge.
///
/// Fields a light's hardware lacks are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeLightState {
    #[serde(default)]
    pub on: bool,
    pub bri: Option<u8>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    pub xy: Option<[f64; 2]>,
    pub ct: Option<u16>,
    pub alert: Option<Alert>,
    pub effect: Option<Effect>,
    /// Active color space: `hs`, `xy` or `ct`.
    pub colormode: Option<String>,
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeLight {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "modelid", default)]
    pub model: String,
    pub state: BridgeLightState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alert {
    None,
    /// One breathe cycle.
    Select,
    /// Breathe cycles for 15 seconds.
    Lselect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    None,
    Colorloop,
}

/// A partial state update. Only the fields that are set are sent.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatePayload {
    pub on: Option<bool>,
    pub bri: Option<u8>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    pub xy: Option<[f64; 2]>,
    pub ct: Option<u16>,
    pub alert: Option<Alert>,
    pub effect: Option<Effect>,
    /// Multiples of 100ms.
    pub transitiontime: Option<u16>,
}

/// Talks to one bridge with one access token.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BridgeClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()?;
        Ok(BridgeClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.token, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        debug!("GET {}", url);
        let body: Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        check_errors(&body)?;
        Ok(body)
    }

    /// Every light on the bridge, keyed by its index, in raw form.
    pub async fn list_lights(&self) -> Result<BTreeMap<String, Value>> {
        let body = self.get_json("lights").await?;
        serde_json::from_value(body).map_err(Error::JsonLoad)
    }

    pub async fn get_light(&self, index: u32) -> Result<BridgeLight> {
        let body = self.get_json(&format!("lights/{index}")).await?;
        serde_json::from_value(body).map_err(Error::JsonLoad)
    }

    pub async fn get_state(&self, index: u32) -> Result<BridgeLightState> {
        Ok(self.get_light(index).await?.state)
    }

    /// Apply a partial state update.
    pub async fn set_state(&self, index: u32, payload: &StatePayload) -> Result<()> {
        let url = self.url(&format!("lights/{index}/state"));
        debug!("PUT {} {:?}", url, payload);
        let body: Value = self
            .http
            .put(&url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_errors(&body)
    }
}

/// The bridge answers with 200 and a list of `success`/`error` entries.
fn check_errors(body: &Value) -> Result<()> {
    let Some(entries) = body.as_array() else {
        return Ok(());
    };
    for entry in entries {
        if let Some(error) = entry.get("error") {
            let field = |name: &str| {
                error
                    .get(name)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            return Err(Error::Bridge {
                address: field("address"),
                description: field("description"),
            });
        }
    }
    Ok(())
}
