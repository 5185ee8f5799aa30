//! The uniform device interface.
//!
//! Every light is either a local bulb or a bridge light. [`Device`] exposes
//! one set of operations over both; operations a kind cannot perform fail with
//! [`Error::CapabilityMismatch`] before anything is sent.

mod bridge;
mod local;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use strum_macros::Display;

use crate::bridge::{Alert, Effect};
use crate::errors::Error;
use crate::runtime;
use crate::scene::Scene;
use crate::status::{LightState, ModeChange};
use crate::types::{Hsv, Mode, Percentage, Rgb};

pub use bridge::BridgeDevice;
pub use local::LocalDevice;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Local,
    Bridge,
}

/// A light of either kind.
#[derive(Debug)]
pub enum Device {
    Local(LocalDevice),
    Bridge(BridgeDevice),
}

/// What [`LightController::list_devices`](crate::LightController::list_devices) reports.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: Option<String>,
    pub kind: DeviceKind,
}

impl From<LocalDevice> for Device {
    fn from(device: LocalDevice) -> Self {
        Device::Local(device)
    }
}

impl From<BridgeDevice> for Device {
    fn from(device: BridgeDevice) -> Self {
        Device::Bridge(device)
    }
}

impl Device {
    pub fn id(&self) -> &str {
        match self {
            Device::Local(d) => d.id(),
            Device::Bridge(d) => d.id(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Device::Local(d) => d.name(),
            Device::Bridge(d) => d.name(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Local(_) => DeviceKind::Local,
            Device::Bridge(_) => DeviceKind::Bridge,
        }
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            id: self.id().to_string(),
            name: self.name().map(String::from),
            kind: self.kind(),
        }
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::unsupported(self.kind(), operation)
    }

    pub async fn get_toggle(&self) -> Result<bool> {
        match self {
            Device::Local(d) => d.get_toggle().await,
            Device::Bridge(d) => d.get_toggle().await,
        }
    }

    pub async fn set_toggle(&self, on: bool) -> Result<()> {
        match self {
            Device::Local(d) => d.set_toggle(on).await,
            Device::Bridge(d) => d.set_toggle(on).await,
        }
    }

    /// Brightness in whatever sense the current mode gives it.
    pub async fn get_brightness(&self) -> Result<Percentage> {
        match self {
            Device::Local(d) => d.get_brightness().await,
            Device::Bridge(d) => d.get_brightness().await,
        }
    }

    pub async fn set_brightness(&self, brightness: Percentage) -> Result<()> {
        match self {
            Device::Local(d) => d.set_brightness(brightness).await,
            Device::Bridge(d) => d.set_brightness(brightness).await,
        }
    }

    pub async fn get_color(&self) -> Result<Hsv> {
        match self {
            Device::Local(d) => d.get_color().await,
            Device::Bridge(d) => d.get_color().await,
        }
    }

    pub async fn set_color(&self, hsv: Hsv) -> Result<()> {
        match self {
            Device::Local(d) => d.set_color(hsv).await,
            Device::Bridge(d) => d.set_color(hsv).await,
        }
    }

    pub async fn get_rgb(&self) -> Result<Rgb> {
        Ok(self.get_color().await?.to_rgb())
    }

    pub async fn set_rgb(&self, rgb: Rgb) -> Result<()> {
        self.set_color(Hsv::from_rgb(&rgb)).await
    }

    pub async fn get_mode(&self) -> Result<Mode> {
        match self {
            Device::Local(d) => d.get_mode().await,
            Device::Bridge(d) => d.get_mode().await,
        }
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<ModeChange> {
        match self {
            Device::Local(d) => d.set_mode(mode).await,
            Device::Bridge(d) => d.set_mode(mode).await,
        }
    }

    pub async fn get_white(&self) -> Result<Percentage> {
        match self {
            Device::Local(d) => d.get_white().await,
            Device::Bridge(d) => d.get_white().await,
        }
    }

    pub async fn set_white(&self, white: Percentage) -> Result<()> {
        match self {
            Device::Local(d) => d.set_white(white).await,
            Device::Bridge(d) => d.set_white(white).await,
        }
    }

    /// `None` when the device has no calibrated warmth to report.
    pub async fn get_warmth(&self) -> Result<Option<Percentage>> {
        match self {
            Device::Local(_) => Ok(None),
            Device::Bridge(d) => d.get_warmth().await,
        }
    }

    pub async fn set_warmth(&self, warmth: Percentage) -> Result<()> {
        match self {
            Device::Local(_) => Err(self.unsupported("warmth")),
            Device::Bridge(d) => d.set_warmth(warmth).await,
        }
    }

    pub async fn get_scene(&self) -> Result<Scene> {
        match self {
            Device::Local(d) => d.get_scene().await,
            Device::Bridge(_) => Err(self.unsupported("scenes")),
        }
    }

    pub async fn set_scene(&self, scene: &Scene) -> Result<()> {
        match self {
            Device::Local(d) => d.set_scene(scene).await,
            Device::Bridge(_) => Err(self.unsupported("scenes")),
        }
    }

    /// Start the bulb's own switch-off countdown.
    pub async fn set_countdown(&self, seconds: u32) -> Result<()> {
        match self {
            Device::Local(d) => d.set_countdown(seconds).await,
            Device::Bridge(_) => Err(self.unsupported("countdown")),
        }
    }

    /// Switch the device off at `at`. An instant in the past fires at once.
    ///
    /// Returns as soon as the switch-off is scheduled; its own failure is
    /// only logged.
    pub async fn set_timer(self: Arc<Self>, at: DateTime<Utc>) -> Result<()> {
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        info!("switching {} off in {:?}", self.id(), delay);

        runtime::spawn(async move {
            runtime::sleep(delay).await;
            match self.set_toggle(false).await {
                Ok(()) => info!("timer switched {} off", self.id()),
                Err(e) => warn!("timer could not switch {} off: {e}", self.id()),
            }
        });
        Ok(())
    }

    pub async fn get_xy(&self) -> Result<[f64; 2]> {
        match self {
            Device::Local(_) => Err(self.unsupported("xy")),
            Device::Bridge(d) => d.get_xy().await,
        }
    }

    pub async fn set_xy(&self, x: f64, y: f64) -> Result<()> {
        match self {
            Device::Local(_) => Err(self.unsupported("xy")),
            Device::Bridge(d) => d.set_xy(x, y).await,
        }
    }

    pub async fn set_alert(&self, alert: Alert) -> Result<()> {
        match self {
            Device::Local(_) => Err(self.unsupported("alert")),
            Device::Bridge(d) => d.set_alert(alert).await,
        }
    }

    pub async fn set_effect(&self, effect: Effect) -> Result<()> {
        match self {
            Device::Local(_) => Err(self.unsupported("effect")),
            Device::Bridge(d) => d.set_effect(effect).await,
        }
    }

    pub async fn get_state(&self) -> Result<LightState> {
        match self {
            Device::Local(d) => d.get_state().await,
            Device::Bridge(d) => d.get_state().await,
        }
    }
}
