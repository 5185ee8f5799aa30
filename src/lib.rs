//! # lightdeck
//!
//! An async Rust library giving local-network bulbs and bridge lights one
//! control surface.
//!
//! Two kinds of hardware sit behind the same operations:
//!
//! - **Local bulbs** announce themselves by encrypted UDP broadcast and are
//!   driven over TCP with numbered datapoints (protocol 3.3).
//! - **Bridge lights** are listed and driven through the bridge's HTTP/JSON API.
//!
//! Callers work in canonical units (hue 0-360, saturation, value and
//! brightness 0-100) and the devices convert to their own wire formats.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lightdeck::{ControllerConfig, Hsv, LightController};
//!
//! async fn paint_it_red() -> Result<(), lightdeck::Error> {
//!     let config = ControllerConfig::load("lightdeck.json")?;
//!     let controller = LightController::from_config(config)?;
//!
//!     let devices = controller.rescan().await?;
//!     let ids: Vec<&str> = devices.iter().map(|d| d.id()).collect();
//!
//!     let result = controller.put_color(&ids, Hsv::new(0, 100, 100)).await?;
//!     println!("completed: {}", result.completed);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Discovery**: [`LocalScanner`] listens for bulb broadcasts, [`BridgeScanner`]
//!   lists bridge lights
//! - **Colors**: canonical [`Hsv`] with [`Rgb`] conversions
//! - **Brightness**: [`Percentage`] values, clamped rather than rejected
//! - **Scenes**: multi-segment loops encoded with [`Scene`]
//! - **Warm white**: [`WarmthTable`] calibration for bridge lights
//! - **Fan-out**: [`LightController`] applies one operation to many ids
//!
//! ## Outcomes
//!
//! Every failure maps to an [`Outcome`]: not found, capability mismatch,
//! malformed payload or transport failure. [`Reply`] pairs the outcome with
//! the operation's payload for the routing layer.

mod bridge;
mod config;
mod controller;
mod crypto;
mod device;
mod discovery;
mod errors;
mod response;
pub mod runtime;
mod scene;
mod status;
pub mod transport;
mod types;
mod warmth;

// Re-export public API
pub use bridge::{Alert, BridgeClient, BridgeLight, BridgeLightState, Effect, StatePayload};
pub use config::{BridgeConfig, ControllerConfig, LocalDeviceConfig, ScanConfig};
pub use controller::LightController;
pub use device::{BridgeDevice, Device, DeviceKind, DeviceSummary, LocalDevice};
pub use discovery::{
    BridgeDeviceRecord, BridgeScanner, DeviceRecord, LocalDeviceRecord, LocalScanner, ScanState,
};
pub use errors::{Error, Outcome};
pub use response::Reply;
pub use scene::{ChangeMode, Scene, SceneSegment};
pub use status::{Completed, LightState, ModeChange};
pub use types::{Hsv, Mode, Percentage, Rgb, hsv_to_rgb, rgb_to_hsv};
pub use warmth::{HueSat, WarmthTable};
