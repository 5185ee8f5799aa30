//! Snapshots of light state returned to callers.

use serde::Serialize;

use crate::types::{Hsv, Mode, Percentage};

/// Everything readable about a light in one go.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightState {
    pub toggle: bool,
    pub mode: Option<Mode>,
    pub color: Hsv,
    /// White channel on local bulbs, color temperature on bridge lights.
    pub white: Option<Percentage>,
    /// Only local bulbs store a scene.
    pub scene_brightness: Option<Percentage>,
}

/// Result of a mode switch.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeChange {
    pub completed: bool,
    /// Brightness under the new mode, when the device can report it.
    pub brightness: Option<Percentage>,
}

/// Aggregate result of a write across one or more devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completed {
    pub completed: bool,
}

impl From<bool> for Completed {
    fn from(completed: bool) -> Self {
        Completed { completed }
    }
}
