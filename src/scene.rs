//! Multi-segment scene codec for local bulbs.
//!
//! The scene datapoint is a hex string: a two-character scene number followed
//! by one or more 26-character segments.
//!
//! ```text
//! 01 0b0a02000003e803e800000000 0b0a02007603e803e800000000
//! |  | | | |   |   |   |   |
//! |  | | | |   |   |   |   colour temperature (0-1000)
//! |  | | | |   |   |   white brightness (0-1000)
//! |  | | | |   |   value (0-1000)
//! |  | | | |   saturation (0-1000)
//! |  | | | hue (0-360)
//! |  | | change mode (0 static, 1 jump, 2 gradual)
//! |  | change duration (0-100)
//! |  switch interval (0-100)
//! scene number
//! ```
//!
//! There is no segment count; the number of segments follows from the length.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::errors::Error;
use crate::types::Hsv;

type Result<T> = std::result::Result<T, Error>;

const NUMBER_HEX_LEN: usize = 2;
const SEGMENT_LEN: usize = 13;
const SEGMENT_HEX_LEN: usize = SEGMENT_LEN * 2;
const WIRE_PERCENT_SCALE: u16 = 10;
const WIRE_MAX: u16 = 1000;

/// Firmware ignores the scene number, so every encoded scene uses this one.
const ENCODED_NUMBER: &str = "00";

/// How a scene moves from one segment to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeMode {
    #[default]
    Static = 0,
    Jump = 1,
    Gradual = 2,
}

impl ChangeMode {
    fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChangeMode::Static),
            1 => Some(ChangeMode::Jump),
            2 => Some(ChangeMode::Gradual),
            _ => None,
        }
    }
}

/// One step of a scene loop.
///
/// `s` and `v` are canonical percentages; `white_brightness` and
/// `color_temperature` are carried in raw device units (0-1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSegment {
    pub switch_interval: u8,
    pub change_duration: u8,
    pub change_mode: ChangeMode,
    pub h: u16,
    pub s: u8,
    pub v: u8,
    #[serde(default)]
    pub white_brightness: u16,
    #[serde(default)]
    pub color_temperature: u16,
}

impl SceneSegment {
    /// A segment showing a single color, with no white channel.
    pub fn color(switch_interval: u8, change_duration: u8, change_mode: ChangeMode, hsv: Hsv) -> Self {
        SceneSegment {
            switch_interval,
            change_duration,
            change_mode,
            h: hsv.h,
            s: hsv.s,
            v: hsv.v,
            white_brightness: 0,
            color_temperature: 0,
        }
    }

    pub fn hsv(&self) -> Hsv {
        Hsv::new(self.h, self.s, self.v)
    }

    fn to_wire(self) -> [u8; SEGMENT_LEN] {
        let hsv = self.hsv();
        let mut out = [0u8; SEGMENT_LEN];
        out[0] = self.switch_interval;
        out[1] = self.change_duration;
        out[2] = self.change_mode as u8;
        out[3..5].copy_from_slice(&hsv.h.to_be_bytes());
        out[5..7].copy_from_slice(&to_wire_units(hsv.s).to_be_bytes());
        out[7..9].copy_from_slice(&to_wire_units(hsv.v).to_be_bytes());
        out[9..11].copy_from_slice(&self.white_brightness.min(WIRE_MAX).to_be_bytes());
        out[11..13].copy_from_slice(&self.color_temperature.min(WIRE_MAX).to_be_bytes());
        out
    }

    fn from_wire(chunk: &str) -> Result<Self> {
        let bytes = hex::decode(chunk)
            .map_err(|e| Error::malformed(format!("scene segment {chunk:?}: {e}")))?;
        let word = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);

        let change_mode = ChangeMode::from_wire(bytes[2])
            .ok_or_else(|| Error::malformed(format!("unknown change mode {}", bytes[2])))?;

        Ok(SceneSegment {
            switch_interval: bytes[0],
            change_duration: bytes[1],
            change_mode,
            h: word(3).min(Hsv::MAX_HUE),
            s: from_wire_units(word(5)),
            v: from_wire_units(word(7)),
            white_brightness: word(9),
            color_temperature: word(11),
        })
    }
}

/// An ordered loop of segments, as stored in a local bulb's scene datapoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "sceneNum", default)]
    pub number: u8,
    #[serde(rename = "parts")]
    pub segments: Vec<SceneSegment>,
}

impl Scene {
    pub fn new(segments: Vec<SceneSegment>) -> Self {
        Scene {
            number: 0,
            segments,
        }
    }

    /// Brightness of the scene, taken from its first segment.
    pub fn value(&self) -> Option<u8> {
        self.segments.first().map(|segment| segment.v)
    }

    /// Set the value channel of every segment.
    pub fn set_value(&mut self, v: u8) {
        for segment in &mut self.segments {
            segment.v = v.min(Hsv::MAX_PERCENT);
        }
    }

    /// Decode a raw scene datapoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::{ChangeMode, Scene};
    ///
    /// let scene = Scene::decode("000b0a02000003e803e800000000").unwrap();
    /// assert_eq!(scene.segments.len(), 1);
    /// assert_eq!(scene.segments[0].change_mode, ChangeMode::Gradual);
    /// assert_eq!(scene.segments[0].s, 100);
    ///
    /// assert!(Scene::decode("000b0a02").is_err());
    /// ```
    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if !raw.is_ascii() {
            return Err(Error::malformed("scene payload is not ascii hex"));
        }
        if raw.len() < NUMBER_HEX_LEN {
            return Err(Error::malformed(format!(
                "scene payload {raw:?} is shorter than its number prefix"
            )));
        }

        let body = &raw[NUMBER_HEX_LEN..];
        if body.is_empty() || body.len() % SEGMENT_HEX_LEN != 0 {
            return Err(Error::malformed(format!(
                "scene body of {} hex characters is not a positive multiple of {SEGMENT_HEX_LEN}",
                body.len()
            )));
        }

        let number = u8::from_str_radix(&raw[..NUMBER_HEX_LEN], 16)
            .map_err(|e| Error::malformed(format!("scene number: {e}")))?;

        let segments = (0..body.len())
            .step_by(SEGMENT_HEX_LEN)
            .map(|at| SceneSegment::from_wire(&body[at..at + SEGMENT_HEX_LEN]))
            .collect::<Result<Vec<_>>>()?;

        Ok(Scene { number, segments })
    }

    /// Encode for writing back to a bulb. The scene number is not preserved.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::{ChangeMode, Hsv, Scene, SceneSegment};
    ///
    /// let scene = Scene::new(vec![SceneSegment::color(11, 10, ChangeMode::Gradual, Hsv::new(0, 100, 100))]);
    /// assert_eq!(scene.encode(), "000b0a02000003e803e800000000");
    /// ```
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(NUMBER_HEX_LEN + self.segments.len() * SEGMENT_HEX_LEN);
        out.push_str(ENCODED_NUMBER);
        for segment in &self.segments {
            out.push_str(&hex::encode(segment.to_wire()));
        }
        out
    }
}

fn to_wire_units(percent: u8) -> u16 {
    (u16::from(percent) * WIRE_PERCENT_SCALE).min(WIRE_MAX)
}

fn from_wire_units(raw: u16) -> u8 {
    (raw / WIRE_PERCENT_SCALE).min(u16::from(Hsv::MAX_PERCENT)) as u8
}
