//! Operating modes for both device kinds.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The operating mode of a light.
///
/// Local bulbs switch between `white`, `colour`, `scene` and `music`. Bridge
/// lights report the color space they are currently rendering with: `hs`, `xy`
/// or `ct`. Each device kind only accepts its own subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    White,
    #[serde(rename = "colour", alias = "color")]
    #[strum(to_string = "colour", serialize = "color")]
    Colour,
    Scene,
    Music,
    Hs,
    Xy,
    Ct,
}

impl Mode {
    /// Whether a local bulb can be switched into this mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Mode;
    ///
    /// assert!(Mode::Colour.is_local());
    /// assert!(!Mode::Ct.is_local());
    /// ```
    pub fn is_local(&self) -> bool {
        matches!(self, Mode::White | Mode::Colour | Mode::Scene | Mode::Music)
    }

    /// Whether a bridge light can render in this mode.
    pub fn is_bridge(&self) -> bool {
        matches!(self, Mode::Hs | Mode::Xy | Mode::Ct)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parses_both_spellings_of_colour() {
        assert_eq!(Mode::from_str("colour").unwrap(), Mode::Colour);
        assert_eq!(Mode::from_str("color").unwrap(), Mode::Colour);
        assert_eq!(Mode::Colour.to_string(), "colour");
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Mode::Colour).unwrap(), "\"colour\"");
        assert_eq!(serde_json::from_str::<Mode>("\"ct\"").unwrap(), Mode::Ct);
        assert_eq!(serde_json::from_str::<Mode>("\"color\"").unwrap(), Mode::Colour);
    }

    #[test]
    fn mode_sets_are_disjoint() {
        let all = [
            Mode::White,
            Mode::Colour,
            Mode::Scene,
            Mode::Music,
            Mode::Hs,
            Mode::Xy,
            Mode::Ct,
        ];
        assert_eq!(all.iter().filter(|m| m.is_local()).count(), 4);
        assert_eq!(all.iter().filter(|m| m.is_bridge()).count(), 3);
        assert!(all.iter().all(|m| m.is_local() != m.is_bridge()));
    }
}
