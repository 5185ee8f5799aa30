//! Warm-white calibration for lights that render white through the color channel.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::Percentage;

type Result<T> = std::result::Result<T, Error>;

const BUILTIN: &str = include_str!("../data/warmth.json");

/// A calibrated (hue, saturation) pair, in canonical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HueSat {
    pub hue: u16,
    pub sat: u8,
}

/// Bidirectional map between warmth percentages and calibrated hue/saturation.
///
/// The table is immutable once built. Percentages without an entry are not
/// interpolated; callers get `None` and decide how to report it.
///
/// # Examples
///
/// ```
/// use lightdeck::{HueSat, WarmthTable};
///
/// let table = WarmthTable::from_json_str(r#"{"0": {"hue": 45, "sat": 2}, "100": {"hue": 25, "sat": 72}}"#).unwrap();
/// assert_eq!(table.hue_sat(100), Some(HueSat { hue: 25, sat: 72 }));
/// assert_eq!(table.hue_sat(50), None);
/// assert_eq!(table.warmth(HueSat { hue: 45, sat: 2 }).map(|p| p.value()), Some(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct WarmthTable {
    forward: BTreeMap<u8, HueSat>,
    inverse: HashMap<HueSat, u8>,
}

impl WarmthTable {
    /// The calibration shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN)
    }

    /// Load a calibration file mapping `"percent"` to `{"hue", "sat"}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: HashMap<String, HueSat> = serde_json::from_str(raw).map_err(Error::JsonLoad)?;

        let mut forward = BTreeMap::new();
        for (key, hue_sat) in entries {
            let percent = key
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Percentage::create)
                .ok_or_else(|| Error::Config(format!("warmth key {key:?} is not a percentage")))?;
            forward.insert(percent.value(), hue_sat);
        }

        Ok(Self::from_entries(forward))
    }

    /// Build from explicit entries. When two percentages share a pair, the
    /// higher percentage wins the reverse lookup.
    pub fn from_entries(forward: BTreeMap<u8, HueSat>) -> Self {
        let inverse = forward.iter().map(|(percent, hs)| (*hs, *percent)).collect();
        WarmthTable { forward, inverse }
    }

    pub fn hue_sat(&self, percent: u8) -> Option<HueSat> {
        self.forward.get(&percent).copied()
    }

    pub fn warmth(&self, hue_sat: HueSat) -> Option<Percentage> {
        self.inverse.get(&hue_sat).copied().and_then(Percentage::create)
    }

    /// Calibrated percentages, ascending.
    pub fn percentages(&self) -> impl Iterator<Item = u8> + '_ {
        self.forward.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_bidirectional() {
        let table = WarmthTable::builtin().unwrap();
        assert_eq!(table.len(), 11);
        for percent in table.percentages().collect::<Vec<_>>() {
            let hs = table.hue_sat(percent).unwrap();
            assert_eq!(table.warmth(hs).unwrap().value(), percent);
        }
    }

    #[test]
    fn uncalibrated_points_are_absent() {
        let table = WarmthTable::builtin().unwrap();
        assert!(table.hue_sat(55).is_none());
        assert!(table.warmth(HueSat { hue: 0, sat: 100 }).is_none());
    }

    #[test]
    fn rejects_keys_outside_percentage_range() {
        let err = WarmthTable::from_json_str(r#"{"101": {"hue": 1, "sat": 1}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = WarmthTable::from_json_str(r#"{"warm": {"hue": 1, "sat": 1}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn duplicate_pairs_resolve_to_highest_percentage() {
        let hs = HueSat { hue: 30, sat: 50 };
        let table = WarmthTable::from_entries(BTreeMap::from([(20, hs), (80, hs)]));
        assert_eq!(table.warmth(hs).unwrap().value(), 80);
    }
}
