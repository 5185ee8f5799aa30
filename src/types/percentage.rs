//! Clamped percentage values.

use serde::{Deserialize, Serialize};

/// A percentage from 0 to 100.
///
/// Brightness-style inputs are clamped into range rather than rejected.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;

    /// Clamp any integer into 0-100.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Percentage;
    ///
    /// assert_eq!(Percentage::clamped(150).value(), 100);
    /// assert_eq!(Percentage::clamped(-3).value(), 0);
    /// assert_eq!(Percentage::clamped(42).value(), 42);
    /// ```
    pub fn clamped(value: i64) -> Self {
        Percentage(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    /// Returns None if value is outside 0-100.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Percentage;
    ///
    /// assert!(Percentage::create(100).is_some());
    /// assert!(Percentage::create(101).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Percentage(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Scale onto a device range `0..=max`, rounding at the boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Percentage;
    ///
    /// assert_eq!(Percentage::clamped(50).scale_to(254), 127);
    /// assert_eq!(Percentage::clamped(100).scale_to(1000), 1000);
    /// ```
    pub fn scale_to(&self, max: u32) -> u32 {
        (f64::from(self.0) * f64::from(max) / 100.0).round() as u32
    }

    /// Inverse of [`Percentage::scale_to`], clamping out-of-range raw values.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Percentage;
    ///
    /// assert_eq!(Percentage::scale_from(127, 254).value(), 50);
    /// assert_eq!(Percentage::scale_from(2000, 1000).value(), 100);
    /// ```
    pub fn scale_from(raw: u32, max: u32) -> Self {
        if max == 0 {
            return Percentage(0);
        }
        Self::clamped((f64::from(raw) * 100.0 / f64::from(max)).round() as i64)
    }
}

impl From<Percentage> for u8 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}
