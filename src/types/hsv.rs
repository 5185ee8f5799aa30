//! Canonical HSV color and the HSV/RGB conversions.

use palette::{FromColor, Srgb};
use serde::{Deserialize, Serialize};

use super::Rgb;

/// Hue, saturation and value in the cross-vendor canonical ranges.
///
/// - Hue: the color angle on the color wheel (0-360 degrees)
/// - Saturation: the intensity of the color (0-100 percent)
/// - Value: the brightness of the color (0-100 percent)
///
/// Every device codec converts to and from this representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u16,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const MAX_HUE: u16 = 360;
    pub const MAX_PERCENT: u8 = 100;

    /// Create a new color, clamping each component into its range.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Hsv;
    ///
    /// assert_eq!(Hsv::new(400, 120, 50), Hsv { h: 360, s: 100, v: 50 });
    /// ```
    pub fn new(h: u16, s: u8, v: u8) -> Self {
        Hsv {
            h: h.min(Self::MAX_HUE),
            s: s.min(Self::MAX_PERCENT),
            v: v.min(Self::MAX_PERCENT),
        }
    }

    /// Create a color from unbounded inputs, clamping instead of rejecting.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::Hsv;
    ///
    /// assert_eq!(Hsv::clamped(-20, 55, 150), Hsv { h: 0, s: 55, v: 100 });
    /// ```
    pub fn clamped(h: i64, s: i64, v: i64) -> Self {
        Hsv {
            h: h.clamp(0, i64::from(Self::MAX_HUE)) as u16,
            s: s.clamp(0, i64::from(Self::MAX_PERCENT)) as u8,
            v: v.clamp(0, i64::from(Self::MAX_PERCENT)) as u8,
        }
    }

    /// Return a copy with a different value channel.
    pub fn with_value(self, v: u8) -> Self {
        Hsv::new(self.h, self.s, v)
    }

    /// Convert to RGB, rounding each channel to 0-255.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::{Hsv, Rgb};
    ///
    /// assert_eq!(Hsv::new(0, 100, 100).to_rgb(), Rgb::new(255, 0, 0));
    /// assert_eq!(Hsv::new(120, 100, 50).to_rgb(), Rgb::new(0, 128, 0));
    /// ```
    pub fn to_rgb(&self) -> Rgb {
        let (r, g, b) = hsv_to_rgb(
            f64::from(self.h),
            f64::from(self.s) / 100.0,
            f64::from(self.v) / 100.0,
        );
        Rgb::new(to_byte(r), to_byte(g), to_byte(b))
    }

    /// Convert from RGB.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightdeck::{Hsv, Rgb};
    ///
    /// assert_eq!(Hsv::from_rgb(&Rgb::new(0, 0, 255)), Hsv::new(240, 100, 100));
    /// assert_eq!(Hsv::from_rgb(&Rgb::new(0, 0, 0)), Hsv::new(0, 0, 0));
    /// ```
    pub fn from_rgb(rgb: &Rgb) -> Self {
        let (h, s, v) = rgb_to_hsv(
            f64::from(rgb.red()) / 255.0,
            f64::from(rgb.green()) / 255.0,
            f64::from(rgb.blue()) / 255.0,
        );
        Hsv::clamped(
            h.round() as i64,
            (s * 100.0).round() as i64,
            (v * 100.0).round() as i64,
        )
    }
}

impl From<&Rgb> for Hsv {
    fn from(rgb: &Rgb) -> Self {
        Hsv::from_rgb(rgb)
    }
}

impl From<&Hsv> for Rgb {
    fn from(hsv: &Hsv) -> Self {
        hsv.to_rgb()
    }
}

/// HSV with the sRGB primaries, in double precision.
type NormalizedHsv = palette::Hsv<palette::encoding::Srgb, f64>;

/// HSV to RGB on normalized values.
///
/// `h` is in degrees, `s` and `v` in 0..=1. Returns channels in 0..=1.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let rgb = Srgb::<f64>::from_color(NormalizedHsv::new(h, s, v));
    (rgb.red, rgb.green, rgb.blue)
}

/// RGB to HSV on normalized values.
///
/// Channels are in 0..=1. Returns hue in degrees `[0, 360)`, `s` and `v` in 0..=1.
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let hsv = NormalizedHsv::from_color(Srgb::<f64>::new(r, g, b));
    (hsv.hue.into_positive_degrees(), hsv.saturation, hsv.value)
}

fn to_byte(channel: f64) -> u8 {
    (channel * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hue_distance(a: u16, b: u16) -> u16 {
        let d = a.abs_diff(b) % 360;
        d.min(360 - d)
    }

    #[test]
    fn normalized_round_trip_within_one_unit() {
        for h in 0..360u16 {
            for s in 1..=100u8 {
                for v in 1..=100u8 {
                    let (r, g, b) =
                        hsv_to_rgb(f64::from(h), f64::from(s) / 100.0, f64::from(v) / 100.0);
                    let (h2, s2, v2) = rgb_to_hsv(r, g, b);
                    assert!(hue_distance(h, h2.round() as u16) <= 1, "{h} {s} {v} -> hue {h2}");
                    assert!(s.abs_diff((s2 * 100.0).round() as u8) <= 1, "{h} {s} {v} -> sat {s2}");
                    assert!(v.abs_diff((v2 * 100.0).round() as u8) <= 1, "{h} {s} {v} -> val {v2}");
                }
            }
        }
    }

    #[test]
    fn byte_round_trip_within_one_unit() {
        // 8-bit channels lose hue and saturation at low s*v, so only the
        // upper range survives a trip through Rgb.
        for h in (0..360).step_by(7) {
            for s in [60u8, 75, 90, 100] {
                for v in [60u8, 75, 90, 100] {
                    let original = Hsv::new(h, s, v);
                    let back = Hsv::from_rgb(&original.to_rgb());
                    assert!(hue_distance(original.h, back.h) <= 1, "{original:?} -> {back:?}");
                    assert!(original.s.abs_diff(back.s) <= 1, "{original:?} -> {back:?}");
                    assert!(original.v.abs_diff(back.v) <= 1, "{original:?} -> {back:?}");
                }
            }
        }
    }

    #[test]
    fn zero_saturation_is_gray_for_any_hue() {
        for h in [0, 90, 200, 359] {
            let rgb = Hsv::new(h, 0, 50).to_rgb();
            assert_eq!(rgb, Rgb::new(128, 128, 128));
            let back = Hsv::from_rgb(&rgb);
            assert_eq!((back.s, back.v), (0, 50));
        }
    }

    #[test]
    fn zero_value_is_black() {
        assert_eq!(Hsv::new(180, 100, 0).to_rgb(), Rgb::new(0, 0, 0));
    }

    #[test]
    fn red_dominant_hue_wraps_positive() {
        // magenta-ish red: blue above green must land in the 300-360 sextant
        let (h, _, _) = rgb_to_hsv(1.0, 0.0, 0.5);
        assert!((h - 330.0).abs() < 1e-6);
    }

    #[test]
    fn full_hue_circle_maps_to_red() {
        assert_eq!(Hsv::new(360, 100, 100).to_rgb(), Rgb::new(255, 0, 0));
    }
}
