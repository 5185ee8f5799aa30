//! Value types for light control parameters.

mod color;
mod hsv;
mod mode;
mod percentage;

pub use color::Rgb;
pub use hsv::{Hsv, hsv_to_rgb, rgb_to_hsv};
pub use mode::Mode;
pub use percentage::Percentage;
