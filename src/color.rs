//! HSV color model for key backlights
//!
//! Channels follow the ranges the accessory declares to its host:
//! hue 0-360 degrees, saturation and value 0-100 percent. Every input is
//! clamped into range on the way in, so a `Color` is always valid.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for hue (degrees)
pub const HUE_MAX: f32 = 360.0;

/// Upper bound for saturation and value (percent)
pub const PERCENT_MAX: f32 = 100.0;

/// Immutable HSV color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawColor", into = "RawColor")]
pub struct Color {
    hue: f32,
    saturation: f32,
    value: f32,
}

/// Unchecked wire shape, clamped through `Color::new` on deserialize
#[derive(Serialize, Deserialize)]
struct RawColor {
    hue: f32,
    saturation: f32,
    value: f32,
}

impl From<RawColor> for Color {
    fn from(raw: RawColor) -> Self {
        Color::new(raw.hue, raw.saturation, raw.value)
    }
}

impl From<Color> for RawColor {
    fn from(color: Color) -> Self {
        RawColor {
            hue: color.hue,
            saturation: color.saturation,
            value: color.value,
        }
    }
}

impl Color {
    /// Attention color shown while identifying (pure green)
    pub const ATTENTION: Color = Color {
        hue: 120.0,
        saturation: 100.0,
        value: 100.0,
    };

    /// Create a color, clamping each channel into range
    pub fn new(hue: f32, saturation: f32, value: f32) -> Self {
        Self {
            hue: clamp_channel(hue, HUE_MAX),
            saturation: clamp_channel(saturation, PERCENT_MAX),
            value: clamp_channel(value, PERCENT_MAX),
        }
    }

    pub fn hue(&self) -> f32 {
        self.hue
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Copy of this color with a new hue
    pub fn with_hue(self, hue: f32) -> Self {
        Self {
            hue: clamp_channel(hue, HUE_MAX),
            ..self
        }
    }

    /// Copy of this color with a new saturation
    pub fn with_saturation(self, saturation: f32) -> Self {
        Self {
            saturation: clamp_channel(saturation, PERCENT_MAX),
            ..self
        }
    }

    /// Copy of this color with a new value (brightness)
    pub fn with_value(self, value: f32) -> Self {
        Self {
            value: clamp_channel(value, PERCENT_MAX),
            ..self
        }
    }

    /// Convert to 8-bit RGB
    ///
    /// Hue 360 is the same point on the wheel as hue 0.
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let s = self.saturation / PERCENT_MAX;
        let v = self.value / PERCENT_MAX;

        let chroma = v * s;
        let sector = (self.hue % HUE_MAX) / 60.0;
        let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
        let m = v - chroma;

        let (r, g, b) = match sector as u8 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        (to_byte(r + m), to_byte(g + m), to_byte(b + m))
    }
}

impl Default for Color {
    /// Red at full saturation and brightness
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 100.0,
            value: 100.0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsv({:.0}, {:.0}%, {:.0}%)",
            self.hue, self.saturation, self.value
        )
    }
}

/// Clamp into `[0, max]`; NaN becomes 0
fn clamp_channel(input: f32, max: f32) -> f32 {
    if input.is_nan() {
        0.0
    } else {
        input.clamp(0.0, max)
    }
}

fn to_byte(unit: f32) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}
