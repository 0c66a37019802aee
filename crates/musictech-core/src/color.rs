//! RGBA colors and HSV construction
//!
//! Hue is in degrees and wraps; saturation and value are percentages
//! (0 - 100) and clamp. Alpha values computed from floats always clamp into
//! 0 - 255 instead of wrapping.

use serde::{Deserialize, Serialize};

/// 8-bit straight-alpha color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    /// Opaque black
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    /// Opaque white
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    /// Construct from components
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Opaque color from hue (degrees), saturation and value (percent)
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        Self::from_hsva(h, s, v, 255)
    }

    /// Color from hue (degrees), saturation, value (percent) and alpha
    pub fn from_hsva(h: f32, s: f32, v: f32, a: u8) -> Self {
        let h = if h.is_finite() { h.rem_euclid(360.0) } else { 0.0 };
        let s = clamp_percent(s) / 100.0;
        let v = clamp_percent(v) / 100.0;

        let c = v * s;
        let sector = h / 60.0;
        let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match sector as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Self {
            r: unit_to_u8(r + m),
            g: unit_to_u8(g + m),
            b: unit_to_u8(b + m),
            a,
        }
    }

    /// Same color with a different alpha
    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Same color with alpha from a 0.0 - 1.0 fraction
    pub fn with_alpha_unit(self, alpha: f32) -> Self {
        self.with_alpha(alpha_from_unit(alpha))
    }

    /// Same color with its alpha scaled by `factor`
    pub fn fade(self, factor: f32) -> Self {
        self.with_alpha(alpha_from_f32(self.a as f32 * factor))
    }

    /// Blend toward white by `amount` (0.0 - 1.0)
    pub fn lighten(self, amount: f32) -> Self {
        let t = if amount.is_finite() {
            amount.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mix = |c: u8| unit_to_u8((c as f32 + (255.0 - c as f32) * t) / 255.0);
        Self {
            r: mix(self.r),
            g: mix(self.g),
            b: mix(self.b),
            a: self.a,
        }
    }

    /// Components as 0.0 - 1.0 floats
    pub fn to_unit(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// Alpha byte from a 0.0 - 1.0 fraction, clamped
pub fn alpha_from_unit(alpha: f32) -> u8 {
    alpha_from_f32(alpha * 255.0)
}

/// Alpha byte from a 0 - 255 float, clamped
pub fn alpha_from_f32(alpha: f32) -> u8 {
    if !alpha.is_finite() {
        return 0;
    }
    alpha.round().clamp(0.0, 255.0) as u8
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn unit_to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_hues() {
        assert_eq!(Rgba::from_hsv(0.0, 100.0, 100.0), Rgba::rgb(255, 0, 0));
        assert_eq!(Rgba::from_hsv(120.0, 100.0, 100.0), Rgba::rgb(0, 255, 0));
        assert_eq!(Rgba::from_hsv(240.0, 100.0, 100.0), Rgba::rgb(0, 0, 255));
    }

    #[test]
    fn test_hue_wraps() {
        assert_eq!(
            Rgba::from_hsv(480.0, 100.0, 100.0),
            Rgba::from_hsv(120.0, 100.0, 100.0)
        );
        assert_eq!(
            Rgba::from_hsv(-120.0, 100.0, 100.0),
            Rgba::from_hsv(240.0, 100.0, 100.0)
        );
    }

    #[test]
    fn test_out_of_range_inputs_clamp() {
        assert_eq!(Rgba::from_hsv(0.0, 0.0, 250.0), Rgba::WHITE);
        assert_eq!(Rgba::from_hsv(f32::NAN, 100.0, -5.0), Rgba::BLACK);
    }

    #[test]
    fn test_alpha_clamps_instead_of_wrapping() {
        assert_eq!(alpha_from_f32(300.0), 255);
        assert_eq!(alpha_from_f32(-40.0), 0);
        assert_eq!(alpha_from_unit(1.5), 255);
        assert_eq!(alpha_from_unit(f32::NAN), 0);
        assert_eq!(Rgba::WHITE.fade(0.5).a, 128);
    }

    #[test]
    fn test_lighten() {
        let base = Rgba::rgb(0, 100, 200);
        assert_eq!(base.lighten(0.0), base);
        assert_eq!(base.lighten(1.0), Rgba::WHITE);
        let half = base.lighten(0.5);
        assert!(half.r > 120 && half.r < 135);
    }
}
