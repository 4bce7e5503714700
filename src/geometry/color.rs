//! Hex color parsing for manifest color properties.

use crate::foundation::error::{CompositorError, CompositorResult};

/// Straight-alpha RGBA color with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
    /// Alpha channel.
    pub a: f64,
}

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);

    /// Construct from raw channels.
    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Construct an opaque color from 8-bit channels.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
            1.0,
        )
    }

    /// Same color with the alpha channel replaced (clamped to `[0, 1]`).
    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: clamp01(a),
            ..self
        }
    }

    /// Quantize to straight-alpha RGBA8.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn q(v: f64) -> u8 {
            (clamp01(v) * 255.0).round() as u8
        }
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// Parse `#RRGGBB` (or the `#RGB` shorthand, `#` optional) with the given alpha.
pub fn color_from_hex(hex: &str, alpha: f64) -> CompositorResult<Rgba> {
    let s = hex.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    let bad = || CompositorError::invalid_color(format!("\"{hex}\" is not #RRGGBB or #RGB"));
    if !s.is_ascii() {
        return Err(bad());
    }

    let byte = |pair: &str| u8::from_str_radix(pair, 16).map_err(|_| bad());
    let (r, g, b) = match s.len() {
        6 => (byte(&s[0..2])?, byte(&s[2..4])?, byte(&s[4..6])?),
        3 => {
            let nib = |i: usize| byte(&s[i..i + 1]).map(|v| v * 17);
            (nib(0)?, nib(1)?, nib(2)?)
        }
        _ => return Err(bad()),
    };

    Ok(Rgba::from_rgb8(r, g, b).with_alpha(alpha))
}

/// Parse `hex`, falling back to `default` (with `alpha` applied) and logging on failure.
pub fn color_or(hex: &str, alpha: f64, default: Rgba) -> Rgba {
    match color_from_hex(hex, alpha) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "using fallback color");
            default.with_alpha(alpha)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/color.rs"]
mod tests;
