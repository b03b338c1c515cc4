use serde::{Deserialize, Serialize};

/// Squared distance between black and white, `3 * 255^2`.
pub const MAX_RGB_DISTANCE_SQ: f32 = 195_075.0;

/// Largest possible Euclidean distance between two RGB colors.
pub const MAX_RGB_DISTANCE: f32 = 441.672_95;

/// An opaque RGB target color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Takes the RGB part of an RGBA pixel slice.
    pub fn from_rgba(px: &[u8]) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    /// `#RRGGBB`, uppercase.
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_rgba(&self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

/// Maps a 0-100 tolerance slider value to a Euclidean RGB distance.
pub fn tolerance_to_distance(tolerance: f32) -> f32 {
    if tolerance <= 0.0 {
        0.0
    } else {
        (tolerance / 100.0) * MAX_RGB_DISTANCE
    }
}

/// Squared distance between `px` (RGB prefix of a pixel) and `target`.
#[inline]
pub fn distance_sq(px: &[u8], target: Color) -> f32 {
    let dr = px[0] as f32 - target.r as f32;
    let dg = px[1] as f32 - target.g as f32;
    let db = px[2] as f32 - target.b as f32;
    dr * dr + dg * dg + db * db
}

/// Precomputed matcher for one target color, used inside compositing loops.
#[derive(Clone, Copy, Debug)]
pub struct Matcher {
    target: Color,
    max_dist_sq: f32,
}

impl Matcher {
    pub fn new(target: Color, tolerance: f32) -> Self {
        // Squared directly so t=100 lands exactly on MAX_RGB_DISTANCE_SQ.
        let max_dist_sq = if tolerance <= 0.0 {
            0.0
        } else {
            let f = tolerance / 100.0;
            f * f * MAX_RGB_DISTANCE_SQ
        };
        Self {
            target,
            max_dist_sq,
        }
    }

    #[inline]
    pub fn matches(&self, px: &[u8]) -> bool {
        distance_sq(px, self.target) <= self.max_dist_sq
    }
}

/// True when `px` lies within the tolerance radius around `target`.
pub fn color_matches(px: Color, target: Color, tolerance: f32) -> bool {
    Matcher::new(target, tolerance).matches(&[px.r, px.g, px.b])
}
