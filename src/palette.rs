//! Dominant color extraction by quantized histogram sampling.
//!
//! The grid is sampled with a fixed stride instead of scanned exhaustively, so
//! large images stay cheap; each sampled pixel is dropped into one of
//! `levels^3` buckets and the most populated buckets become seed colors.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::raster::Raster;

/// Pixels below this alpha are ignored when sampling.
pub const MIN_SAMPLE_ALPHA: u8 = 128;

/// Upper bound on `levels`; the histogram holds `levels^3` counters.
pub const MAX_LEVELS: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub max_colors: usize,
    pub sample_step: u32,
    pub levels: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_colors: 20,
            sample_step: 8,
            levels: 12,
        }
    }
}

/// Returns up to `max_colors` bucket centers, most frequent first.
///
/// A fully transparent or zero-sized raster yields an empty list.
pub fn extract_dominant_colors(raster: &Raster, opts: &ExtractOptions) -> Result<Vec<Color>> {
    if opts.sample_step == 0 {
        return Err(Error::InvalidOption("sample_step must be at least 1".into()));
    }
    if opts.levels == 0 || opts.levels > MAX_LEVELS {
        return Err(Error::InvalidOption(format!(
            "levels must be in 1..={MAX_LEVELS}, got {}",
            opts.levels
        )));
    }

    let levels = opts.levels as usize;
    let mut bins = vec![0u32; levels * levels * levels];
    let step = opts.sample_step as usize;
    let width = raster.width as usize;

    for y in (0..raster.height as usize).step_by(step) {
        for x in (0..width).step_by(step) {
            let idx = (y * width + x) * 4;
            let px = &raster.pixels[idx..idx + 4];
            if px[3] < MIN_SAMPLE_ALPHA {
                continue;
            }
            let r = quantize(px[0], levels);
            let g = quantize(px[1], levels);
            let b = quantize(px[2], levels);
            bins[(r * levels + g) * levels + b] += 1;
        }
    }

    let mut ranked: Vec<(usize, u32)> = bins
        .into_iter()
        .enumerate()
        .filter(|&(_, count)| count > 0)
        .collect();
    // Stable sort keeps ascending bin order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(ranked
        .into_iter()
        .take(opts.max_colors)
        .map(|(bin, _)| {
            let b = bin % levels;
            let g = (bin / levels) % levels;
            let r = bin / (levels * levels);
            Color::new(
                dequantize(r, levels),
                dequantize(g, levels),
                dequantize(b, levels),
            )
        })
        .collect())
}

fn quantize(channel: u8, levels: usize) -> usize {
    let level = (channel as f32 / 255.0 * levels as f32).floor() as usize;
    level.min(levels - 1)
}

fn dequantize(level: usize, levels: usize) -> u8 {
    ((level as f32 + 0.5) * (255.0 / levels as f32))
        .round()
        .clamp(0.0, 255.0) as u8
}
