//! Builds the view rasters from the original image and the layer stack.
//!
//! All three views share one per-layer rule: a layer shows the original pixel
//! where its mask keeps it and the pixel matches the layer color, and its paint
//! sits on top of that. Layers are stacked bottom (last index) to top (index 0)
//! with non-premultiplied source-over.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::color::Matcher;
use crate::error::{Error, Result, check_len};
use crate::layer::{LayerId, LayerStack};
use crate::raster::Raster;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum View {
    /// All visible layers, original image behind unclaimed pixels.
    Whole,
    /// One layer on its own; visibility is ignored.
    Isolate(LayerId),
    /// Exactly these layers, transparent wherever none of them draws.
    Reconstruct(Vec<LayerId>),
}

/// In-progress stroke buffers to show in place of (mask) or on top of (paint)
/// the committed state of `layer`.
#[derive(Clone, Copy, Debug)]
pub struct StrokePreview<'a> {
    pub layer: LayerId,
    pub mask: Option<&'a [u8]>,
    pub paint: Option<&'a [u8]>,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions<'a> {
    /// Multiplies every paint alpha, 0.0..=1.0.
    pub paint_opacity: f32,
    pub preview: Option<StrokePreview<'a>>,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self {
            paint_opacity: 1.0,
            preview: None,
        }
    }
}

/// Color channels in 0..=255, alpha in 0..=1.
type Px = [f32; 4];

const CLEAR: Px = [0.0; 4];

#[inline]
fn over(dst: Px, src: Px) -> Px {
    let sa = src[3];
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] * (1.0 - sa);
    let out_a = sa + da;
    if out_a <= 0.0 {
        return CLEAR;
    }
    [
        (src[0] * sa + dst[0] * da) / out_a,
        (src[1] * sa + dst[1] * da) / out_a,
        (src[2] * sa + dst[2] * da) / out_a,
        out_a,
    ]
}

#[inline]
fn to_px(rgba: &[u8], alpha_scale: f32) -> Px {
    [
        rgba[0] as f32,
        rgba[1] as f32,
        rgba[2] as f32,
        rgba[3] as f32 / 255.0 * alpha_scale,
    ]
}

#[inline]
fn to_rgba(px: Px) -> [u8; 4] {
    if px[3] <= 0.0 {
        return [0; 4];
    }
    [
        px[0].round().clamp(0.0, 255.0) as u8,
        px[1].round().clamp(0.0, 255.0) as u8,
        px[2].round().clamp(0.0, 255.0) as u8,
        (px[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Source-over of one RGBA8 pixel onto another, `src` alpha scaled by `opacity`.
pub fn blend_over(dst: [u8; 4], src: &[u8], opacity: f32) -> [u8; 4] {
    to_rgba(over(to_px(&dst, 1.0), to_px(src, opacity)))
}

/// Borrowed per-layer state for one render pass.
struct LayerView<'a> {
    matcher: Matcher,
    mask: &'a [u8],
    paint: Option<&'a [u8]>,
    stroke_paint: Option<&'a [u8]>,
}

impl LayerView<'_> {
    /// Blends the layer's pixel at `i` onto `acc`. Returns whether anything was drawn.
    #[inline]
    fn draw(&self, acc: &mut Px, src: &[u8], i: usize, paint_opacity: f32) -> bool {
        let mut drawn = false;
        if src[3] > 0 && self.mask[i] != 0 && self.matcher.matches(src) {
            *acc = over(*acc, to_px(src, 1.0));
            drawn = true;
        }
        for overlay in [self.paint, self.stroke_paint].into_iter().flatten() {
            let p = &overlay[i * 4..i * 4 + 4];
            if p[3] > 0 && paint_opacity > 0.0 {
                *acc = over(*acc, to_px(p, paint_opacity));
                drawn = true;
            }
        }
        drawn
    }
}

pub fn render(
    original: &Raster,
    stack: &LayerStack,
    view: &View,
    opts: &RenderOptions,
) -> Result<Raster> {
    if original.width != stack.width || original.height != stack.height {
        return Err(Error::DimensionMismatch {
            what: "layer stack",
            expected: original.pixel_count(),
            actual: stack.width as usize * stack.height as usize,
        });
    }
    let n = original.pixel_count();
    if let Some(preview) = &opts.preview {
        if let Some(mask) = preview.mask {
            check_len("stroke mask", n, mask.len())?;
        }
        if let Some(paint) = preview.paint {
            check_len("stroke overlay", n * 4, paint.len())?;
        }
    }

    let selected: Vec<_> = match view {
        View::Whole => stack.iter().filter(|l| l.visible).collect(),
        View::Isolate(id) => vec![stack.get(*id).ok_or(Error::UnknownLayer(*id))?],
        View::Reconstruct(ids) => {
            let wanted: HashSet<LayerId> = ids.iter().copied().collect();
            if let Some(missing) = wanted.iter().find(|id| stack.get(**id).is_none()) {
                return Err(Error::UnknownLayer(*missing));
            }
            stack.iter().filter(|l| wanted.contains(&l.id)).collect()
        }
    };

    // Bottom of the stack first.
    let views: Vec<LayerView> = selected
        .into_iter()
        .rev()
        .map(|layer| {
            let preview = opts.preview.filter(|p| p.layer == layer.id);
            LayerView {
                matcher: layer.matcher(),
                mask: preview
                    .and_then(|p| p.mask)
                    .unwrap_or(layer.mask.as_slice()),
                paint: layer.paint.as_deref(),
                stroke_paint: preview.and_then(|p| p.paint),
            }
        })
        .collect();

    let mut out = Raster::new(original.width, original.height);
    if n == 0 {
        return Ok(out);
    }
    // Whole view: every layer, hidden or not, claims the pixels it matches.
    // Unclaimed pixels keep the original underneath.
    let claimers: Vec<Matcher> = match view {
        View::Whole => stack.iter().map(|l| l.matcher()).collect(),
        _ => Vec::new(),
    };
    let background = matches!(view, View::Whole);
    let paint_opacity = opts.paint_opacity.clamp(0.0, 1.0);
    let row_bytes = original.width as usize * 4;

    out.pixels
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let row_start = y * original.width as usize;
            for (x, dst) in row.chunks_exact_mut(4).enumerate() {
                let i = row_start + x;
                let src = &original.pixels[i * 4..i * 4 + 4];
                let unclaimed =
                    background && !(src[3] > 0 && claimers.iter().any(|m| m.matches(src)));
                let mut acc = if unclaimed { to_px(src, 1.0) } else { CLEAR };
                let mut drawn = false;
                for layer in &views {
                    drawn |= layer.draw(&mut acc, src, i, paint_opacity);
                }
                if unclaimed && !drawn {
                    dst.copy_from_slice(src);
                } else {
                    dst.copy_from_slice(&to_rgba(acc));
                }
            }
        });

    Ok(out)
}
