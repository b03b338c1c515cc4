use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::composite::StrokePreview;
use crate::error::{Error, Result, check_len};
use crate::layer::{Layer, LayerId, Mask};
use crate::raster::pixel_count;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Brush {
    /// Stamp radius in pixels.
    pub size: u32,
    pub color: Color,
    /// Paint opacity in percent.
    pub opacity: f32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            size: 10,
            color: Color::BLACK,
            opacity: 100.0,
        }
    }
}

impl Brush {
    pub fn paint_rgba(&self) -> [u8; 4] {
        let alpha = (self.opacity.clamp(0.0, 100.0) / 100.0 * 255.0).round() as u8;
        self.color.to_rgba(alpha)
    }
}

/// Calls `f(index)` for every pixel within `radius` of `(cx, cy)` that lies
/// inside a `width`x`height` grid.
pub fn for_each_in_circle(
    cx: i32,
    cy: i32,
    radius: u32,
    width: u32,
    height: u32,
    mut f: impl FnMut(usize),
) {
    let r = radius as i64;
    let r2 = r * r;
    let (cx, cy) = (cx as i64, cy as i64);
    let y0 = (cy - r).max(0);
    let y1 = (cy + r).min(height as i64 - 1);
    let x0 = (cx - r).max(0);
    let x1 = (cx + r).min(width as i64 - 1);
    for y in y0..=y1 {
        let dy = y - cy;
        for x in x0..=x1 {
            let dx = x - cx;
            if dx * dx + dy * dy <= r2 {
                f(y as usize * width as usize + x as usize);
            }
        }
    }
}

/// Sets stamped mask cells to 0.
pub fn erase_circle(mask: &mut [u8], width: u32, height: u32, cx: i32, cy: i32, radius: u32) {
    for_each_in_circle(cx, cy, radius, width, height, |i| mask[i] = 0);
}

/// Writes `rgba` into every stamped overlay pixel.
pub fn paint_circle(
    overlay: &mut [u8],
    width: u32,
    height: u32,
    cx: i32,
    cy: i32,
    radius: u32,
    rgba: [u8; 4],
) {
    for_each_in_circle(cx, cy, radius, width, height, |i| {
        overlay[i * 4..i * 4 + 4].copy_from_slice(&rgba);
    });
}

/// Stamp centers from `from` to `to`, one per pixel of travel.
pub fn stroke_points(from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    let dx = (to.0 - from.0) as f32;
    let dy = (to.1 - from.1) as f32;
    let steps = (dx * dx + dy * dy).sqrt().ceil().max(1.0);
    let (step_x, step_y) = (dx / steps, dy / steps);
    (1..=steps as i32)
        .map(|i| {
            (
                (from.0 as f32 + step_x * i as f32).round() as i32,
                (from.1 as f32 + step_y * i as f32).round() as i32,
            )
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeKind {
    Erase,
    Paint,
}

/// Result of a finished stroke, ready to be written into the layer stack.
#[derive(Clone, Debug, PartialEq)]
pub enum StrokeCommit {
    Erase { layer: LayerId, mask: Mask },
    Paint { layer: LayerId, overlay: Vec<u8> },
}

struct ActiveStroke {
    layer: LayerId,
    kind: StrokeKind,
    /// Working copy of the committed mask, erase strokes only.
    mask: Option<Mask>,
    last: Option<(i32, i32)>,
    touched: bool,
}

/// Owns the scratch buffers a stroke writes into until it is committed.
pub struct BrushEngine {
    width: u32,
    height: u32,
    overlay: Vec<u8>,
    overlay_dirty: bool,
    active: Option<ActiveStroke>,
}

impl BrushEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            overlay: vec![0; pixel_count(width, height) * 4],
            overlay_dirty: false,
            active: None,
        }
    }

    /// Reallocates for a new image size. Any open stroke is dropped, so
    /// callers commit first.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Zeroes the scratch overlay, e.g. after the selected layer changed.
    pub fn reset_overlay(&mut self) {
        if self.overlay_dirty {
            self.overlay.fill(0);
            self.overlay_dirty = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn begin(&mut self, layer: &Layer, kind: StrokeKind) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::InvalidOption("a stroke is already in progress".into()));
        }
        let mask = match kind {
            StrokeKind::Erase => {
                check_len("mask", pixel_count(self.width, self.height), layer.mask.len())?;
                Some(layer.mask.clone())
            }
            StrokeKind::Paint => None,
        };
        self.active = Some(ActiveStroke {
            layer: layer.id,
            kind,
            mask,
            last: None,
            touched: false,
        });
        Ok(())
    }

    /// Stamps at `(x, y)`, filling the gap from the previous sample.
    pub fn stroke_to(&mut self, x: i32, y: i32, brush: &Brush) -> Result<()> {
        let (width, height) = (self.width, self.height);
        let stroke = self.active.as_mut().ok_or(Error::NoActiveStroke)?;
        let points = match stroke.last {
            Some(last) => stroke_points(last, (x, y)),
            None => vec![(x, y)],
        };
        match stroke.kind {
            StrokeKind::Erase => {
                if let Some(mask) = stroke.mask.as_mut() {
                    for (px, py) in points {
                        erase_circle(mask, width, height, px, py, brush.size);
                    }
                }
            }
            StrokeKind::Paint => {
                let rgba = brush.paint_rgba();
                for (px, py) in points {
                    paint_circle(&mut self.overlay, width, height, px, py, brush.size, rgba);
                }
                self.overlay_dirty = true;
            }
        }
        stroke.last = Some((x, y));
        stroke.touched = true;
        Ok(())
    }

    /// Closes the stroke. Returns `None` when nothing was stamped.
    pub fn end(&mut self) -> Option<StrokeCommit> {
        let stroke = self.active.take()?;
        if !stroke.touched {
            return None;
        }
        match stroke.kind {
            StrokeKind::Erase => stroke.mask.map(|mask| StrokeCommit::Erase {
                layer: stroke.layer,
                mask,
            }),
            StrokeKind::Paint => {
                let overlay = self.overlay.clone();
                self.overlay.fill(0);
                self.overlay_dirty = false;
                Some(StrokeCommit::Paint {
                    layer: stroke.layer,
                    overlay,
                })
            }
        }
    }

    /// Scratch buffers for the compositor while a stroke is open.
    pub fn preview(&self) -> Option<StrokePreview<'_>> {
        let stroke = self.active.as_ref()?;
        Some(StrokePreview {
            layer: stroke.layer,
            mask: stroke.mask.as_deref(),
            paint: (stroke.kind == StrokeKind::Paint).then_some(self.overlay.as_slice()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::full_mask;

    fn layer(width: u32, height: u32) -> Layer {
        Layer::new(LayerId(1), Color::BLACK, 10.0, full_mask(width, height))
    }

    #[test]
    fn circle_stamp_shape() {
        let mut mask = vec![1u8; 25];
        erase_circle(&mut mask, 5, 5, 2, 2, 1);
        let erased: Vec<usize> = (0..25).filter(|&i| mask[i] == 0).collect();
        assert_eq!(erased, vec![7, 11, 12, 13, 17]);

        let mut mask = vec![1u8; 25];
        erase_circle(&mut mask, 5, 5, 2, 2, 0);
        assert_eq!(mask.iter().filter(|&&b| b == 0).count(), 1);
    }

    #[test]
    fn circle_is_clipped_at_edges() {
        let mut mask = vec![1u8; 9];
        erase_circle(&mut mask, 3, 3, 0, 0, 1);
        assert_eq!(mask, vec![0, 0, 1, 0, 1, 1, 1, 1, 1]);
        // Fully outside: nothing happens.
        erase_circle(&mut mask, 3, 3, -10, 40, 2);
        assert_eq!(mask.iter().filter(|&&b| b == 0).count(), 3);
    }

    #[test]
    fn stroke_points_cover_the_gap() {
        let pts = stroke_points((0, 0), (4, 0));
        assert_eq!(pts, vec![(1, 0), (2, 0), (3, 0), (4, 0)]);
        assert_eq!(stroke_points((2, 2), (2, 2)), vec![(2, 2)]);
    }

    #[test]
    fn erase_stroke_leaves_layer_untouched_until_end() {
        let layer = layer(5, 1);
        let mut engine = BrushEngine::new(5, 1);
        let brush = Brush {
            size: 0,
            ..Brush::default()
        };
        engine.begin(&layer, StrokeKind::Erase).unwrap();
        engine.stroke_to(0, 0, &brush).unwrap();
        engine.stroke_to(3, 0, &brush).unwrap();
        assert_eq!(layer.mask, vec![1; 5]);
        assert_eq!(engine.preview().unwrap().mask, Some(&[0, 0, 0, 0, 1][..]));
        match engine.end() {
            Some(StrokeCommit::Erase { layer: id, mask }) => {
                assert_eq!(id, LayerId(1));
                assert_eq!(mask, vec![0, 0, 0, 0, 1]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!engine.is_active());
    }

    #[test]
    fn paint_stroke_commits_and_clears_overlay() {
        let layer = layer(2, 2);
        let mut engine = BrushEngine::new(2, 2);
        let brush = Brush {
            size: 0,
            color: Color::new(10, 20, 30),
            opacity: 50.0,
        };
        engine.begin(&layer, StrokeKind::Paint).unwrap();
        engine.stroke_to(1, 1, &brush).unwrap();
        let Some(StrokeCommit::Paint { overlay, .. }) = engine.end() else {
            panic!("expected a paint commit");
        };
        assert_eq!(&overlay[12..16], &[10, 20, 30, 128]);
        assert_eq!(&overlay[0..12], &[0; 12]);

        engine.begin(&layer, StrokeKind::Paint).unwrap();
        assert!(engine.preview().unwrap().paint.unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_stroke_commits_nothing() {
        let layer = layer(2, 2);
        let mut engine = BrushEngine::new(2, 2);
        engine.begin(&layer, StrokeKind::Erase).unwrap();
        assert!(engine.is_active());
        assert!(engine.end().is_none());
        assert!(!engine.is_active());
        assert!(engine.end().is_none());
    }

    #[test]
    fn overlapping_begin_is_rejected() {
        let layer = layer(2, 2);
        let mut engine = BrushEngine::new(2, 2);
        engine.begin(&layer, StrokeKind::Paint).unwrap();
        assert!(engine.begin(&layer, StrokeKind::Erase).is_err());
    }

    #[test]
    fn stale_mask_is_rejected() {
        let layer = layer(3, 3);
        let mut engine = BrushEngine::new(2, 2);
        assert!(matches!(
            engine.begin(&layer, StrokeKind::Erase),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
