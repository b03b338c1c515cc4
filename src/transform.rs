use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, check_len};
use crate::layer::Mask;
use crate::raster::{Raster, Rect, pixel_count};

/// Committed geometric edits. The same index mapping is used for the image,
/// every layer mask and every paint overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// 90 degrees clockwise.
    RotateCw,
    /// 90 degrees counter-clockwise.
    RotateCcw,
    Rotate180,
    FlipHorizontal,
    FlipVertical,
    Crop(Rect),
}

impl Transform {
    /// `90`, `-90`/`270` or `180` (`-180`).
    pub fn rotate(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            90 => Ok(Transform::RotateCw),
            270 => Ok(Transform::RotateCcw),
            180 => Ok(Transform::Rotate180),
            _ => Err(Error::InvalidOption(format!(
                "rotation must be a multiple of 90 other than 0, got {degrees}"
            ))),
        }
    }

    /// Flip one or both axes; flipping both is a half turn.
    pub fn flip(horizontal: bool, vertical: bool) -> Option<Self> {
        match (horizontal, vertical) {
            (true, true) => Some(Transform::Rotate180),
            (true, false) => Some(Transform::FlipHorizontal),
            (false, true) => Some(Transform::FlipVertical),
            (false, false) => None,
        }
    }

    /// Size of the result for a `width`x`height` input. Fails for a crop that
    /// does not fit.
    pub fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        match self {
            Transform::RotateCw | Transform::RotateCcw => Ok((height, width)),
            Transform::Rotate180 | Transform::FlipHorizontal | Transform::FlipVertical => {
                Ok((width, height))
            }
            Transform::Crop(rect) => {
                if rect.fits_within(width, height) {
                    Ok((rect.width, rect.height))
                } else {
                    Err(Error::InvalidCrop {
                        rect: *rect,
                        width,
                        height,
                    })
                }
            }
        }
    }

    /// Source coordinate for destination `(dx, dy)`.
    #[inline]
    fn source(&self, dx: u32, dy: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Transform::RotateCw => (dy, height - 1 - dx),
            Transform::RotateCcw => (width - 1 - dy, dx),
            Transform::Rotate180 => (width - 1 - dx, height - 1 - dy),
            Transform::FlipHorizontal => (width - 1 - dx, dy),
            Transform::FlipVertical => (dx, height - 1 - dy),
            Transform::Crop(rect) => (rect.x + dx, rect.y + dy),
        }
    }

    /// Remaps a row-major buffer with `bpp` bytes per pixel.
    pub fn remap(&self, buf: &[u8], width: u32, height: u32, bpp: usize) -> Result<Vec<u8>> {
        check_len("transform input", pixel_count(width, height) * bpp, buf.len())?;
        let (out_w, out_h) = self.output_size(width, height)?;
        let mut out = Vec::with_capacity(pixel_count(out_w, out_h) * bpp);
        for dy in 0..out_h {
            for dx in 0..out_w {
                let (sx, sy) = self.source(dx, dy, width, height);
                let idx = (sy as usize * width as usize + sx as usize) * bpp;
                out.extend_from_slice(&buf[idx..idx + bpp]);
            }
        }
        Ok(out)
    }

    pub fn apply_to_raster(&self, raster: &Raster) -> Result<Raster> {
        let (w, h) = self.output_size(raster.width, raster.height)?;
        let pixels = self.remap(&raster.pixels, raster.width, raster.height, 4)?;
        Raster::from_rgba(w, h, pixels)
    }

    pub fn apply_to_mask(&self, mask: &[u8], width: u32, height: u32) -> Result<Mask> {
        self.remap(mask, width, height, 1)
    }

    pub fn apply_to_overlay(&self, overlay: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        self.remap(overlay, width, height, 4)
    }
}

pub fn rotate_raster(raster: &Raster, degrees: i32) -> Result<Raster> {
    Transform::rotate(degrees)?.apply_to_raster(raster)
}

pub fn flip_raster(raster: &Raster, horizontal: bool, vertical: bool) -> Result<Raster> {
    match Transform::flip(horizontal, vertical) {
        Some(t) => t.apply_to_raster(raster),
        None => Ok(raster.clone()),
    }
}

pub fn crop_raster(raster: &Raster, rect: Rect) -> Result<Raster> {
    Transform::Crop(rect).apply_to_raster(raster)
}

pub fn crop_mask(mask: &[u8], width: u32, height: u32, rect: Rect) -> Result<Mask> {
    Transform::Crop(rect).apply_to_mask(mask, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::full_mask;

    /// 3x2 raster where every pixel is unique.
    fn sample() -> Raster {
        let mut r = Raster::new(3, 2);
        for (i, px) in r.pixels.chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&[i as u8, 10 + i as u8, 20 + i as u8, 255]);
        }
        r
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let img = sample();
        let cw = rotate_raster(&img, 90).unwrap();
        assert_eq!((cw.width, cw.height), (2, 3));
        // Bottom-left of the source ends up top-left.
        assert_eq!(cw.get_pixel(0, 0), img.get_pixel(0, 1));
        assert_eq!(cw.get_pixel(1, 0), img.get_pixel(0, 0));
        let ccw = rotate_raster(&img, -90).unwrap();
        assert_eq!(ccw.get_pixel(0, 0), img.get_pixel(2, 0));
        let half = rotate_raster(&img, 180).unwrap();
        assert_eq!((half.width, half.height), (3, 2));
        assert_eq!(half.get_pixel(0, 0), img.get_pixel(2, 1));
    }

    #[test]
    fn rotations_are_inverse_pairs() {
        let img = sample();
        assert_eq!(rotate_raster(&rotate_raster(&img, 90).unwrap(), -90).unwrap(), img);
        assert_eq!(rotate_raster(&rotate_raster(&img, -90).unwrap(), 90).unwrap(), img);
        assert_eq!(rotate_raster(&rotate_raster(&img, 180).unwrap(), 180).unwrap(), img);
        assert!(rotate_raster(&img, 45).is_err());
        assert!(rotate_raster(&img, 0).is_err());
    }

    #[test]
    fn flips_are_involutions() {
        let img = sample();
        let h = flip_raster(&img, true, false).unwrap();
        assert_eq!(h.get_pixel(0, 0), img.get_pixel(2, 0));
        assert_eq!(flip_raster(&h, true, false).unwrap(), img);
        let v = flip_raster(&img, false, true).unwrap();
        assert_eq!(v.get_pixel(0, 0), img.get_pixel(0, 1));
        assert_eq!(flip_raster(&v, false, true).unwrap(), img);
        assert_eq!(flip_raster(&img, false, false).unwrap(), img);
        assert_eq!(flip_raster(&img, true, true).unwrap(), rotate_raster(&img, 180).unwrap());
    }

    #[test]
    fn mask_follows_raster() {
        let img = sample();
        // Mask marks the pixel whose red channel is 4.
        let mut mask = vec![0u8; 6];
        mask[4] = 1;
        for t in [
            Transform::RotateCw,
            Transform::RotateCcw,
            Transform::Rotate180,
            Transform::FlipHorizontal,
            Transform::FlipVertical,
            Transform::Crop(Rect::new(1, 1, 2, 1)),
        ] {
            let out = t.apply_to_raster(&img).unwrap();
            let out_mask = t.apply_to_mask(&mask, 3, 2).unwrap();
            assert_eq!(out_mask.len(), out.pixel_count());
            for (bit, px) in out_mask.iter().zip(out.pixels.chunks_exact(4)) {
                assert_eq!(*bit == 1, px[0] == 4, "{t:?}");
            }
        }
    }

    #[test]
    fn crop_full_mask() {
        let rect = Rect::new(1, 2, 3, 2);
        let cropped = crop_mask(&full_mask(5, 4), 5, 4, rect).unwrap();
        assert_eq!(cropped.len(), 6);
        assert!(cropped.iter().all(|&b| b == 1));
    }

    #[test]
    fn crop_extracts_sub_rect() {
        let img = sample();
        let c = crop_raster(&img, Rect::new(1, 0, 2, 2)).unwrap();
        assert_eq!((c.width, c.height), (2, 2));
        assert_eq!(c.get_pixel(0, 0), img.get_pixel(1, 0));
        assert_eq!(c.get_pixel(1, 1), img.get_pixel(2, 1));
    }

    #[test]
    fn out_of_range_crop_fails() {
        let img = sample();
        assert!(matches!(
            crop_raster(&img, Rect::new(2, 0, 2, 1)),
            Err(Error::InvalidCrop { .. })
        ));
        assert!(crop_raster(&img, Rect::new(0, 0, 0, 1)).is_err());
        assert!(crop_mask(&[1; 5], 3, 2, Rect::new(0, 0, 1, 1)).is_err());
    }
}
