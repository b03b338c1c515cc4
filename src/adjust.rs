use serde::{Deserialize, Serialize};

use crate::raster::Raster;

/// Whole-image color adjustments. Each one produces a fresh raster of the
/// same size; alpha is never touched.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Adjustment {
    Invert,
    Grayscale,
    /// `brightness` is added after contrast, both in -255..=255.
    BrightnessContrast { brightness: f32, contrast: f32 },
}

impl Adjustment {
    pub fn apply(&self, raster: &Raster) -> Raster {
        let mut out = raster.clone();
        match *self {
            Adjustment::Invert => {
                for px in out.pixels.chunks_exact_mut(4) {
                    px[0] = 255 - px[0];
                    px[1] = 255 - px[1];
                    px[2] = 255 - px[2];
                }
            }
            Adjustment::Grayscale => {
                for px in out.pixels.chunks_exact_mut(4) {
                    // Luminosity method
                    let gray = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
                        .round()
                        .clamp(0.0, 255.0) as u8;
                    px[0] = gray;
                    px[1] = gray;
                    px[2] = gray;
                }
            }
            Adjustment::BrightnessContrast {
                brightness,
                contrast,
            } => {
                let contrast = contrast.clamp(-255.0, 255.0);
                let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
                for px in out.pixels.chunks_exact_mut(4) {
                    for c in px.iter_mut().take(3) {
                        let contrasted = factor * (*c as f32 - 128.0) + 128.0;
                        *c = (contrasted + brightness).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_twice_is_identity() {
        let mut img = Raster::filled(2, 1, [10, 200, 30, 77]);
        img.set_pixel(1, 0, [0, 255, 128, 0]);
        let once = Adjustment::Invert.apply(&img);
        assert_eq!(once.get_pixel(0, 0), Some([245, 55, 225, 77]));
        assert_eq!(Adjustment::Invert.apply(&once), img);
    }

    #[test]
    fn grayscale_keeps_alpha() {
        let img = Raster::filled(1, 1, [255, 0, 0, 40]);
        assert_eq!(
            Adjustment::Grayscale.apply(&img).get_pixel(0, 0),
            Some([76, 76, 76, 40])
        );
    }

    #[test]
    fn neutral_brightness_contrast() {
        let img = Raster::filled(1, 1, [12, 130, 250, 255]);
        let same = Adjustment::BrightnessContrast {
            brightness: 0.0,
            contrast: 0.0,
        }
        .apply(&img);
        assert_eq!(same, img);
        let brighter = Adjustment::BrightnessContrast {
            brightness: 20.0,
            contrast: 0.0,
        }
        .apply(&img);
        assert_eq!(brighter.get_pixel(0, 0), Some([32, 150, 255, 255]));
    }
}
