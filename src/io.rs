use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, RgbaImage};
use log::info;

use crate::editor::Editor;
use crate::error::{Error, Result};
use crate::layer::SessionManifest;
use crate::raster::Raster;
use crate::report::to_csv;

/// Decode any format `image` understands into a tight RGBA raster.
pub fn load_image(path: &Path) -> Result<Raster> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    info!("decoded {} ({width}x{height})", path.display());
    Raster::from_rgba(width, height, rgba.into_raw())
}

fn to_image(raster: &Raster) -> Result<RgbaImage> {
    ImageBuffer::from_raw(raster.width, raster.height, raster.pixels.clone()).ok_or(
        Error::DimensionMismatch {
            what: "raster",
            expected: raster.pixel_count() * 4,
            actual: raster.pixels.len(),
        },
    )
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

/// Encode by file extension. JPEG drops alpha.
pub fn save_raster(raster: &Raster, path: &Path) -> Result<()> {
    let img = to_image(raster)?;
    if is_jpeg(path) {
        DynamicImage::ImageRgba8(img).to_rgb8().save(path)?;
    } else {
        img.save(path)?;
    }
    Ok(())
}

/// Writes every layer as `layer_NNN.png` (isolated view), plus
/// `manifest.json` and `report.csv`, into `folder`.
pub fn export_session(editor: &Editor, folder: &Path) -> Result<SessionManifest> {
    fs::create_dir_all(folder)?;
    let image = editor.image().ok_or(Error::NoImage)?;

    let mut layers = Vec::with_capacity(editor.layers().len());
    for (idx, (id, raster)) in editor.export_layers()?.into_iter().enumerate() {
        let filename = format!("layer_{idx:03}.png");
        save_raster(&raster, &folder.join(&filename))?;
        let layer = editor.layers().get(id).ok_or(Error::UnknownLayer(id))?;
        layers.push(layer.metadata(filename));
    }

    let manifest = SessionManifest {
        width: image.width,
        height: image.height,
        layers,
    };
    fs::write(
        folder.join("manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    fs::write(folder.join("report.csv"), to_csv(&editor.report()?))?;
    info!(
        "exported {} layers to {}",
        manifest.layers.len(),
        folder.display()
    );
    Ok(manifest)
}
