use rayon::prelude::*;

use crate::color::Color;
use crate::layer::LayerStack;
use crate::palette::MIN_SAMPLE_ALPHA;
use crate::raster::Raster;

pub const CSV_HEADER: &str = "Color (Hex),R,G,B,Pixel Count,Percentage";

#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub color: Color,
    pub pixel_count: usize,
    /// Share of the counted (alpha >= 128) pixels, 0..=100.
    pub percentage: f64,
}

/// Counts, per layer, the original pixels within that layer's tolerance.
pub fn color_report(original: &Raster, layers: &LayerStack) -> Vec<ReportRow> {
    let counted = original
        .pixels
        .par_chunks_exact(4)
        .filter(|px| px[3] >= MIN_SAMPLE_ALPHA)
        .count();

    layers
        .iter()
        .map(|layer| {
            let matcher = layer.matcher();
            let pixel_count = original
                .pixels
                .par_chunks_exact(4)
                .filter(|px| px[3] >= MIN_SAMPLE_ALPHA && matcher.matches(px))
                .count();
            let percentage = if counted == 0 {
                0.0
            } else {
                pixel_count as f64 / counted as f64 * 100.0
            };
            ReportRow {
                color: layer.color,
                pixel_count,
                percentage,
            }
        })
        .collect()
}

/// Renders rows as CSV with CRLF line endings.
pub fn to_csv(rows: &[ReportRow]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{:.2}%\r\n",
            row.color.hex(),
            row.color.r,
            row.color.g,
            row.color.b,
            row.pixel_count,
            row.percentage
        ));
    }
    out
}
