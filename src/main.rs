// Headless driver: load an image, split it into color layers, apply the
// requested edits and write the view, the per-layer images, the manifest and
// the color report.
//
//   colorsep -i photo.png -o out/
//   colorsep -i photo.png -o out/ --rotate 90 --crop 10,10,200,120
//   colorsep -i logo.png -o out/ --view reconstruct --layers 0,2 --format jpg

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use colorsep::adjust::Adjustment;
use colorsep::{Editor, EditorConfig, Error, LayerId, Rect, Result, Transform, View, io};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    Whole,
    Isolate,
    Reconstruct,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Png,
    Jpg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AdjustArg {
    Invert,
    Grayscale,
}

#[derive(Parser, Debug)]
#[command(name = "colorsep", about = "Split an image into color layers and recombine them")]
struct Args {
    /// Image to separate (PNG, JPEG, ...).
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for all outputs.
    #[arg(short, long, default_value = "colorsep_out")]
    output_dir: PathBuf,

    /// JSON settings file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_colors: Option<usize>,

    #[arg(long)]
    sample_step: Option<u32>,

    #[arg(long)]
    levels: Option<u32>,

    /// Tolerance (0-100) for every generated layer.
    #[arg(short, long)]
    tolerance: Option<f32>,

    /// 90, -90 or 180.
    #[arg(long, allow_hyphen_values = true)]
    rotate: Option<i32>,

    #[arg(long)]
    flip_h: bool,

    #[arg(long)]
    flip_v: bool,

    /// x,y,width,height
    #[arg(long, value_parser = parse_rect)]
    crop: Option<Rect>,

    #[arg(long, value_enum)]
    adjust: Option<AdjustArg>,

    #[arg(long, value_enum, default_value = "whole")]
    view: ViewArg,

    /// Stack indices used by isolate (first one) and reconstruct.
    #[arg(long, value_delimiter = ',')]
    layers: Vec<usize>,

    #[arg(short, long, value_enum, default_value = "png")]
    format: Format,
}

fn parse_rect(s: &str) -> std::result::Result<Rect, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected x,y,width,height, got {s:?}")),
    }
}

fn build_config(args: &Args) -> Result<EditorConfig> {
    let mut config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    if let Some(n) = args.max_colors {
        config.extract.max_colors = n;
    }
    if let Some(step) = args.sample_step {
        config.extract.sample_step = step;
    }
    if let Some(levels) = args.levels {
        config.extract.levels = levels;
    }
    if let Some(t) = args.tolerance {
        config.default_tolerance = t;
    }
    Ok(config)
}

fn layer_ids(editor: &Editor, indices: &[usize]) -> Result<Vec<LayerId>> {
    let ids = editor.layers().ids();
    indices
        .iter()
        .map(|&i| {
            ids.get(i).copied().ok_or_else(|| {
                Error::InvalidOption(format!("layer index {i} out of range ({} layers)", ids.len()))
            })
        })
        .collect()
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let mut editor = Editor::new(config);
    let count = editor.load_image(io::load_image(&args.input)?)?;
    if count == 0 {
        warn!("no opaque pixels found, no layers created");
    }

    if let Some(degrees) = args.rotate {
        editor.apply_transform(Transform::rotate(degrees)?)?;
    }
    if let Some(flip) = Transform::flip(args.flip_h, args.flip_v) {
        editor.apply_transform(flip)?;
    }
    if let Some(rect) = args.crop {
        editor.apply_transform(Transform::Crop(rect))?;
    }
    match args.adjust {
        Some(AdjustArg::Invert) => editor.apply_adjustment(Adjustment::Invert)?,
        Some(AdjustArg::Grayscale) => editor.apply_adjustment(Adjustment::Grayscale)?,
        None => {}
    }

    let selected = layer_ids(&editor, &args.layers)?;
    let view = match args.view {
        ViewArg::Whole => Some(View::Whole),
        ViewArg::Isolate => match selected.first() {
            Some(id) => Some(View::Isolate(*id)),
            None => return Err(Error::InvalidOption("--view isolate needs --layers".into())),
        },
        ViewArg::Reconstruct if selected.is_empty() => None,
        ViewArg::Reconstruct => Some(View::Reconstruct(selected)),
    };

    io::export_session(&editor, &args.output_dir)?;
    match view {
        Some(view) => {
            editor.request_render(view);
            if let Some((view, raster)) = editor.take_render()? {
                let ext = match args.format {
                    Format::Png => "png",
                    Format::Jpg => "jpg",
                };
                let path = args.output_dir.join(format!("view.{ext}"));
                io::save_raster(&raster, &path)?;
                info!("wrote {view:?} to {}", path.display());
            }
        }
        None => warn!("empty reconstruct selection, no view written"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_parsing() {
        assert_eq!(parse_rect("1, 2,3,4"), Ok(Rect::new(1, 2, 3, 4)));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "colorsep",
            "-i",
            "x.png",
            "--max-colors",
            "3",
            "--tolerance",
            "42",
            "--rotate",
            "-90",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.extract.max_colors, 3);
        assert_eq!(config.default_tolerance, 42.0);
        assert_eq!(args.rotate, Some(-90));
    }
}
