//! Color separation editor engine: splits an image into one layer per
//! dominant color, lets each layer be erased, painted and reordered, and
//! composites the result back into whole, isolated or reconstructed views.

pub mod adjust;
pub mod brush;
pub mod color;
pub mod composite;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod input;
pub mod io;
pub mod layer;
pub mod palette;
pub mod raster;
pub mod report;
pub mod transform;

pub use color::{Color, color_matches, tolerance_to_distance};
pub use composite::View;
pub use config::EditorConfig;
pub use editor::Editor;
pub use error::{Error, Result};
pub use layer::{Layer, LayerId, LayerStack};
pub use raster::{Raster, Rect};
pub use transform::Transform;
