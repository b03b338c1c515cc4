use std::fmt::{self, Display};

use crate::layer::LayerId;
use crate::raster::Rect;

#[derive(Debug)]
pub enum Error {
    /// A buffer does not match the current image size.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Crop rectangle is empty or reaches outside the image.
    InvalidCrop { rect: Rect, width: u32, height: u32 },
    UnknownLayer(LayerId),
    NoLayerSelected,
    NoActiveStroke,
    NoImage,
    InvalidOption(String),
    Image(image::ImageError),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "{what} has length {actual}, expected {expected} for the current image"
            ),
            Error::InvalidCrop {
                rect,
                width,
                height,
            } => write!(
                f,
                "crop {}x{} at ({}, {}) does not fit inside a {width}x{height} image",
                rect.width, rect.height, rect.x, rect.y
            ),
            Error::UnknownLayer(id) => write!(f, "no layer with id {id}"),
            Error::NoLayerSelected => write!(f, "no layer is selected"),
            Error::NoActiveStroke => write!(f, "no stroke is in progress"),
            Error::NoImage => write!(f, "no image is loaded"),
            Error::InvalidOption(s) => write!(f, "invalid option: {s}"),
            Error::Image(e) => write!(f, "image error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Image(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fails with `DimensionMismatch` unless `actual == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
