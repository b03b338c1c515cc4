use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::brush::Brush;
use crate::error::Result;
use crate::history::MAX_HISTORY;
use crate::layer::DEFAULT_TOLERANCE;
use crate::palette::ExtractOptions;

/// Session settings. Every field is optional in the JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Tolerance given to newly created layers.
    pub default_tolerance: f32,
    pub history_capacity: usize,
    /// Global multiplier on paint alpha when compositing.
    pub paint_opacity: f32,
    pub extract: ExtractOptions,
    pub brush: Brush,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_tolerance: DEFAULT_TOLERANCE,
            history_capacity: MAX_HISTORY,
            paint_opacity: 1.0,
            extract: ExtractOptions::default(),
            brush: Brush::default(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
