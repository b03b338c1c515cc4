use crate::brush::{Brush, StrokeKind};
use crate::color::Color;

pub const BRUSH_SIZE_MIN: u32 = 1;
pub const BRUSH_SIZE_MAX: u32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Pick,
    Erase,
    Paint,
}

impl Tool {
    pub fn stroke_kind(&self) -> Option<StrokeKind> {
        match self {
            Tool::Pick => None,
            Tool::Erase => Some(StrokeKind::Erase),
            Tool::Paint => Some(StrokeKind::Paint),
        }
    }
}

/// Current tool and brush settings.
pub struct InputState {
    pub tool: Tool,
    pub brush: Brush,
}

impl InputState {
    pub fn new(brush: Brush) -> Self {
        Self {
            tool: Tool::Erase,
            brush,
        }
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_brush_color(&mut self, color: Color) {
        self.brush.color = color;
    }

    pub fn set_brush_opacity(&mut self, opacity: f32) {
        self.brush.opacity = opacity.clamp(0.0, 100.0);
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush.size = size.clamp(BRUSH_SIZE_MIN, BRUSH_SIZE_MAX);
    }

    pub fn adjust_brush_size(&mut self, delta: i32) {
        let size = (self.brush.size as i64 + delta as i64).max(0) as u32;
        self.set_brush_size(size);
    }
}
