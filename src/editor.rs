//! Editing session: the single owner of the image, its layers, the brush
//! scratch buffers and the undo history.
//!
//! Every public mutation runs to completion before returning, so callers never
//! see a half-applied transform. Structural edits, strokes, transforms and
//! adjustments push one history snapshot each; tolerance and visibility edits
//! do not.

use log::{debug, info};

use crate::adjust::Adjustment;
use crate::brush::{BrushEngine, StrokeCommit};
use crate::color::Color;
use crate::composite::{self, RenderOptions, View};
use crate::config::EditorConfig;
use crate::error::{Error, Result};
use crate::history::{History, Snapshot};
use crate::input::{InputState, Tool};
use crate::layer::{LayerId, LayerStack};
use crate::palette::extract_dominant_colors;
use crate::raster::Raster;
use crate::report::{ReportRow, color_report};
use crate::transform::Transform;

pub struct Editor {
    config: EditorConfig,
    image: Option<Raster>,
    layers: LayerStack,
    brush: BrushEngine,
    input: InputState,
    history: History,
    selected: Option<LayerId>,
    picked: Option<Color>,
    pending_render: Option<View>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            brush: BrushEngine::new(0, 0),
            input: InputState::new(config.brush),
            history: History::new(config.history_capacity),
            layers: LayerStack::new(0, 0),
            image: None,
            selected: None,
            picked: None,
            pending_render: None,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn image(&self) -> Option<&Raster> {
        self.image.as_ref()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn picked(&self) -> Option<Color> {
        self.picked
    }

    pub fn is_stroking(&self) -> bool {
        self.brush.is_active()
    }

    fn require_image(&self) -> Result<&Raster> {
        self.image.as_ref().ok_or(Error::NoImage)
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            image: self.require_image()?.clone(),
            layers: self.layers.clone(),
        })
    }

    fn record(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?;
        self.history.push(&snapshot);
        Ok(())
    }

    /// Replaces the session with a new image and seeds one layer per dominant
    /// color. Returns the number of layers created.
    pub fn load_image(&mut self, image: Raster) -> Result<usize> {
        let colors = extract_dominant_colors(&image, &self.config.extract)?;
        let mut layers = LayerStack::new(image.width, image.height);
        for color in &colors {
            layers.push(*color, self.config.default_tolerance);
        }
        info!(
            "loaded {}x{} image, {} color layers",
            image.width,
            image.height,
            layers.len()
        );

        self.brush = BrushEngine::new(image.width, image.height);
        self.selected = layers.layers().first().map(|l| l.id);
        self.layers = layers;
        self.image = Some(image);
        self.picked = None;
        self.pending_render = None;
        self.history.clear();
        Ok(colors.len())
    }

    /// Samples the original image. Transparent or out-of-range pixels give `None`.
    pub fn pick_color_at(&mut self, x: u32, y: u32) -> Option<Color> {
        let px = self.image.as_ref()?.get_pixel(x, y)?;
        if px[3] == 0 {
            return None;
        }
        let color = Color::from_rgba(&px);
        self.picked = Some(color);
        Some(color)
    }

    pub fn add_layer_from_picked(&mut self) -> Result<LayerId> {
        let color = self
            .picked
            .ok_or_else(|| Error::InvalidOption("no color has been picked".into()))?;
        self.add_layer(color)
    }

    /// Adds a full-mask layer on top of the stack and selects it.
    pub fn add_layer(&mut self, color: Color) -> Result<LayerId> {
        self.finish_stroke()?;
        self.record()?;
        let id = self
            .layers
            .insert(0, color, self.config.default_tolerance, None, None)?;
        debug!("added layer {id} ({})", color.hex());
        self.set_selection(Some(id));
        Ok(id)
    }

    pub fn delete_layer(&mut self, id: LayerId) -> Result<()> {
        if self.layers.get(id).is_none() {
            return Err(Error::UnknownLayer(id));
        }
        self.finish_stroke()?;
        self.record()?;
        self.layers.remove(id)?;
        debug!("deleted layer {id}");
        if self.selected == Some(id) {
            let first = self.layers.layers().first().map(|l| l.id);
            self.set_selection(first);
        }
        Ok(())
    }

    /// Selecting a different layer commits any stroke in progress first.
    pub fn select_layer(&mut self, id: LayerId) -> Result<()> {
        if self.layers.get(id).is_none() {
            return Err(Error::UnknownLayer(id));
        }
        if self.selected != Some(id) {
            self.finish_stroke()?;
            self.set_selection(Some(id));
        }
        Ok(())
    }

    fn set_selection(&mut self, id: Option<LayerId>) {
        if self.selected != id {
            self.brush.reset_overlay();
        }
        self.selected = id;
    }

    pub fn move_layer_by(&mut self, id: LayerId, delta: isize) -> Result<usize> {
        if self.layers.get(id).is_none() {
            return Err(Error::UnknownLayer(id));
        }
        self.finish_stroke()?;
        self.record()?;
        self.layers.move_by(id, delta)
    }

    pub fn move_layer_to(&mut self, id: LayerId, target: usize) -> Result<usize> {
        if self.layers.get(id).is_none() {
            return Err(Error::UnknownLayer(id));
        }
        self.finish_stroke()?;
        self.record()?;
        self.layers.move_to(id, target)
    }

    pub fn set_tolerance(&mut self, id: LayerId, tolerance: f32) -> Result<()> {
        self.layers.set_tolerance(id, tolerance)
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<()> {
        self.layers.set_visible(id, visible)
    }

    /// Starts a stroke on the selected layer with the current tool. With the
    /// pick tool this only samples the color under the pointer.
    pub fn begin_stroke(&mut self, x: i32, y: i32) -> Result<()> {
        let Some(kind) = self.input.tool.stroke_kind() else {
            if x >= 0 && y >= 0 {
                self.pick_color_at(x as u32, y as u32);
            }
            return Ok(());
        };
        self.require_image()?;
        let id = self.selected.ok_or(Error::NoLayerSelected)?;
        self.finish_stroke()?;
        let layer = self.layers.get(id).ok_or(Error::UnknownLayer(id))?;
        self.brush.begin(layer, kind)?;
        self.brush.stroke_to(x, y, &self.input.brush)
    }

    /// Extends the open stroke. Ignored when no stroke is open.
    pub fn stroke_to(&mut self, x: i32, y: i32) -> Result<()> {
        if !self.brush.is_active() {
            return Ok(());
        }
        self.brush.stroke_to(x, y, &self.input.brush)
    }

    /// Pointer released. Returns whether the layer changed.
    pub fn end_stroke(&mut self) -> Result<bool> {
        self.finish_stroke()
    }

    /// Pointer left the drawable area; the stroke is kept, not rolled back.
    pub fn leave_surface(&mut self) -> Result<bool> {
        self.finish_stroke()
    }

    fn finish_stroke(&mut self) -> Result<bool> {
        let Some(commit) = self.brush.end() else {
            return Ok(false);
        };
        self.record()?;
        match commit {
            StrokeCommit::Erase { layer, mask } => {
                debug!("committing erase stroke on layer {layer}");
                self.layers.replace_mask(layer, mask)?;
            }
            StrokeCommit::Paint { layer, overlay } => {
                debug!("committing paint stroke on layer {layer}");
                self.layers.merge_paint(layer, &overlay)?;
            }
        }
        Ok(true)
    }

    /// Rotates, flips or crops the image together with every mask and paint overlay.
    pub fn apply_transform(&mut self, transform: Transform) -> Result<()> {
        self.finish_stroke()?;
        let image = self.require_image()?;
        let (w, h) = (image.width, image.height);
        let new_image = transform.apply_to_raster(image)?;
        let buffers = self
            .layers
            .iter()
            .map(|layer| {
                let mask = transform.apply_to_mask(&layer.mask, w, h)?;
                let paint = match &layer.paint {
                    Some(p) => Some(transform.apply_to_overlay(p, w, h)?),
                    None => None,
                };
                Ok((mask, paint))
            })
            .collect::<Result<Vec<_>>>()?;

        self.record()?;
        self.layers
            .replace_geometry(new_image.width, new_image.height, buffers)?;
        self.brush.resize(new_image.width, new_image.height);
        info!(
            "{transform:?}: {w}x{h} -> {}x{}",
            new_image.width, new_image.height
        );
        self.image = Some(new_image);
        Ok(())
    }

    pub fn apply_adjustment(&mut self, adjustment: Adjustment) -> Result<()> {
        self.finish_stroke()?;
        let adjusted = adjustment.apply(self.require_image()?);
        self.record()?;
        info!("applied {adjustment:?}");
        self.image = Some(adjusted);
        Ok(())
    }

    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        self.finish_stroke()?;
        let current = self.snapshot()?;
        match self.history.undo(&current) {
            Some(state) => {
                self.restore(state);
                info!("undo ({} left)", self.history.undo_len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.finish_stroke()?;
        let current = self.snapshot()?;
        match self.history.redo(&current) {
            Some(state) => {
                self.restore(state);
                info!("redo ({} left)", self.history.redo_len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn restore(&mut self, state: Snapshot) {
        let (w, h) = (state.width(), state.height());
        if self.layers.width != w || self.layers.height != h {
            self.brush.resize(w, h);
        } else {
            self.brush.reset_overlay();
        }
        self.image = Some(state.image);
        self.layers = state.layers;
        let keep = self.selected.filter(|id| self.layers.get(*id).is_some());
        self.selected = keep.or_else(|| self.layers.layers().first().map(|l| l.id));
    }

    /// Composites `view` from the current state, including any open stroke.
    pub fn render(&self, view: &View) -> Result<Raster> {
        let image = self.require_image()?;
        let opts = RenderOptions {
            paint_opacity: self.config.paint_opacity,
            preview: self.brush.preview(),
        };
        composite::render(image, &self.layers, view, &opts)
    }

    /// Queues a render; a newer request replaces one that was not taken yet.
    pub fn request_render(&mut self, view: View) {
        if let Some(old) = self.pending_render.replace(view) {
            debug!("render request {old:?} superseded");
        }
    }

    /// Renders the latest queued request, if any.
    pub fn take_render(&mut self) -> Result<Option<(View, Raster)>> {
        match self.pending_render.take() {
            Some(view) => {
                let raster = self.render(&view)?;
                Ok(Some((view, raster)))
            }
            None => Ok(None),
        }
    }

    /// Only the chosen layers; `None` for an empty selection.
    pub fn reconstruct(&self, ids: &[LayerId]) -> Result<Option<Raster>> {
        if ids.is_empty() {
            return Ok(None);
        }
        self.render(&View::Reconstruct(ids.to_vec())).map(Some)
    }

    /// One isolated raster per layer, in stack order.
    pub fn export_layers(&self) -> Result<Vec<(LayerId, Raster)>> {
        self.layers
            .iter()
            .map(|layer| Ok((layer.id, self.render(&View::Isolate(layer.id))?)))
            .collect()
    }

    /// Like `export_layers` restricted to `ids`; `None` for an empty selection.
    pub fn export_selected(&self, ids: &[LayerId]) -> Result<Option<Vec<(LayerId, Raster)>>> {
        if ids.is_empty() {
            return Ok(None);
        }
        ids.iter()
            .map(|id| Ok((*id, self.render(&View::Isolate(*id))?)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn report(&self) -> Result<Vec<ReportRow>> {
        Ok(color_report(self.require_image()?, &self.layers))
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.input.set_tool(tool);
    }
}
