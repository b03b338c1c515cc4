use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{Color, Matcher};
use crate::error::{Error, Result, check_len};
use crate::raster::pixel_count;

pub const DEFAULT_TOLERANCE: f32 = 10.0;

/// Per-pixel keep flags: 1 = kept, 0 = erased.
pub type Mask = Vec<u8>;

pub fn full_mask(width: u32, height: u32) -> Mask {
    vec![1; pixel_count(width, height)]
}

/// Stable identifier, independent of stacking order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub color: Color,
    pub tolerance: f32,
    pub visible: bool,
    pub mask: Mask,
    pub paint: Option<Vec<u8>>, // RGBA8, same size as the image
}

impl Layer {
    pub fn new(id: LayerId, color: Color, tolerance: f32, mask: Mask) -> Self {
        Self {
            id,
            name: color.hex(),
            color,
            tolerance,
            visible: true,
            mask,
            paint: None,
        }
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.color, self.tolerance)
    }

    pub fn metadata(&self, filename: String) -> LayerMetadata {
        LayerMetadata {
            id: self.id,
            name: self.name.clone(),
            color: self.color.hex(),
            tolerance: self.tolerance,
            visible: self.visible,
            has_paint: self.paint.is_some(),
            filename,
        }
    }
}

/// What gets written to `manifest.json` next to each exported layer image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerMetadata {
    pub id: LayerId,
    pub name: String,
    pub color: String,
    pub tolerance: f32,
    pub visible: bool,
    pub has_paint: bool,
    pub filename: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionManifest {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerMetadata>,
}

/// Ordered layers for one image; index 0 is the topmost layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerStack {
    pub width: u32,
    pub height: u32,
    layers: Vec<Layer>,
    next_id: u64,
}

impl LayerStack {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id).collect()
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    fn get_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(Error::UnknownLayer(id))
    }

    fn expected_mask_len(&self) -> usize {
        pixel_count(self.width, self.height)
    }

    /// Appends a layer at the bottom of the stack with a full mask.
    pub fn push(&mut self, color: Color, tolerance: f32) -> LayerId {
        let id = self.allocate_id();
        let mask = full_mask(self.width, self.height);
        self.layers
            .push(Layer::new(id, color, tolerance.clamp(0.0, 100.0), mask));
        id
    }

    /// Creates a layer at `index` (clamped). `id` and `mask` override the defaults.
    pub fn insert(
        &mut self,
        index: usize,
        color: Color,
        tolerance: f32,
        id: Option<LayerId>,
        mask: Option<Mask>,
    ) -> Result<LayerId> {
        let mask = match mask {
            Some(mask) => {
                check_len("mask", self.expected_mask_len(), mask.len())?;
                mask
            }
            None => full_mask(self.width, self.height),
        };
        let id = match id {
            Some(id) => {
                if self.get(id).is_some() {
                    return Err(Error::InvalidOption(format!("layer id {id} already in use")));
                }
                self.next_id = self.next_id.max(id.0 + 1);
                id
            }
            None => self.allocate_id(),
        };
        let index = index.min(self.layers.len());
        self.layers
            .insert(index, Layer::new(id, color, tolerance.clamp(0.0, 100.0), mask));
        Ok(id)
    }

    fn allocate_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn remove(&mut self, id: LayerId) -> Result<Layer> {
        let idx = self.index_of(id).ok_or(Error::UnknownLayer(id))?;
        Ok(self.layers.remove(idx))
    }

    /// Moves a layer by `delta` slots (negative = towards the top), clamped.
    pub fn move_by(&mut self, id: LayerId, delta: isize) -> Result<usize> {
        let from = self.index_of(id).ok_or(Error::UnknownLayer(id))?;
        let last = self.layers.len() as isize - 1;
        let to = (from as isize + delta).clamp(0, last) as usize;
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(to)
    }

    /// Moves a layer to the drop position `target`, measured before removal.
    pub fn move_to(&mut self, id: LayerId, target: usize) -> Result<usize> {
        let from = self.index_of(id).ok_or(Error::UnknownLayer(id))?;
        let mut to = target.min(self.layers.len());
        if to > from {
            to -= 1;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(to)
    }

    pub fn set_tolerance(&mut self, id: LayerId, tolerance: f32) -> Result<()> {
        self.get_mut(id)?.tolerance = tolerance.clamp(0.0, 100.0);
        Ok(())
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<()> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn replace_mask(&mut self, id: LayerId, mask: Mask) -> Result<()> {
        check_len("mask", self.expected_mask_len(), mask.len())?;
        self.get_mut(id)?.mask = mask;
        Ok(())
    }

    pub fn replace_paint(&mut self, id: LayerId, paint: Option<Vec<u8>>) -> Result<()> {
        if let Some(p) = &paint {
            check_len("paint overlay", self.expected_mask_len() * 4, p.len())?;
        }
        self.get_mut(id)?.paint = paint;
        Ok(())
    }

    /// Blends a stroke overlay over the layer's committed paint.
    pub fn merge_paint(&mut self, id: LayerId, stroke: &[u8]) -> Result<()> {
        let (w, h) = (self.width, self.height);
        let layer = self.get_mut(id)?;
        let merged = merge_paint_overlay(layer.paint.as_deref(), stroke, w, h)?;
        layer.paint = Some(merged);
        Ok(())
    }

    /// Swaps in remapped buffers for a new image size. Every layer must be covered.
    pub(crate) fn replace_geometry(
        &mut self,
        width: u32,
        height: u32,
        buffers: Vec<(Mask, Option<Vec<u8>>)>,
    ) -> Result<()> {
        check_len("layer buffers", self.layers.len(), buffers.len())?;
        let n = pixel_count(width, height);
        for (mask, paint) in &buffers {
            check_len("mask", n, mask.len())?;
            if let Some(p) = paint {
                check_len("paint overlay", n * 4, p.len())?;
            }
        }
        for (layer, (mask, paint)) in self.layers.iter_mut().zip(buffers) {
            layer.mask = mask;
            layer.paint = paint;
        }
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Blends `stroke` over `existing` ("new over existing").
///
/// With no existing paint the stroke is returned as-is.
pub fn merge_paint_overlay(
    existing: Option<&[u8]>,
    stroke: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let len = pixel_count(width, height) * 4;
    check_len("paint stroke", len, stroke.len())?;
    let Some(existing) = existing else {
        return Ok(stroke.to_vec());
    };
    check_len("paint overlay", len, existing.len())?;

    let mut out = existing.to_vec();
    for (dst, src) in out.chunks_exact_mut(4).zip(stroke.chunks_exact(4)) {
        if src[3] == 0 {
            continue;
        }
        let blended = crate::composite::blend_over([dst[0], dst[1], dst[2], dst[3]], src, 1.0);
        dst.copy_from_slice(&blended);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with(n: usize) -> (LayerStack, Vec<LayerId>) {
        let mut stack = LayerStack::new(2, 2);
        let ids = (0..n)
            .map(|i| stack.push(Color::new(i as u8, 0, 0), DEFAULT_TOLERANCE))
            .collect();
        (stack, ids)
    }

    #[test]
    fn new_layer_defaults() {
        let (stack, ids) = stack_with(1);
        let layer = stack.get(ids[0]).unwrap();
        assert_eq!(layer.name, "#000000");
        assert_eq!(layer.mask, vec![1; 4]);
        assert!(layer.visible);
        assert!(layer.paint.is_none());
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let (mut stack, ids) = stack_with(3);
        stack.remove(ids[1]).unwrap();
        let new_id = stack.push(Color::BLACK, 10.0);
        assert!(!ids.contains(&new_id));
        assert_eq!(stack.index_of(ids[2]), Some(1));
        assert!(matches!(stack.remove(ids[1]), Err(Error::UnknownLayer(_))));
    }

    #[test]
    fn move_by_clamps() {
        let (mut stack, ids) = stack_with(3);
        assert_eq!(stack.move_by(ids[0], 1).unwrap(), 1);
        assert_eq!(stack.ids(), vec![ids[1], ids[0], ids[2]]);
        assert_eq!(stack.move_by(ids[2], -10).unwrap(), 0);
        assert_eq!(stack.ids(), vec![ids[2], ids[1], ids[0]]);
        assert_eq!(stack.move_by(ids[2], 99).unwrap(), 2);
    }

    #[test]
    fn move_to_accounts_for_removed_slot() {
        let (mut stack, ids) = stack_with(4);
        // Dropping layer 0 between layers 2 and 3 (position 3) lands at index 2.
        assert_eq!(stack.move_to(ids[0], 3).unwrap(), 2);
        assert_eq!(stack.ids(), vec![ids[1], ids[2], ids[0], ids[3]]);
        // Moving backwards needs no adjustment.
        assert_eq!(stack.move_to(ids[3], 0).unwrap(), 0);
        assert_eq!(stack.ids(), vec![ids[3], ids[1], ids[2], ids[0]]);
        // Past the end lands at the bottom.
        assert_eq!(stack.move_to(ids[3], 100).unwrap(), 3);
    }

    #[test]
    fn tolerance_is_clamped() {
        let (mut stack, ids) = stack_with(1);
        stack.set_tolerance(ids[0], 150.0).unwrap();
        assert_eq!(stack.get(ids[0]).unwrap().tolerance, 100.0);
        stack.set_tolerance(ids[0], -1.0).unwrap();
        assert_eq!(stack.get(ids[0]).unwrap().tolerance, 0.0);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let (mut stack, ids) = stack_with(1);
        assert!(matches!(
            stack.replace_mask(ids[0], vec![1; 3]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(stack.replace_paint(ids[0], Some(vec![0; 15])).is_err());
        assert!(stack.merge_paint(ids[0], &[0; 4]).is_err());
        assert!(
            stack
                .insert(0, Color::BLACK, 10.0, None, Some(vec![0; 5]))
                .is_err()
        );
    }

    #[test]
    fn insert_with_id_override() {
        let (mut stack, _) = stack_with(1);
        let id = stack
            .insert(0, Color::BLACK, 10.0, Some(LayerId(40)), Some(vec![0, 1, 0, 1]))
            .unwrap();
        assert_eq!(id, LayerId(40));
        assert_eq!(stack.index_of(id), Some(0));
        assert_eq!(stack.get(id).unwrap().mask, vec![0, 1, 0, 1]);
        assert!(stack.insert(0, Color::BLACK, 10.0, Some(id), None).is_err());
        assert!(stack.push(Color::BLACK, 10.0).0 > 40);
    }

    #[test]
    fn merge_without_existing_paint_is_identity() {
        let stroke: Vec<u8> = (0..16).map(|i| (i * 7) as u8).collect();
        assert_eq!(merge_paint_overlay(None, &stroke, 2, 2).unwrap(), stroke);
    }

    #[test]
    fn merge_puts_new_paint_over_existing() {
        let existing = [0, 0, 255, 255, 10, 20, 30, 255];
        let stroke = [255, 0, 0, 255, 0, 0, 0, 0];
        let merged = merge_paint_overlay(Some(&existing), &stroke, 2, 1).unwrap();
        assert_eq!(&merged[0..4], &[255, 0, 0, 255]);
        assert_eq!(&merged[4..8], &[10, 20, 30, 255]);

        let half = [255, 0, 0, 128, 0, 0, 0, 0];
        let merged = merge_paint_overlay(Some(&existing), &half, 2, 1).unwrap();
        assert_eq!(merged[3], 255);
        assert_eq!(merged[0], 128);
        assert_eq!(merged[2], 127);
    }
}
