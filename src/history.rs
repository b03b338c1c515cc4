use std::collections::VecDeque;

use crate::layer::LayerStack;
use crate::raster::Raster;

pub const MAX_HISTORY: usize = 30;

/// Full copy of the editable state: image plus every layer with its buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub image: Raster,
    pub layers: LayerStack,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }
}

/// Bounded undo/redo stacks. Entries are owned deep copies, never shared with
/// the live state.
pub struct History {
    past: VecDeque<Snapshot>,
    future: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            past: VecDeque::new(),
            future: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records `state` as the newest undo point and forgets the redo branch.
    pub fn push(&mut self, state: &Snapshot) {
        Self::push_bounded(&mut self.past, state.clone(), self.capacity);
        self.future.clear();
    }

    /// Returns the state to restore, or `None` if there is nothing to undo.
    pub fn undo(&mut self, current: &Snapshot) -> Option<Snapshot> {
        let state = self.past.pop_back()?;
        Self::push_bounded(&mut self.future, current.clone(), self.capacity);
        Some(state)
    }

    pub fn redo(&mut self, current: &Snapshot) -> Option<Snapshot> {
        let state = self.future.pop_back()?;
        Self::push_bounded(&mut self.past, current.clone(), self.capacity);
        Some(state)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    fn push_bounded(stack: &mut VecDeque<Snapshot>, state: Snapshot, capacity: usize) {
        if stack.len() >= capacity {
            stack.pop_front();
        }
        stack.push_back(state);
    }
}
