//! Per-frame command and synchronization state.

use ash::vk;
use quadra_gpu::FrameSync;

use crate::backend::FrameBackend;
use crate::error::{RenderError, Result};

/// One of N reusable frame contexts.
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    pub sync: FrameSync,
    pub command_buffer: vk::CommandBuffer,
}

/// Round-robin pool of frame slots.
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameSlots {
    /// Create `count` slots. At least two are required.
    pub fn new<B: FrameBackend>(backend: &mut B, count: usize) -> Result<Self> {
        if count < 2 {
            return Err(RenderError::InvalidFramesInFlight(count));
        }

        let mut slots = Self {
            slots: Vec::with_capacity(count),
            current: 0,
        };
        for _ in 0..count {
            match backend.create_frame_slot() {
                Ok(slot) => slots.slots.push(slot),
                Err(e) => {
                    slots.destroy(backend);
                    return Err(e.into());
                }
            }
        }

        tracing::debug!("Created {count} frame slots");
        Ok(slots)
    }

    /// The active slot.
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// Index of the active slot, in `0..len()`.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Move to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Release every slot. No slot may have pending GPU work.
    pub fn destroy<B: FrameBackend>(&mut self, backend: &mut B) {
        for slot in self.slots.drain(..) {
            backend.destroy_frame_slot(&slot);
        }
        self.current = 0;
    }
}
