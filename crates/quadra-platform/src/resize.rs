//! Resize-pending flag shared between the window callback and the render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A coalescing resize notification.
///
/// Any number of [`raise`](Self::raise) calls between two
/// [`take`](Self::take) calls are observed as a single pending resize.
#[derive(Debug, Clone, Default)]
pub struct ResizeSignal {
    pending: Arc<AtomicBool>,
}

impl ResizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a resize as pending.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a resize is pending, without clearing it.
    pub fn is_raised(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
