//! Latest-frame publication for live views.

use mxos_types::{Frame, RegistrationId};
use parking_lot::RwLock;
use std::sync::Arc;

/// One published frame.
#[derive(Debug, Clone)]
pub struct ObservedFrame {
    /// Increases by one per publish.
    pub generation: u64,
    pub frame: Arc<Frame>,
    /// Registration whose frame this is, `None` for a blank fallback.
    pub source: Option<RegistrationId>,
}

/// Shared slot holding the most recently presented frame.
///
/// Cloning is cheap; all clones see the same slot. Readers never block the
/// render loop for longer than a pointer swap.
#[derive(Debug, Clone, Default)]
pub struct FrameObserver {
    inner: Arc<RwLock<Option<ObservedFrame>>>,
}

impl FrameObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame, source: Option<RegistrationId>) {
        let mut slot = self.inner.write();
        let generation = slot.as_ref().map_or(1, |f| f.generation + 1);
        *slot = Some(ObservedFrame {
            generation,
            frame: Arc::new(frame),
            source,
        });
    }

    #[must_use]
    pub fn latest(&self) -> Option<ObservedFrame> {
        self.inner.read().clone()
    }

    /// 0 before the first publish.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().as_ref().map_or(0, |f| f.generation)
    }
}
