//! Texture identity and handles.
//!
//! A [`TextureId`] is the process-unique identity of a descriptor and survives
//! every rebuild and transfer. A [`TextureHandle`] is what callers hold: the id plus
//! the generational arena slot it lives in, so a handle to a disposed texture is
//! detected instead of silently reaching whatever reused the slot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use halcyon_core::alloc::sparse_set::IndexSlot;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically assigned texture identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);

impl TextureId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Ids built this way are not guaranteed unique.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to a texture owned by a [`TextureManager`](crate::TextureManager).
///
/// Handles are `Copy`; copying one does not add a reference. Use
/// `TextureManager::increment_references` for an additional logical owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub(crate) slot: IndexSlot,
    pub(crate) id: TextureId,
}

impl TextureHandle {
    pub(crate) fn new(slot: IndexSlot, id: TextureId) -> Self {
        Self { slot, id }
    }

    /// The stable identity of the texture this handle refers to.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The arena slot (index and generation).
    pub fn slot(&self) -> IndexSlot {
        self.slot
    }
}
