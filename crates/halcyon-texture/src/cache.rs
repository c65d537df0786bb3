//! The set of live textures a context loss has to rebuild.

use halcyon_core::alloc::HashSet;

use crate::handle::TextureId;

/// Ids of every texture currently backed (or meant to be backed) by the device.
///
/// Inserting an id twice or removing an absent one is a no-op, so a transfer
/// can always be expressed as "remove the retired id, insert the survivor".
#[derive(Debug, Default)]
pub struct LoadedTextureCache {
    ids: HashSet<TextureId>,
}

impl LoadedTextureCache {
    pub fn new() -> Self {
        Self {
            ids: HashSet::default(),
        }
    }

    /// Returns `true` if the id was not present.
    pub fn insert(&mut self, id: TextureId) -> bool {
        let inserted = self.ids.insert(id);
        tracing::trace!("Cache insert {} (new: {})", id, inserted);
        inserted
    }

    /// Returns `true` if the id was present.
    pub fn remove(&mut self, id: TextureId) -> bool {
        let removed = self.ids.remove(&id);
        tracing::trace!("Cache remove {} (present: {})", id, removed);
        removed
    }

    /// Swap a retired id for the one that absorbed it.
    ///
    /// Returns whether the retired id was present.
    pub fn replace(&mut self, retired: TextureId, survivor: TextureId) -> bool {
        let was_present = self.remove(retired);
        self.insert(survivor);
        was_present
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The cached ids in ascending (creation) order.
    pub fn sorted_ids(&self) -> Vec<TextureId> {
        let mut ids: Vec<_> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
