//! Generational slot storage.
//!
//! Slots are addressed by an [`IndexSlot`] packing a slot index and a generation.
//! Removing a value bumps the slot's generation, so any `IndexSlot` handed out
//! before the removal stops resolving instead of aliasing the next occupant.

use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// A generational index into a [`SparseSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    pub fn new(generation: u32, idx: u32) -> Self {
        // The low half stores idx + 1 so the packed value is never zero.
        let packed = ((generation as u64) << 32) | (idx as u64 + 1);
        Self(NonZeroU64::new(packed).unwrap_or(NonZeroU64::MIN))
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        ((self.0.get() & u32::MAX as u64) as u32).wrapping_sub(1)
    }
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Dense vector of generational slots with a free list.
pub struct SparseSet<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value, reusing a freed slot when one is available.
    pub fn push(&mut self, value: T) -> IndexSlot {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop()
            && let Some(entry) = self.entries.get_mut(idx as usize)
        {
            entry.value = Some(value);
            return IndexSlot::new(entry.generation, idx);
        }

        let idx = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            value: Some(value),
        });
        IndexSlot::new(0, idx)
    }

    fn entry(&self, slot: IndexSlot) -> Option<&Entry<T>> {
        self.entries
            .get(slot.index() as usize)
            .filter(|entry| entry.generation == slot.generation())
    }

    /// Get a value, or `None` if the slot is empty or from an older generation.
    pub fn try_get(&self, slot: IndexSlot) -> Option<&T> {
        self.entry(slot).and_then(|entry| entry.value.as_ref())
    }

    pub fn try_get_mut(&mut self, slot: IndexSlot) -> Option<&mut T> {
        self.entries
            .get_mut(slot.index() as usize)
            .filter(|entry| entry.generation == slot.generation())
            .and_then(|entry| entry.value.as_mut())
    }

    pub fn contains(&self, slot: IndexSlot) -> bool {
        self.try_get(slot).is_some()
    }

    /// Take a value out, invalidating `slot` and every copy of it.
    pub fn remove(&mut self, slot: IndexSlot) -> Option<T> {
        profile_function!();
        let index = slot.index();
        let entry = self
            .entries
            .get_mut(index as usize)
            .filter(|entry| entry.generation == slot.generation())?;
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|entry| entry.value.as_ref())
    }

    /// Iterate live values together with the slot that addresses them.
    pub fn iter_slots(&self) -> impl Iterator<Item = (IndexSlot, &T)> {
        self.entries.iter().enumerate().filter_map(|(idx, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (IndexSlot::new(entry.generation, idx as u32), value))
        })
    }

    /// Slots of every live value, collected so the set can be mutated while walking them.
    pub fn slots(&self) -> Vec<IndexSlot> {
        self.iter_slots().map(|(slot, _)| slot).collect()
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_set_push() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(idx.generation(), 0);
        assert_eq!(idx.index(), 0);
        assert_eq!(set.try_get(idx), Some(&15));
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut set = SparseSet::<u8>::new();
        let _ = set.push(15);
        let stale = IndexSlot::new(1, 0);
        assert_eq!(set.try_get(stale), None);
    }

    #[test]
    fn test_sparse_set_remove_reuses_index() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(set.remove(idx), Some(15));
        let new_idx = set.push(45);
        assert_eq!(idx.index(), new_idx.index());
        assert_ne!(idx.generation(), new_idx.generation());
        assert_eq!(set.remove(idx), None);
    }

    #[test]
    fn test_sparse_set_iter_skips_holes() {
        let mut set = SparseSet::<u8>::new();
        let slots: Vec<_> = (0..100).map(|i| set.push(i)).collect();
        set.remove(slots[0]);
        set.remove(slots[1]);
        let collected: Vec<_> = set.iter().copied().collect();
        assert_eq!(collected.len(), 98);
        assert_eq!(collected[0], 2);
        assert_eq!(set.len(), 98);
    }
}
