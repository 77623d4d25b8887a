use crate::{cut::CutHeap, tree::LightTree};
use std::{
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, TryLockError},
};

/// Pool of reusable [`CutHeap`]s, one per worker slot, so that evaluating a cut does not allocate.
///
/// Each worker is expected to use its own slot. Acquiring a slot that is already in use is a
/// caller error and panics.
#[derive(Debug, Default)]
pub struct ScratchArena {
    heaps: Vec<Mutex<CutHeap>>,
}

impl ScratchArena {
    /// Creates a new [`ScratchArena`] with the given number of slots, each holding a heap with the
    /// given capacity.
    pub fn new(slots: usize, capacity: usize) -> Self {
        Self {
            heaps: (0..slots)
                .map(|_| Mutex::new(CutHeap::with_capacity(capacity)))
                .collect(),
        }
    }

    /// Returns the number of worker slots in the arena.
    #[inline]
    pub fn slots(&self) -> usize {
        self.heaps.len()
    }

    /// Returns the heap of the given slot. The heap is cleared and handed back to the arena once
    /// the returned guard is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the slot does not exist or is already acquired.
    pub fn acquire(&self, slot: usize) -> ScratchGuard<'_> {
        let heap = match self.heaps[slot].try_lock() {
            Ok(heap) => heap,
            // The previous holder unwound, its guard still cleared the heap.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => panic!("scratch arena slot {slot} is already in use"),
        };

        ScratchGuard(heap)
    }
}

/// Scoped access to the [`CutHeap`] of a [`ScratchArena`] slot.
#[derive(Debug)]
pub struct ScratchGuard<'a>(MutexGuard<'a, CutHeap>);

impl Deref for ScratchGuard<'_> {
    type Target = CutHeap;

    #[inline]
    fn deref(&self) -> &CutHeap {
        &self.0
    }
}

impl DerefMut for ScratchGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut CutHeap {
        &mut self.0
    }
}

impl Drop for ScratchGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// Returns the number of slots an arena needs to serve every worker thread.
pub fn default_slots() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }

    #[cfg(not(feature = "parallel"))]
    {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

impl LightTree {
    /// Allocates a [`ScratchArena`] with one slot per worker thread, sized for the cuts of this
    /// tree.
    ///
    /// The arena should be freed and allocated again when the tree is rebuilt.
    #[inline]
    pub fn allocate_memory_arena(&self) -> ScratchArena {
        self.allocate_memory_arena_with(default_slots())
    }

    /// Allocates a [`ScratchArena`] with the given number of slots, sized for the cuts of this
    /// tree.
    #[inline]
    pub fn allocate_memory_arena_with(&self, slots: usize) -> ScratchArena {
        ScratchArena::new(slots, self.max_cut.min(self.light_count()))
    }

    /// Frees the given [`ScratchArena`].
    #[inline]
    pub fn free_memory_arena(arena: ScratchArena) {
        drop(arena);
    }
}
