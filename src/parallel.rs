use crate::{arena::ScratchArena, cut::ShadingContext, tree::LightTree};
use glam::Vec3;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// Trait to evaluate a [`LightTree`] at many shading points in parallel with
/// [rayon](https://github.com/rayon-rs/rayon).
pub trait ParallelEval {
    /// Returns the illumination at each shading point. Each worker thread uses the arena slot
    /// matching its index in the current thread pool.
    ///
    /// Refer to [`LightTree::eval`] for more information.
    ///
    /// # Panics
    ///
    /// Panics if the arena has fewer slots than the current thread pool has threads, see
    /// [`LightTree::allocate_memory_arena`].
    fn par_eval(&self, tree: &LightTree, arena: &ScratchArena, debug: bool) -> Vec<Vec3>;
}

impl<C: ShadingContext + Sync> ParallelEval for [C] {
    #[inline]
    fn par_eval(&self, tree: &LightTree, arena: &ScratchArena, debug: bool) -> Vec<Vec3> {
        assert!(
            arena.slots() >= rayon::current_num_threads(),
            "the scratch arena has fewer slots than worker threads"
        );

        self.par_iter()
            .map(|context| {
                let slot = rayon::current_thread_index().unwrap_or(0);
                tree.eval(arena, slot, context, debug)
            })
            .collect()
    }
}
