use crate::{arena::ScratchArena, cut::ShadingContext, tree::LightTree};
use glam::Vec3;

/// Trait to evaluate a [`LightTree`] at many shading points on the current thread.
pub trait SequentialEval {
    /// Returns the illumination at each shading point, evaluated in order with the first slot of
    /// the arena.
    ///
    /// Refer to [`LightTree::eval`] for more information.
    fn eval_all(&self, tree: &LightTree, arena: &ScratchArena, debug: bool) -> Vec<Vec3>;
}

impl<C: ShadingContext> SequentialEval for [C] {
    #[inline]
    fn eval_all(&self, tree: &LightTree, arena: &ScratchArena, debug: bool) -> Vec<Vec3> {
        self.iter()
            .map(|context| tree.eval(arena, 0, context, debug))
            .collect()
    }
}
