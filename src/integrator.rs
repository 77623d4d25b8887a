use crate::{
    arena::ScratchArena,
    cut::ShadingContext,
    error::Result,
    light::Light,
    progress::Timed,
    settings::Settings,
    tree::LightTree,
};
use glam::Vec3;

/// File name of the binary dump written after a build.
pub const TREE_BIN: &str = "lighttree.bin";

/// File name of the Graphviz dump written after a build.
pub const TREE_DOT: &str = "lighttree.dot";

/// Combines a value into a running hash.
#[inline]
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Returns a hash identifying a scene from the hashes of its parts, in order.
///
/// # Example
///
/// ```
/// # use lightcuts::integrator::scene_hash;
/// assert_eq!(scene_hash([1, 2]), scene_hash([1, 2]));
/// assert_ne!(scene_hash([1, 2]), scene_hash([2, 1]));
/// ```
#[inline]
pub fn scene_hash<I: IntoIterator<Item = u64>>(values: I) -> u64 {
    values.into_iter().fold(0, hash_combine)
}

/// Renderer-facing integrator owning a [`LightTree`] and its [`ScratchArena`], rebuilt only when
/// the scene changes.
#[derive(Debug)]
pub struct LightCuts {
    settings: Settings,
    tree: LightTree,
    arena: Option<ScratchArena>,
    scene_hash: Option<u64>,
}

impl LightCuts {
    /// Creates a new [`LightCuts`] integrator with no light tree.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let tree = LightTree::new()
            .with_max_cut(settings.max_cut)
            .with_threshold(settings.threshold);

        Ok(Self {
            settings,
            tree,
            arena: None,
            scene_hash: None,
        })
    }

    /// Returns the settings of the integrator.
    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the current light tree.
    #[inline]
    pub fn tree(&self) -> &LightTree {
        &self.tree
    }

    /// Returns the scratch arena of the current light tree, if one was allocated.
    #[inline]
    pub fn arena(&self) -> Option<&ScratchArena> {
        self.arena.as_ref()
    }

    /// Prepares the integrator for the scene identified by `scene_hash`.
    ///
    /// The light tree is kept if it was built for the same scene and is not empty. Otherwise the
    /// lights returned by `trace_lights` are clustered into a new tree, the dumps enabled in the
    /// settings are written and a new arena is allocated. Returns true if the tree was rebuilt.
    pub fn prepare<F, I>(&mut self, scene_hash: u64, trace_lights: F) -> Result<bool>
    where
        F: FnOnce() -> I,
        I: IntoIterator,
        I::Item: Light,
    {
        if self.scene_hash == Some(scene_hash) && self.arena.is_some() {
            log::debug!("LightCuts: reusing light tree for scene {scene_hash:#x}");
            return Ok(false);
        }

        // Only a fully prepared scene may be reused.
        self.scene_hash = None;
        if let Some(arena) = self.arena.take() {
            LightTree::free_memory_arena(arena);
        }

        {
            let mut timed = Timed::info("tracing and clustering virtual lights");
            self.tree.build(trace_lights(), self.settings.print_progress);
            timed.set_lights(self.tree.light_count());
        }

        if self.tree.is_empty() {
            log::warn!("LightCuts: no virtual lights, the scene will be black");
            return Ok(true);
        }

        if self.settings.print_tree_bin {
            self.tree.print_binary(self.settings.dump_dir.join(TREE_BIN))?;
        }

        if self.settings.print_tree_dot {
            self.tree.print_dot(self.settings.dump_dir.join(TREE_DOT))?;
        }

        self.arena = Some(self.tree.allocate_memory_arena());
        self.scene_hash = Some(scene_hash);

        Ok(true)
    }

    /// Evaluates the illumination of one shading sample using the given arena slot, or a heatmap
    /// of the cut size if enabled in the settings. Returns zero if there is no light.
    ///
    /// # Panics
    ///
    /// Panics if the arena slot is already in use.
    pub fn shade<C>(&self, slot: usize, context: &C) -> Vec3
    where
        C: ShadingContext + ?Sized,
    {
        match &self.arena {
            Some(arena) if !self.tree.is_empty() => {
                self.tree
                    .eval(arena, slot, context, self.settings.debug_cut_size)
            }
            _ => Vec3::ZERO,
        }
    }
}
