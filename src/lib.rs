//! # LightCuts
//!
//! LightCuts is a crate providing scalable illumination from many point lights, typically the
//! virtual point lights deposited along light paths to approximate indirect illumination.
//!
//! ## Goals
//!
//! Summing the contribution of every light at every shading point is too expensive when there are
//! thousands to millions of lights. The lights are instead clustered once in a binary
//! [`LightTree`](tree::LightTree), and each shading point only evaluates a small "cut" of that tree:
//! a set of clusters, each approximated by one representative light, refined where the bound on the
//! error of the approximation is large relative to the total illumination.
//!
//! The crate does not trace paths or intersect rays: lights are provided by the caller and the
//! visibility and reflectance queries go through a [`ShadingContext`](cut::ShadingContext).
//!
//! Evaluation can be run in parallel thanks to [rayon](https://github.com/rayon-rs/rayon). Enable
//! the "parallel" feature to access [`ParallelEval`](parallel::ParallelEval).
//!
//! # Using LightCuts
//!
//! ## Implementing the [`Light`] trait
//!
//! #### Deriving:
//!
//! Used in most cases, when the type has fields named `position`, `normal` and `intensity`:
//!
//! ```
//! # use lightcuts::prelude::*;
//! # use lightcuts::Vec3;
//! #
//! #[derive(Light)]
//! struct Vpl {
//!     position: Vec3,
//!     normal: Vec3,
//!     intensity: Vec3,
//! //  ...
//! }
//! ```
//!
//! #### Manual implementation:
//!
//! Used when the type cannot directly provide a [position](Light::position), a
//! [normal](Light::normal) and an [intensity](Light::intensity).
//!
//! ```
//! # use lightcuts::prelude::*;
//! # use lightcuts::Vec3;
//! #
//! struct PathVertex {
//!     position: Vec3,
//!     normal: Vec3,
//!     throughput: Vec3,
//!     albedo: Vec3,
//! //  ...
//! }
//!
//! impl Light for PathVertex {
//!     fn position(&self) -> Vec3 {
//!         self.position
//!     }
//!
//!     fn normal(&self) -> Vec3 {
//!         self.normal
//!     }
//!
//!     fn intensity(&self) -> Vec3 {
//!         self.throughput * self.albedo
//!     }
//! }
//! ```
//!
//! ## Building the tree
//!
//! A [`LightTree`](tree::LightTree) takes ownership of the lights and clusters them:
//!
//! ```
//! # use lightcuts::prelude::*;
//! # use lightcuts::Vec3;
//! #
//! let lights = (0..100).map(|i| {
//!     let position = Vec3::new((i % 10) as f32, (i / 10) as f32, 5.0);
//!     VirtualLight::new(position, Vec3::NEG_Z, Vec3::ONE)
//! });
//!
//! let mut tree = LightTree::new().with_max_cut(64);
//! tree.build(lights, false);
//!
//! assert_eq!(tree.light_count(), 100);
//! assert_eq!(tree.len(), 199);
//! ```
//!
//! ## Evaluating the illumination
//!
//! The shading point is described by a type implementing [`ShadingContext`](cut::ShadingContext).
//! Each evaluation borrows the heap of one slot of a [`ScratchArena`](arena::ScratchArena):
//!
//! ```
//! # use lightcuts::prelude::*;
//! # use lightcuts::Vec3;
//! #
//! struct Floor {
//!     position: Vec3,
//! }
//!
//! impl ShadingContext for Floor {
//!     fn position(&self) -> Vec3 {
//!         self.position
//!     }
//!
//!     fn normal(&self) -> Vec3 {
//!         Vec3::Z
//!     }
//!
//!     fn outgoing(&self) -> Vec3 {
//!         Vec3::Z
//!     }
//!
//!     fn occluded(&self, _from: Vec3, _to: Vec3) -> bool {
//!         false
//!     }
//!
//!     fn reflectance(&self, _position: Vec3, _normal: Vec3, _w_o: Vec3, _w_i: Vec3) -> Vec3 {
//!         Vec3::splat(0.5 / std::f32::consts::PI)
//!     }
//! }
//!
//! let lights = (0..100).map(|i| {
//!     let position = Vec3::new((i % 10) as f32, (i / 10) as f32, 5.0);
//!     (position, Vec3::NEG_Z, Vec3::ONE)
//! });
//! let tree = LightTree::from_lights(lights).with_threshold(0.001);
//! let arena = tree.allocate_memory_arena();
//!
//! let floor = Floor { position: Vec3::new(4.5, 4.5, 0.0) };
//! let approx = tree.eval(&arena, 0, &floor, false);
//! let exact = tree.eval_brute_force(&floor);
//!
//! assert!((approx - exact).abs().max_element() < 0.1 * exact.max_element());
//!
//! LightTree::free_memory_arena(arena);
//! ```
//!
//! Many shading points can be evaluated at once with [`SequentialEval`](sequential::SequentialEval)
//! or, with the "parallel" feature, [`ParallelEval`](parallel::ParallelEval).

#![warn(missing_docs)]

extern crate self as lightcuts;

/// Per-thread pool of the heaps used to evaluate cuts.
pub mod arena;
/// Colour helpers.
pub mod color;
/// Error-bounded evaluation of the illumination at a shading point.
pub mod cut;
/// Binary and Graphviz exports of a light tree.
pub mod dump;
/// Error type of the crate.
pub mod error;
/// Integrator rebuilding the light tree when the scene changes.
pub mod integrator;
/// Trait to implement on types representing point lights.
pub mod light;
/// Evaluation of many shading points using multiple CPU threads.
#[cfg(feature = "parallel")]
pub mod parallel;
/// Timing and progress logging of the light tree preparation.
pub mod progress;
/// Evaluation of many shading points using one CPU thread.
pub mod sequential;
/// Settings of the integrator.
pub mod settings;
/// Light tree and its construction.
pub mod tree;

pub use glam::Vec3;
pub use light::{Light, VirtualLight};
pub use lightcuts_derive::Light;

/// Commonly used types, re-exported.
pub mod prelude {
    pub use crate::{
        arena::ScratchArena,
        cut::{CutStats, ShadingContext},
        integrator::LightCuts,
        light::{Light, VirtualLight},
        settings::Settings,
        tree::LightTree,
    };
    pub use lightcuts_derive::Light;

    pub use crate::sequential::SequentialEval;
    #[cfg(feature = "parallel")]
    pub use {crate::parallel::ParallelEval, rayon::prelude::*};
}
