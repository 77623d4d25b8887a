use crate::{
    arena::ScratchArena,
    color::heatmap,
    light::VirtualLight,
    tree::{ClusterNode, LightTree, Node, NodeID},
};
use glam::Vec3;
use std::{cmp::Ordering, collections::BinaryHeap};

/// Squared distance under which a shading point is considered inside a cluster.
const INSIDE_DIST_SQR: f32 = 1e-3;

/// Trait to describe the shading point a [`LightTree`] is evaluated at, and the scene around it.
///
/// Implementations are queried concurrently when evaluating in parallel and should not hold any
/// mutable state.
pub trait ShadingContext {
    /// Position of the shading point.
    fn position(&self) -> Vec3;

    /// Surface normal at the shading point.
    fn normal(&self) -> Vec3;

    /// Direction towards the viewer, away from the shading point.
    fn outgoing(&self) -> Vec3;

    /// Returns true if the segment between `from` and `to` is blocked.
    fn occluded(&self, from: Vec3, to: Vec3) -> bool;

    /// Reflectance of the surface at `position` for the outgoing direction `w_o` and the incoming
    /// direction `w_i`.
    fn reflectance(&self, position: Vec3, normal: Vec3, w_o: Vec3, w_i: Vec3) -> Vec3;

    /// Path throughput the evaluated illumination is scaled by.
    #[inline]
    fn throughput(&self) -> Vec3 {
        Vec3::ONE
    }

    /// Returns true if the path escaped the scene, in which case the reflectance is not evaluated.
    #[inline]
    fn escaped(&self) -> bool {
        false
    }
}

impl<C: ShadingContext + ?Sized> ShadingContext for &C {
    #[inline]
    fn position(&self) -> Vec3 {
        (**self).position()
    }

    #[inline]
    fn normal(&self) -> Vec3 {
        (**self).normal()
    }

    #[inline]
    fn outgoing(&self) -> Vec3 {
        (**self).outgoing()
    }

    #[inline]
    fn occluded(&self, from: Vec3, to: Vec3) -> bool {
        (**self).occluded(from, to)
    }

    #[inline]
    fn reflectance(&self, position: Vec3, normal: Vec3, w_o: Vec3, w_i: Vec3) -> Vec3 {
        (**self).reflectance(position, normal, w_o, w_i)
    }

    #[inline]
    fn throughput(&self) -> Vec3 {
        (**self).throughput()
    }

    #[inline]
    fn escaped(&self) -> bool {
        (**self).escaped()
    }
}

/// A cluster of the current cut, ranked by the magnitude of its error bound.
#[derive(Clone, Copy, Debug)]
pub struct LightCluster {
    /// Node of the cluster in the tree.
    pub node: NodeID,
    /// Illumination estimate of the cluster.
    pub estimate: Vec3,
    /// Upper bound of the error of the estimate.
    pub error: Vec3,
    /// Squared length of the error bound.
    pub cost: f32,
}

impl LightCluster {
    /// Creates a new [`LightCluster`].
    #[inline]
    pub fn new(node: NodeID, estimate: Vec3, error: Vec3) -> Self {
        Self {
            node,
            estimate,
            error,
            cost: error.length_squared(),
        }
    }
}

impl Ord for LightCluster {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost.total_cmp(&other.cost)
    }
}

impl PartialOrd for LightCluster {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LightCluster {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LightCluster {}

/// Max-heap of the clusters of a cut, the cluster with the largest error on top.
pub type CutHeap = BinaryHeap<LightCluster>;

/// Reason a cut stopped being refined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The cluster with the largest error is a single light.
    Leaf,
    /// The largest error is below the relative threshold.
    Threshold,
    /// The cut reached its maximum size.
    MaxCut,
}

/// Result of the evaluation of a cut.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutStats {
    /// Number of clusters in the cut.
    pub cut_size: usize,
    /// Reason the refinement stopped.
    pub termination: Termination,
    /// Sum of the estimates of the clusters of the cut, neither averaged over the lights nor scaled
    /// by the throughput.
    pub estimate: Vec3,
}

/// Illumination received from a cluster of total `intensity`, approximated by its representative
/// `light`.
pub fn estimate<C>(light: &VirtualLight, intensity: Vec3, context: &C) -> Vec3
where
    C: ShadingContext + ?Sized,
{
    let position = context.position();
    let normal = context.normal();

    let to_light = light.position - position;
    let r_sqr = to_light.length_squared();
    if r_sqr == 0.0 {
        return Vec3::ZERO;
    }

    let l = to_light / r_sqr.sqrt();
    let cos_theta_vertex = normal.dot(l).max(0.0);
    let cos_theta_light = light.normal.dot(-l).max(0.0);
    let g = cos_theta_vertex * cos_theta_light / r_sqr;

    if g == 0.0 || context.occluded(position, light.position) {
        return Vec3::ZERO;
    }

    let brdf = if context.escaped() {
        Vec3::ONE
    } else {
        context.reflectance(position, normal, context.outgoing(), l)
    };

    intensity * brdf * g
}

/// Estimate of a child cluster sharing the representative light of its parent, derived from the
/// `parent_estimate` by the ratio of their intensities. Components where the parent has no
/// intensity are zero.
#[inline]
pub fn reuse_estimate(parent_estimate: Vec3, parent_intensity: Vec3, intensity: Vec3) -> Vec3 {
    let ratio = |prev: f32, parent: f32, current: f32| {
        if parent > 0.0 {
            prev / parent * current
        } else {
            0.0
        }
    };

    Vec3::new(
        ratio(parent_estimate.x, parent_intensity.x, intensity.x),
        ratio(parent_estimate.y, parent_intensity.y, intensity.y),
        ratio(parent_estimate.z, parent_intensity.z, intensity.z),
    )
}

/// Upper bound of the error of the estimate of a cluster.
///
/// Single lights are exact. The bound is unbounded (`f32::MAX`) when the shading point lies inside
/// the box of the cluster.
pub fn bound_error<C>(cluster: &ClusterNode, context: &C) -> Vec3
where
    C: ShadingContext + ?Sized,
{
    if cluster.is_leaf() {
        return Vec3::ZERO;
    }

    let position = context.position();
    let normal = context.normal();

    let dist_sqr = cluster.aabb.dist_sqr(position);
    if dist_sqr < INSIDE_DIST_SQR {
        return Vec3::splat(f32::MAX);
    }

    let cos_theta_vertex = cluster.aabb.align(position, normal).bound_cos_theta().max(0.0);
    // Any orientation of the lights is assumed.
    let cos_theta_light = 1.0;
    let g = cos_theta_vertex * cos_theta_light / dist_sqr;

    let brdf = if context.escaped() {
        Vec3::ONE
    } else {
        context.reflectance(position, normal, context.outgoing(), normal)
    };

    cluster.intensity * brdf * g
}

impl LightTree {
    /// Returns the maximum size of the cuts of this tree, the maximum cut size clamped to the
    /// number of lights.
    #[inline]
    pub fn cut_cap(&self) -> usize {
        self.max_cut.min(self.light_count())
    }

    /// Evaluates the illumination received by the shading point from all the lights of the tree,
    /// using the heap of the given arena slot.
    ///
    /// The result is the average over the lights, scaled by the throughput of the context. When
    /// `debug` is set, a [`heatmap`] of the size of the cut relative to its maximum is returned
    /// instead.
    ///
    /// # Panics
    ///
    /// Panics if the tree is empty or if the arena slot is already in use.
    pub fn eval<C>(&self, arena: &ScratchArena, slot: usize, context: &C, debug: bool) -> Vec3
    where
        C: ShadingContext + ?Sized,
    {
        let stats = {
            let mut heap = arena.acquire(slot);
            self.eval_with_stats(&mut heap, context)
        };

        if debug {
            return heatmap(stats.cut_size as f32 / self.cut_cap() as f32);
        }

        context.throughput() * stats.estimate / self.light_count() as f32
    }

    /// Refines a cut of the tree for the shading point, starting from the root, until the largest
    /// error bound is below the threshold relative to the total estimate, the cluster with the
    /// largest error is a single light, or the cut reaches its maximum size.
    ///
    /// The heap is cleared before use and holds every cluster of the final cut on return, so its
    /// length is the reported cut size.
    ///
    /// # Panics
    ///
    /// Panics if the tree is empty.
    pub fn eval_with_stats<C>(&self, heap: &mut CutHeap, context: &C) -> CutStats
    where
        C: ShadingContext + ?Sized,
    {
        assert!(!self.is_empty(), "cannot evaluate an empty light tree");

        let root = (self.nodes.len() - 1) as NodeID;
        let cap = self.cut_cap();

        heap.clear();
        let mut total = self.push_cluster(heap, context, root, None);

        let termination = loop {
            if heap.len() >= cap {
                break Termination::MaxCut;
            }

            let Some(cluster) = heap.pop() else {
                unreachable!("a cut always holds at least one cluster");
            };

            let Node::Internal([left, right]) = self.node(cluster.node).children else {
                heap.push(cluster);
                break Termination::Leaf;
            };

            if cluster.error.cmple(total * self.threshold).all() {
                heap.push(cluster);
                break Termination::Threshold;
            }

            let parent = Some((cluster.node, cluster.estimate));

            total -= cluster.estimate;
            total += self.push_cluster(heap, context, left, parent);
            total += self.push_cluster(heap, context, right, parent);
        };

        CutStats {
            cut_size: heap.len(),
            termination,
            estimate: total,
        }
    }

    #[inline]
    fn push_cluster<C>(
        &self,
        heap: &mut CutHeap,
        context: &C,
        id: NodeID,
        parent: Option<(NodeID, Vec3)>,
    ) -> Vec3
    where
        C: ShadingContext + ?Sized,
    {
        let node = self.node(id);

        let estimate = match parent {
            Some((parent, parent_estimate)) if self.node(parent).light == node.light => {
                reuse_estimate(parent_estimate, self.node(parent).intensity, node.intensity)
            }
            _ => estimate(self.representative(id), node.intensity, context),
        };

        heap.push(LightCluster::new(id, estimate, bound_error(node, context)));

        estimate
    }

    /// Evaluates the illumination received by the shading point by summing the contribution of
    /// every light, without clustering. Comparable to the result of [`LightTree::eval`].
    ///
    /// Returns zero for an empty tree.
    pub fn eval_brute_force<C>(&self, context: &C) -> Vec3
    where
        C: ShadingContext + ?Sized,
    {
        if self.lights.is_empty() {
            return Vec3::ZERO;
        }

        let total = self
            .lights
            .iter()
            .map(|light| estimate(light, light.intensity, context))
            .fold(Vec3::ZERO, |acc, estimate| acc + estimate);

        context.throughput() * total / self.light_count() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{random_lights, Diffuse};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn assert_close(a: Vec3, b: Vec3, relative: f32) {
        let tolerance = relative * a.abs().max(b.abs()) + Vec3::splat(1e-9);
        assert!((a - b).abs().cmple(tolerance).all(), "{a} != {b}");
    }

    fn leaf_sum(tree: &LightTree, id: NodeID, context: &Diffuse) -> Vec3 {
        match tree.node(id).children {
            Node::Internal([left, right]) => {
                leaf_sum(tree, left, context) + leaf_sum(tree, right, context)
            }
            Node::External => {
                let light = tree.representative(id);
                estimate(light, light.intensity, context)
            }
        }
    }

    #[test]
    fn single_light_is_exact() {
        let light = VirtualLight::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z, Vec3::ONE);
        let tree = LightTree::from_lights([light]);
        let context = Diffuse::new(Vec3::ZERO, Vec3::Z);

        let stats = tree.eval_with_stats(&mut CutHeap::new(), &context);

        assert_eq!(stats.cut_size, 1);
        assert_eq!(stats.estimate, estimate(&light, light.intensity, &context));

        let arena = tree.allocate_memory_arena_with(1);
        assert_eq!(tree.eval(&arena, 0, &context, false), stats.estimate);
    }

    #[test]
    fn unit_square_matches_brute_force() {
        let lights = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
            .map(|(x, y)| (Vec3::new(x, y, 1.0), -Vec3::Z, Vec3::ONE));
        let context = Diffuse::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z);

        for max_cut in [3, 4, 1000] {
            let tree = LightTree::from_lights(lights).with_max_cut(max_cut);
            let arena = tree.allocate_memory_arena_with(1);

            let exact = tree.eval_brute_force(&context);
            assert!(exact.x > 0.0);
            assert_close(tree.eval(&arena, 0, &context, false), exact, 0.01);
        }
    }

    #[test]
    fn co_located_lights_match_brute_force() {
        let lights = (0..16).map(|_| (Vec3::new(0.0, 0.0, 3.0), -Vec3::Z, Vec3::new(1.0, 0.5, 0.25)));
        let tree = LightTree::from_lights(lights).with_max_cut(16);
        let arena = tree.allocate_memory_arena_with(1);

        for position in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(-2.0, 1.0, 0.0), Vec3::ZERO] {
            let context = Diffuse::new(position, Vec3::Z);
            assert_close(
                tree.eval(&arena, 0, &context, false),
                tree.eval_brute_force(&context),
                1e-5,
            );
        }
    }

    #[test]
    fn threshold_bounds_cut_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let lights = random_lights(&mut rng, 300);

        let mut tree = LightTree::new().with_threshold(0.02);
        tree.build_with(lights, false, &mut rng);

        let count = tree.light_count() as f32;
        let mut heap = CutHeap::new();
        let mut refined = 0;

        for _ in 0..50 {
            let position = Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), 0.0);
            let context = Diffuse::new(position, Vec3::Z);

            let stats = tree.eval_with_stats(&mut heap, &context);
            assert_eq!(stats.cut_size, heap.len());
            if stats.termination != Termination::Threshold {
                continue;
            }
            refined += 1;

            let limit = stats.estimate * tree.threshold();
            let mut error_sum = Vec3::ZERO;
            for cluster in heap.iter() {
                assert!(
                    cluster.error.cmple(limit).all(),
                    "cluster {} error {} above {limit}",
                    cluster.node,
                    cluster.error
                );
                error_sum += cluster.error;
            }

            let approx = stats.estimate / count;
            let exact = tree.eval_brute_force(&context);
            let bound = error_sum * 1.0001 / count + 1e-4 * exact;

            assert!(
                (approx - exact).abs().cmple(bound).all(),
                "{approx} too far from {exact}, bound {bound}"
            );
        }

        assert!(refined > 0);
    }

    #[test]
    fn cut_partitions_lights() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut tree = LightTree::new().with_max_cut(40);
        tree.build_with(random_lights(&mut rng, 120), false, &mut rng);

        let mut heap = CutHeap::new();
        for position in [Vec3::ZERO, Vec3::new(3.0, -2.0, 0.0)] {
            let stats = tree.eval_with_stats(&mut heap, &Diffuse::new(position, Vec3::Z));

            let intensity = heap
                .iter()
                .fold(Vec3::ZERO, |acc, cluster| acc + tree.node(cluster.node).intensity);
            let estimate = heap
                .iter()
                .fold(Vec3::ZERO, |acc, cluster| acc + cluster.estimate);

            assert_eq!(stats.cut_size, heap.len());
            assert_close(intensity, tree.node(tree.root().unwrap()).intensity, 1e-4);
            assert_close(estimate, stats.estimate, 1e-4);
        }
    }

    #[test]
    #[should_panic(expected = "finite and non-negative")]
    fn negative_threshold_panics() {
        let _ = LightTree::new().with_threshold(-0.01);
    }

    #[test]
    #[should_panic(expected = "finite and non-negative")]
    fn nan_threshold_panics() {
        let _ = LightTree::new().with_threshold(f32::NAN);
    }

    #[test]
    fn error_bounds_cluster_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tree = LightTree::from_lights(random_lights(&mut rng, 64));

        for _ in 0..10 {
            let position = Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), 0.0);
            let context = Diffuse::new(position, Vec3::Z);

            for (id, node) in tree.nodes().iter().enumerate() {
                let id = id as NodeID;
                let approx = estimate(tree.representative(id), node.intensity, &context);
                let exact = leaf_sum(&tree, id, &context);
                let error = bound_error(node, &context);

                assert!(
                    (approx - exact).abs().cmple(error * 1.0001 + 1e-6).all(),
                    "node {id}: |{approx} - {exact}| > {error}"
                );
            }
        }
    }

    #[test]
    fn inside_cluster_has_unbounded_error() {
        let tree = LightTree::from_lights([
            (Vec3::new(-1.0, -1.0, -1.0), Vec3::Z, Vec3::ONE),
            (Vec3::new(1.0, 1.0, 1.0), Vec3::Z, Vec3::ONE),
        ]);
        let context = Diffuse::new(Vec3::ZERO, Vec3::Z);

        let root = tree.node(tree.root().unwrap());
        assert_eq!(bound_error(root, &context), Vec3::splat(f32::MAX));
        assert_eq!(bound_error(tree.node(0), &context), Vec3::ZERO);
    }

    #[test]
    fn reuse_scales_by_intensity() {
        let reused = reuse_estimate(
            Vec3::new(2.0, 4.0, 1.0),
            Vec3::new(4.0, 8.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
        );

        assert_eq!(reused, Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn occluded_lights_contribute_nothing() {
        let lights = [
            (Vec3::new(-2.0, 0.0, 1.0), -Vec3::Z, Vec3::ONE),
            (Vec3::new(2.0, 0.0, 1.0), -Vec3::Z, Vec3::ONE),
        ];
        let tree = LightTree::from_lights(lights).with_max_cut(2);
        let arena = tree.allocate_memory_arena_with(1);

        let open = Diffuse::new(Vec3::ZERO, Vec3::Z);
        let walled = open.with_wall(1.0);

        let exact = tree.eval_brute_force(&walled);
        assert!(exact.x > 0.0);
        assert_close(exact * 2.0, tree.eval_brute_force(&open), 1e-5);
        assert_close(tree.eval(&arena, 0, &walled, false), exact, 1e-5);
    }

    #[test]
    fn escaped_paths_ignore_reflectance() {
        struct Escaped;

        impl ShadingContext for Escaped {
            fn position(&self) -> Vec3 {
                Vec3::ZERO
            }

            fn normal(&self) -> Vec3 {
                Vec3::Z
            }

            fn outgoing(&self) -> Vec3 {
                Vec3::Z
            }

            fn occluded(&self, _: Vec3, _: Vec3) -> bool {
                false
            }

            fn reflectance(&self, _: Vec3, _: Vec3, _: Vec3, _: Vec3) -> Vec3 {
                Vec3::ZERO
            }

            fn throughput(&self) -> Vec3 {
                Vec3::splat(0.5)
            }

            fn escaped(&self) -> bool {
                true
            }
        }

        let light = VirtualLight::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z, Vec3::ONE);
        assert_eq!(estimate(&light, Vec3::ONE, &Escaped), Vec3::splat(0.25));

        let tree = LightTree::from_lights([light]);
        assert_eq!(tree.eval_brute_force(&Escaped), Vec3::splat(0.125));
    }

    #[test]
    fn debug_returns_cut_size_heatmap() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tree = LightTree::from_lights(random_lights(&mut rng, 100)).with_max_cut(20);
        let arena = tree.allocate_memory_arena_with(1);
        let context = Diffuse::new(Vec3::new(1.0, -1.0, 0.0), Vec3::Z);

        let stats = tree.eval_with_stats(&mut CutHeap::new(), &context);
        let color = tree.eval(&arena, 0, &context, true);

        assert!(stats.cut_size <= 20);
        assert_eq!(color, heatmap(stats.cut_size as f32 / 20.0));
    }
}
