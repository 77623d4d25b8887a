use super::{
    kdtree::{KdTree, Nearest, SlotID},
    ClusterNode, LightTree, NodeID,
};
use crate::{
    color::luma,
    light::{Light, VirtualLight},
    progress::{Progress, Timed},
};
use rand::Rng;
use std::{cmp::Ordering, collections::BinaryHeap};

/// A k-d tree slot as observed when a [`Candidate`] was created.
#[derive(Clone, Copy, Debug)]
struct Snapshot {
    slot: SlotID,
    generation: u32,
}

impl Snapshot {
    #[inline]
    fn new(kd_tree: &KdTree, slot: SlotID) -> Self {
        Self {
            slot,
            generation: kd_tree.generation(slot),
        }
    }

    /// Returns the cluster in the slot, or `None` if the slot was deleted or reassigned since the
    /// snapshot was taken.
    #[inline]
    fn current(&self, kd_tree: &KdTree) -> Option<NodeID> {
        if kd_tree.is_deleted(self.slot) || kd_tree.generation(self.slot) != self.generation {
            return None;
        }
        kd_tree.cluster(self.slot)
    }
}

/// A proposed merge between two k-d tree slots.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    pair: [Snapshot; 2],
    cost: f32,
}

impl Candidate {
    #[inline]
    fn new(kd_tree: &KdTree, query: SlotID, nearest: Nearest) -> Self {
        Self {
            pair: [
                Snapshot::new(kd_tree, query),
                Snapshot::new(kd_tree, nearest.slot),
            ],
            cost: nearest.cost,
        }
    }
}

// Reversed so that `BinaryHeap` pops the cheapest candidate first.
impl Ord for Candidate {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

impl PartialOrd for Candidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

#[inline]
fn push_nearest(
    kd_tree: &KdTree,
    nodes: &[ClusterNode],
    queue: &mut BinaryHeap<Candidate>,
    query: SlotID,
) {
    if let Some(nearest) = kd_tree.find_nearest(nodes, query) {
        queue.push(Candidate::new(kd_tree, query, nearest));
    }
}

impl LightTree {
    /// Builds the tree from the given lights, replacing any previous tree. Takes ownership of the
    /// lights.
    ///
    /// The order of the children of each cluster is randomised, see [`LightTree::build_with`].
    #[inline]
    pub fn build<I>(&mut self, lights: I, print_progress: bool)
    where
        I: IntoIterator,
        I::Item: Light,
    {
        self.build_with(lights, print_progress, &mut rand::thread_rng());
    }

    /// Builds the tree from the given lights, replacing any previous tree, by greedily merging the
    /// pair of clusters with the lowest merge cost until a single cluster is left.
    ///
    /// When two clusters are merged, the first one is chosen as the left child with a probability
    /// proportional to its luminance, using the given random number generator. The left child
    /// gives its representative light to the merged cluster.
    ///
    /// # Panics
    ///
    /// Panics if the built tree does not contain exactly `2 * L - 1` nodes for `L` lights.
    pub fn build_with<I, R>(&mut self, lights: I, print_progress: bool, rng: &mut R)
    where
        I: IntoIterator,
        I::Item: Light,
        R: Rng + ?Sized,
    {
        let lights = lights
            .into_iter()
            .map(|light| VirtualLight::from_light(&light))
            .collect::<Vec<_>>();

        self.lights.clear();
        self.nodes.clear();

        if lights.is_empty() {
            return;
        }

        let light_count = lights.len();
        let _timed = Timed::debug("light tree build").with_lights(light_count);

        let node_count = 2 * light_count - 1;

        let mut nodes = Vec::with_capacity(node_count);
        nodes.extend(
            lights
                .iter()
                .enumerate()
                .map(|(i, light)| ClusterNode::leaf(i as u32, light)),
        );

        let mut kd_tree = KdTree::new(&nodes);
        let mut queue = BinaryHeap::with_capacity(light_count);

        let mut progress = Progress::new("LightCuts: clustering lights", node_count, print_progress);

        for slot in 0..kd_tree.len() as SlotID {
            push_nearest(&kd_tree, &nodes, &mut queue, slot);
            progress.advance();
        }

        while let Some(candidate) = queue.pop() {
            let [first, second] = candidate.pair;

            let (c1, c2) = match (first.current(&kd_tree), second.current(&kd_tree)) {
                (Some(c1), Some(c2)) => (c1, c2),
                (c1, c2) => {
                    if c1.is_some() {
                        push_nearest(&kd_tree, &nodes, &mut queue, first.slot);
                    }
                    if c2.is_some() {
                        push_nearest(&kd_tree, &nodes, &mut queue, second.slot);
                    }
                    continue;
                }
            };

            let i1 = luma(nodes[c1 as usize].intensity);
            let i2 = luma(nodes[c2 as usize].intensity);
            let p = if i1 + i2 > 0.0 { i1 / (i1 + i2) } else { 0.5 };

            let (left, right) = if rng.gen::<f32>() < p {
                (c1, c2)
            } else {
                (c2, c1)
            };

            let id = nodes.len() as NodeID;
            let merged = ClusterNode::merge(&nodes[left as usize], &nodes[right as usize], left, right);
            nodes.push(merged);

            // Keep the shallower slot so that queries stay short.
            let (remain, delete) = if kd_tree.depth(first.slot) > kd_tree.depth(second.slot) {
                (second.slot, first.slot)
            } else {
                (first.slot, second.slot)
            };

            kd_tree.delete_node(delete);
            kd_tree.update_node(remain, id);

            push_nearest(&kd_tree, &nodes, &mut queue, remain);

            progress.advance();
        }

        progress.finish();

        assert_eq!(nodes.len(), node_count, "invalid light tree node count");

        log::debug!(
            "LightCuts: built light tree with {} lights and {} nodes",
            light_count,
            node_count
        );

        self.lights = lights;
        self.nodes = nodes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{init_logger, random_lights};
    use crate::tree::Node;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn built(count: usize, seed: u64) -> LightTree {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let lights = random_lights(&mut rng, count);

        let mut tree = LightTree::new();
        tree.build_with(lights, true, &mut rng);
        tree
    }

    fn assert_merge_invariant(tree: &LightTree) {
        for node in tree.nodes() {
            if let Node::Internal([left, right]) = node.children {
                let (left, right) = (tree.node(left), tree.node(right));

                assert_eq!(node.intensity, left.intensity + right.intensity);
                assert_eq!(node.aabb, left.aabb.merge(&right.aabb));
                assert_eq!(node.light, left.light);
            }
        }
    }

    fn leaves_from_root(tree: &LightTree) -> (Vec<u32>, usize) {
        let mut leaves = Vec::new();
        let mut visited = 0;
        let mut stack = Vec::from_iter(tree.root());

        while let Some(id) = stack.pop() {
            visited += 1;
            let node = tree.node(id);
            match node.children {
                Node::Internal(children) => stack.extend(children),
                Node::External => leaves.push(node.light),
            }
        }

        leaves.sort_unstable();
        (leaves, visited)
    }

    #[test]
    fn empty_build() {
        let mut tree = LightTree::new();
        tree.build(Vec::<VirtualLight>::new(), false);

        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.light_count(), 0);
    }

    #[test]
    fn single_light() {
        let tree = built(1, 0);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), Some(0));
        assert!(tree.node(0).is_leaf());
    }

    #[test]
    fn node_count_and_leaf_preservation() {
        init_logger();

        for (count, seed) in [(0, 0), (1, 1), (2, 2), (100, 3), (10000, 4)] {
            let tree = built(count, seed);

            assert_eq!(tree.len(), (2 * count).saturating_sub(1));
            assert_eq!(tree.light_count(), count);

            let (leaves, visited) = leaves_from_root(&tree);
            assert_eq!(visited, tree.len());
            assert_eq!(leaves, (0..count as u32).collect::<Vec<_>>());

            assert_merge_invariant(&tree);

            // Leaves come first, in the order of the lights.
            for (i, node) in tree.nodes()[..count].iter().enumerate() {
                assert!(node.is_leaf());
                assert_eq!(node.light, i as u32);
                assert_eq!(node.intensity, tree.lights()[i].intensity);
            }
        }
    }

    #[test]
    fn rebuild_replaces_tree() {
        let mut tree = built(50, 5);
        tree.build(random_lights(&mut ChaCha8Rng::seed_from_u64(6), 10), false);

        assert_eq!(tree.len(), 19);
        assert_eq!(tree.light_count(), 10);

        tree.build(Vec::<VirtualLight>::new(), false);
        assert!(tree.is_empty());
    }

    #[test]
    fn nearby_lights_merge_first() {
        let lights = [
            (Vec3::new(0.0, 0.0, 0.0), Vec3::Z, Vec3::ONE),
            (Vec3::new(100.0, 0.0, 0.0), Vec3::Z, Vec3::ONE),
            (Vec3::new(0.1, 0.0, 0.0), Vec3::Z, Vec3::ONE),
            (Vec3::new(100.1, 0.0, 0.0), Vec3::Z, Vec3::ONE),
        ];
        let mut tree = LightTree::new();
        tree.build_with(lights, false, &mut ChaCha8Rng::seed_from_u64(0));

        let root = tree.node(tree.root().unwrap());
        let Node::Internal(children) = root.children else {
            panic!("root is a leaf");
        };

        for child in children {
            let mut pair = match tree.node(child).children {
                Node::Internal(pair) => pair.map(|id| tree.node(id).light),
                Node::External => panic!("unbalanced tree"),
            };
            pair.sort_unstable();
            assert!(pair == [0, 2] || pair == [1, 3]);
        }
    }

    #[test]
    fn child_order_follows_luminance() {
        let lights = [
            (Vec3::ZERO, Vec3::Z, Vec3::splat(3.0)),
            (Vec3::X, Vec3::Z, Vec3::splat(1.0)),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let mut tree = LightTree::new();

        let runs = 4000;
        let mut brighter_left = 0;
        for _ in 0..runs {
            tree.build_with(lights, false, &mut rng);

            let root = tree.node(tree.root().unwrap());
            assert_eq!(root.intensity, Vec3::splat(4.0));
            if let Node::Internal([left, _]) = root.children {
                brighter_left += usize::from(tree.node(left).light == 0);
            }
        }

        let ratio = brighter_left as f32 / runs as f32;
        assert!((ratio - 0.75).abs() < 0.05, "ratio was {ratio}");
    }

    #[test]
    fn dark_lights_still_merge() {
        let lights = (0..10).map(|i| (Vec3::splat(i as f32), Vec3::Z, Vec3::ZERO));
        let tree = LightTree::from_lights(lights);

        assert_eq!(tree.len(), 19);
        assert_eq!(tree.node(tree.root().unwrap()).intensity, Vec3::ZERO);
    }

    #[test]
    fn co_located_lights() {
        let lights = (0..33).map(|_| (Vec3::ONE, Vec3::Z, Vec3::ONE));
        let tree = LightTree::from_lights(lights);

        assert_eq!(tree.len(), 65);
        assert_merge_invariant(&tree);
    }
}
