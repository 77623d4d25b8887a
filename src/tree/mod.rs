/// Axis-aligned bounding box and tangent-frame bounds.
pub mod aabb;
/// Greedy agglomerative construction of the light tree.
pub mod build;
/// Mutable k-d tree used to find merge candidates.
pub mod kdtree;

use crate::light::{Light, VirtualLight};
use glam::Vec3;

pub use aabb::BoundingBox;
pub use kdtree::{KdTree, SlotID};

/// Index of a [`ClusterNode`] in a [`LightTree`].
pub type NodeID = u32;

/// Default maximum number of clusters in a cut.
pub const MAX_CUT: usize = 1000;

/// Default relative error under which a cluster is not refined.
pub const THRESHOLD: f32 = 0.02;

/// Node that can either be internal and containing data or external and containing no data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node<N> {
    /// Node with child nodes.
    Internal(N),
    /// Node without children.
    External,
}

/// A cluster of lights: either a single light or the merge of two clusters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterNode {
    /// Index of the representative light, inherited from the left child.
    pub light: u32,
    /// Sum of the intensities of the lights in the cluster.
    pub intensity: Vec3,
    /// Box enclosing the positions of the lights in the cluster.
    pub aabb: BoundingBox,
    /// Left and right children of the cluster.
    pub children: Node<[NodeID; 2]>,
}

impl ClusterNode {
    /// Creates a cluster containing the single given light.
    #[inline]
    pub fn leaf(index: u32, light: &VirtualLight) -> Self {
        Self {
            light: index,
            intensity: light.intensity,
            aabb: BoundingBox::point(light.position),
            children: Node::External,
        }
    }

    /// Creates the cluster resulting from the merge of `left` and `right`, respectively stored at
    /// `left_id` and `right_id`.
    #[inline]
    pub fn merge(left: &Self, right: &Self, left_id: NodeID, right_id: NodeID) -> Self {
        Self {
            light: left.light,
            intensity: left.intensity + right.intensity,
            aabb: left.aabb.merge(&right.aabb),
            children: Node::Internal([left_id, right_id]),
        }
    }

    /// Returns true if the cluster holds a single light.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children == Node::External
    }
}

/// Binary tree clustering a set of lights, used to evaluate their illumination with
/// [lightcuts](crate).
///
/// The lights are owned by the tree. All the nodes of a build are stored contiguously, the leaves
/// first, in the same order as the lights, and the root last.
#[derive(Clone, Debug)]
pub struct LightTree {
    pub(crate) lights: Vec<VirtualLight>,
    pub(crate) nodes: Vec<ClusterNode>,
    pub(crate) max_cut: usize,
    pub(crate) threshold: f32,
}

impl Default for LightTree {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LightTree {
    /// Creates a new empty [`LightTree`] using the default [`MAX_CUT`] and [`THRESHOLD`].
    #[inline]
    pub const fn new() -> Self {
        Self {
            lights: Vec::new(),
            nodes: Vec::new(),
            max_cut: MAX_CUT,
            threshold: THRESHOLD,
        }
    }

    /// Sets the maximum number of clusters in a cut.
    #[inline]
    pub fn with_max_cut(mut self, max_cut: usize) -> Self {
        assert!(max_cut > 0, "the maximum cut size must be positive");
        self.max_cut = max_cut;
        self
    }

    /// Sets the relative error under which a cluster is not refined.
    ///
    /// # Panics
    ///
    /// Panics if the threshold is negative or not finite.
    #[inline]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        assert!(
            threshold.is_finite() && threshold >= 0.0,
            "the error threshold must be finite and non-negative"
        );
        self.threshold = threshold;
        self
    }

    /// Returns the maximum number of clusters in a cut.
    #[inline]
    pub const fn max_cut(&self) -> usize {
        self.max_cut
    }

    /// Returns the relative error under which a cluster is not refined.
    #[inline]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns true if no tree has been built or if it was built from no lights.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of nodes in the tree, `2 * L - 1` for `L` lights.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of lights in the tree.
    #[inline]
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Returns a reference to the lights owned by the tree.
    #[inline]
    pub fn lights(&self) -> &[VirtualLight] {
        &self.lights
    }

    /// Returns a reference to the nodes of the tree.
    #[inline]
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    /// Returns a reference to the node with the given id.
    #[inline]
    pub fn node(&self, id: NodeID) -> &ClusterNode {
        &self.nodes[id as usize]
    }

    /// Returns the root of the tree, the last node built.
    #[inline]
    pub fn root(&self) -> Option<NodeID> {
        self.nodes.len().checked_sub(1).map(|id| id as NodeID)
    }

    /// Returns the light represented by the given node.
    #[inline]
    pub fn representative(&self, id: NodeID) -> &VirtualLight {
        &self.lights[self.node(id).light as usize]
    }

    /// Creates a new [`LightTree`] built from the given lights.
    ///
    /// See [`LightTree::build`].
    #[inline]
    pub fn from_lights<I>(lights: I) -> Self
    where
        I: IntoIterator,
        I::Item: Light,
    {
        let mut tree = Self::new();
        tree.build(lights, false);
        tree
    }
}
