use super::{ClusterNode, NodeID};

/// Index of a [`KdNode`] in a [`KdTree`].
pub type SlotID = u32;

/// A slot of a [`KdTree`] referencing a cluster.
///
/// Slots are never removed from the tree: deleted slots are only marked as such, and a slot can be
/// given a new cluster without moving it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KdNode {
    /// Cluster currently stored in the slot, `None` once deleted.
    pub cluster: Option<NodeID>,
    /// Coordinate splitting the children of the slot.
    pub value: f32,
    /// Axis of the split.
    pub axis: u8,
    /// Depth of the slot in the tree, the root being at depth 0.
    pub depth: u8,
    /// The payload of this slot is stale.
    pub deleted: bool,
    /// This slot and its whole subtree are stale.
    pub deleted_subtree: bool,
    /// Incremented every time the payload of the slot changes.
    pub generation: u32,
    /// Parent of the slot, `None` for the root.
    pub parent: Option<SlotID>,
    /// Lower and upper children of the slot.
    pub children: [Option<SlotID>; 2],
}

/// Closest cluster found by [`KdTree::find_nearest`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nearest {
    /// Slot holding the closest cluster.
    pub slot: SlotID,
    /// Cost of merging the queried cluster with the closest one.
    pub cost: f32,
}

/// k-d tree over clusters supporting nearest-neighbour queries with a merge cost metric, soft
/// deletion and in-place update of its slots.
///
/// The tree does not own the clusters: it stores their [`NodeID`] and every query takes the slice
/// of clusters the ids refer to.
#[derive(Clone, Debug, Default)]
pub struct KdTree {
    slots: Vec<KdNode>,
    root: Option<SlotID>,
}

struct NearestSearch<'a> {
    query: SlotID,
    cluster: &'a ClusterNode,
    best: Option<SlotID>,
    cost: f32,
    search_radius: f32,
    visits: usize,
}

/// Returns the cost of merging two clusters: the squared diagonal of their merged box scaled by
/// the squared magnitude of their summed intensities.
#[inline]
pub fn merge_cost(lhs: &ClusterNode, rhs: &ClusterNode) -> f32 {
    lhs.aabb.merge(&rhs.aabb).diagonal_sqr() * (lhs.intensity + rhs.intensity).length_squared()
}

impl KdTree {
    /// Creates a new [`KdTree`] with one slot per given cluster.
    ///
    /// # Panics
    ///
    /// Panics if the tree would be deeper than 255 levels.
    pub fn new(clusters: &[ClusterNode]) -> Self {
        let mut ids = (0..clusters.len() as NodeID).collect::<Vec<_>>();

        let mut tree = Self {
            slots: Vec::with_capacity(clusters.len()),
            root: None,
        };
        tree.root = tree.build_node(clusters, &mut ids, None, 0);

        assert_eq!(tree.slots.len(), clusters.len(), "invalid k-d tree node count");

        tree
    }

    fn build_node(
        &mut self,
        clusters: &[ClusterNode],
        ids: &mut [NodeID],
        parent: Option<SlotID>,
        depth: usize,
    ) -> Option<SlotID> {
        if ids.is_empty() {
            return None;
        }

        assert!(depth < u8::MAX as usize, "k-d tree depth overflow");
        let axis = depth % 3;

        let mid = ids.len() / 2;
        ids.select_nth_unstable_by(mid, |&a, &b| {
            let a = clusters[a as usize].aabb.min[axis];
            let b = clusters[b as usize].aabb.min[axis];
            a.total_cmp(&b)
        });

        let cluster = ids[mid];
        let id = self.slots.len() as SlotID;
        self.slots.push(KdNode {
            cluster: Some(cluster),
            value: clusters[cluster as usize].aabb.min[axis],
            axis: axis as u8,
            depth: depth as u8,
            deleted: false,
            deleted_subtree: false,
            generation: 0,
            parent,
            children: [None, None],
        });

        let (lower, upper) = ids.split_at_mut(mid);
        let left = self.build_node(clusters, lower, Some(id), depth + 1);
        let right = self.build_node(clusters, &mut upper[1..], Some(id), depth + 1);
        self.slots[id as usize].children = [left, right];

        Some(id)
    }

    /// Returns the slots of the tree, the root first.
    #[inline]
    pub fn slots(&self) -> &[KdNode] {
        &self.slots
    }

    /// Returns the number of slots in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the tree has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the root slot of the tree.
    #[inline]
    pub const fn root(&self) -> Option<SlotID> {
        self.root
    }

    /// Returns the cluster stored in the given slot.
    #[inline]
    pub fn cluster(&self, slot: SlotID) -> Option<NodeID> {
        self.slots[slot as usize].cluster
    }

    /// Returns the depth of the given slot.
    #[inline]
    pub fn depth(&self, slot: SlotID) -> u8 {
        self.slots[slot as usize].depth
    }

    /// Returns the generation of the given slot.
    #[inline]
    pub fn generation(&self, slot: SlotID) -> u32 {
        self.slots[slot as usize].generation
    }

    /// Returns true if the given slot was deleted.
    #[inline]
    pub fn is_deleted(&self, slot: SlotID) -> bool {
        self.slots[slot as usize].deleted
    }

    /// Returns true if the given slot and all of its descendants were deleted.
    #[inline]
    pub fn is_subtree_deleted(&self, slot: SlotID) -> bool {
        self.slots[slot as usize].deleted_subtree
    }

    /// Returns the slot whose cluster is the cheapest to merge with the cluster in `query`, along
    /// with the merge cost. Returns `None` if `query` is deleted or if no other slot is left.
    #[inline]
    pub fn find_nearest(&self, clusters: &[ClusterNode], query: SlotID) -> Option<Nearest> {
        self.find_nearest_counted(clusters, query).0
    }

    /// Same as [`KdTree::find_nearest`], also returning the number of visited slots.
    pub(crate) fn find_nearest_counted(
        &self,
        clusters: &[ClusterNode],
        query: SlotID,
    ) -> (Option<Nearest>, usize) {
        let Some(cluster) = self.cluster(query) else {
            return (None, 0);
        };

        let mut search = NearestSearch {
            query,
            cluster: &clusters[cluster as usize],
            best: None,
            cost: f32::INFINITY,
            search_radius: f32::INFINITY,
            visits: 0,
        };
        self.find_nearest_recurse(clusters, self.root, &mut search);

        let nearest = search.best.map(|slot| Nearest {
            slot,
            cost: search.cost,
        });

        (nearest, search.visits)
    }

    fn find_nearest_recurse(
        &self,
        clusters: &[ClusterNode],
        current: Option<SlotID>,
        search: &mut NearestSearch,
    ) {
        let Some(id) = current else {
            return;
        };

        let node = &self.slots[id as usize];
        if node.deleted_subtree {
            return;
        }
        search.visits += 1;

        if !node.deleted && id != search.query {
            Self::check_nearest(clusters, id, node, search);
        }

        let dx = search.cluster.aabb.min[node.axis as usize] - node.value;
        let [lower, upper] = node.children;
        let (near, far) = if dx <= 0.0 {
            (lower, upper)
        } else {
            (upper, lower)
        };

        self.find_nearest_recurse(clusters, near, search);
        if dx * dx >= search.search_radius {
            return;
        }
        self.find_nearest_recurse(clusters, far, search);
    }

    fn check_nearest(
        clusters: &[ClusterNode],
        id: SlotID,
        node: &KdNode,
        search: &mut NearestSearch,
    ) {
        let Some(cluster) = node.cluster else {
            return;
        };
        let candidate = &clusters[cluster as usize];

        let dist = search.cluster.aabb.merge(&candidate.aabb).diagonal_sqr();
        if search.best.is_some() && dist >= search.search_radius {
            return;
        }

        let cost = dist * (search.cluster.intensity + candidate.intensity).length_squared();
        if search.best.is_some() && cost >= search.cost {
            return;
        }

        search.best = Some(id);
        search.cost = cost;
        search.search_radius = cost / search.cluster.intensity.length_squared();
    }

    /// Marks the given slot as deleted and clears its payload. The slot keeps its place in the
    /// tree, and the subtrees that become entirely deleted are skipped by subsequent queries.
    pub fn delete_node(&mut self, slot: SlotID) {
        let node = &mut self.slots[slot as usize];
        node.deleted = true;
        node.cluster = None;
        node.generation = node.generation.wrapping_add(1);

        let mut current = Some(slot);
        while let Some(id) = current {
            if !self.is_subtree_deleted_recurse(Some(id)) {
                break;
            }
            current = self.slots[id as usize].parent;
        }
    }

    /// Replaces the cluster stored in the given slot without changing its place in the tree.
    pub fn update_node(&mut self, slot: SlotID, cluster: NodeID) {
        let node = &mut self.slots[slot as usize];
        debug_assert!(!node.deleted, "updating a deleted k-d tree slot");

        node.cluster = Some(cluster);
        node.generation = node.generation.wrapping_add(1);
    }

    fn is_subtree_deleted_recurse(&mut self, slot: Option<SlotID>) -> bool {
        let Some(id) = slot else {
            return true;
        };

        let node = &self.slots[id as usize];
        if node.deleted_subtree {
            return true;
        }
        if !node.deleted {
            return false;
        }

        let [lower, upper] = node.children;
        if self.is_subtree_deleted_recurse(lower) && self.is_subtree_deleted_recurse(upper) {
            self.slots[id as usize].deleted_subtree = true;
            return true;
        }

        false
    }
}
