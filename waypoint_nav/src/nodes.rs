// Node store: the waypoint graph bots navigate.
//
// A `NodeStore` owns every `Node` of the loaded level in a `Vec` indexed by
// `NodeId`. Each node carries its outgoing `Link`s inline (a `SmallVec`, since
// almost every node has a handful of neighbors). Nodes are never removed
// individually; a level change replaces the whole store. Ids are therefore
// stable for the lifetime of a level, which the teleporter pairing relies on
// (a TELEPORTER_IN node's exit is stored at the next index).
//
// The store is filled by an external loader or by `grid.rs`/`spawn.rs`, then
// `linking.rs` populates links. After that it is read-only to
// `pathfinding.rs` and `navigation.rs`.
//
// Iteration order is index order. Nothing here uses a `HashMap`, so every
// traversal is deterministic.

use crate::types::{LinkType, NodeFilter, NodeFlags, NodeId, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A directed, typed, weighted edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub target: NodeId,
    /// Traversal cost, used directly as the A* edge weight.
    pub distance: f32,
    pub move_type: LinkType,
}

/// A waypoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub origin: Vec3,
    pub flags: NodeFlags,
    pub links: SmallVec<[Link; 8]>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeStore {
    nodes: Vec<Node>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Returns its id.
    pub fn add_node(&mut self, origin: Vec3, flags: NodeFlags) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            origin,
            flags,
            links: SmallVec::new(),
        });
        id
    }

    /// Bounds-checked access. `NodeId::INVALID` and out-of-range ids give `None`.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get(id.index())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Get a node by id. Panics on an id not from this store.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn origin(&self, id: NodeId) -> Vec3 {
        self.node(id).origin
    }

    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.node(id).flags
    }

    /// Outgoing links of a node, in insertion order.
    pub fn links(&self, id: NodeId) -> &[Link] {
        &self.node(id).links
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !id.is_valid() {
            return None;
        }
        self.nodes.get_mut(id.index())
    }

    /// Move a node. Returns false for an id not in the store.
    pub fn set_origin(&mut self, id: NodeId, origin: Vec3) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        node.origin = origin;
        true
    }

    /// Add flags to a node (existing flags are kept). Returns false for an id
    /// not in the store.
    pub fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        node.flags.insert(flags);
        true
    }

    /// Add a link unless one with the same target and movement type exists.
    /// Returns whether a link was inserted; links to or from an id not in the
    /// store are refused.
    pub fn add_link(
        &mut self,
        from: NodeId,
        to: NodeId,
        distance: f32,
        move_type: LinkType,
    ) -> bool {
        if !self.contains(to) {
            return false;
        }
        let Some(node) = self.get_mut(from) else {
            return false;
        };
        let links = &mut node.links;
        if links
            .iter()
            .any(|l| l.target == to && l.move_type == move_type)
        {
            return false;
        }
        links.push(Link {
            target: to,
            distance,
            move_type,
        });
        true
    }

    /// Whether `from` has any outgoing link to `to`.
    pub fn has_link(&self, from: NodeId, to: NodeId) -> bool {
        self.links(from).iter().any(|l| l.target == to)
    }

    /// Cost of stepping from `from` to `to`.
    ///
    /// Prefers the cheapest forward link usable under `mask`, then any
    /// forward link, then the reverse link's distance (cost is symmetric even
    /// when traversal is not). `None` means the pair has no link either way.
    pub fn link_distance(&self, from: NodeId, to: NodeId, mask: LinkType) -> Option<f32> {
        self.link_between(from, to, mask)
            .or_else(|| self.links(from).iter().find(|l| l.target == to))
            .or_else(|| self.links(to).iter().find(|l| l.target == from))
            .map(|l| l.distance)
    }

    /// The cheapest forward link from `from` to `to` usable under `mask`.
    pub fn link_between(&self, from: NodeId, to: NodeId, mask: LinkType) -> Option<&Link> {
        self.links(from)
            .iter()
            .filter(|l| l.target == to && l.move_type.intersects(mask))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Drop every link (positions and flags are kept).
    pub fn clear_links(&mut self) {
        for node in &mut self.nodes {
            node.links.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn total_links(&self) -> usize {
        self.nodes.iter().map(|n| n.links.len()).sum()
    }

    /// Nodes matching `filter` within `radius` of `pos`, nearest first.
    /// Equal distances keep index order.
    pub fn nodes_within(&self, pos: Vec3, radius: f32, filter: NodeFilter) -> Vec<(NodeId, f32)> {
        let radius_sq = radius * radius;
        let mut found: Vec<(NodeId, f32)> = self
            .iter()
            .filter(|(_, n)| filter.matches(n.flags))
            .filter_map(|(id, n)| {
                let d = n.origin.distance_squared(pos);
                (d <= radius_sq).then_some((id, d))
            })
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        for entry in &mut found {
            entry.1 = entry.1.sqrt();
        }
        found
    }

    /// Nearest node matching `filter`, ignoring geometry. `None` if no node
    /// matches.
    pub fn find_nearest(&self, pos: Vec3, filter: NodeFilter) -> Option<NodeId> {
        self.iter()
            .filter(|(_, n)| filter.matches(n.flags))
            .min_by(|a, b| {
                a.1.origin
                    .distance_squared(pos)
                    .total_cmp(&b.1.origin.distance_squared(pos))
            })
            .map(|(id, _)| id)
    }
}
