// A* search over the node store.
//
// The search follows the classic open/closed formulation: each touched node
// is `None`, `Open` or `Closed`, with G (cost so far), H (estimate to goal)
// and a parent pointer. The open set is a `BinaryHeap` (min-heap via reversed
// ordering). Relaxing an open node pushes a fresh entry rather than updating
// in place; stale entries are skipped when popped. Equal F scores break by
// the order nodes were first opened, so results are deterministic.
//
// By default the search stops as soon as the goal enters the open set, which
// is cheap but not always optimal. With `stop_when_goal_opened = false` it
// stops when the goal is selected for expansion instead; with the Euclidean
// heuristic and edge costs no shorter than straight-line distance the result
// is then a shortest path.
//
// Per-node state lives in a `SearchContext` the caller owns and reuses. It is
// sized lazily to the store and cleared sparsely (only the nodes the last
// search touched), so repeated searches on a large level do not pay for the
// whole graph. Two searches never share a context, which makes concurrent
// searches from different threads safe.
//
// The heuristic treats a TELEPORTER_IN node as standing at its exit (the next
// node index), since that is where an agent touching it ends up. This keeps
// teleporters attractive but makes the heuristic inadmissible around them.
//
// See also: `nodes.rs` for links and `link_distance`, `navigation.rs` for the
// per-agent layer that calls `find_path`.

use crate::config::{Heuristic, SearchParams};
use crate::nodes::NodeStore;
use crate::types::{LinkType, NodeFlags, NodeId, Vec3};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a search produced no path.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PathError {
    #[error("node {0} is not in the store")]
    InvalidNode(NodeId),
    #[error("no path from {origin} to {goal} under the movement mask")]
    Blocked { origin: NodeId, goal: NodeId },
    #[error("search aborted after {expansions} expansions")]
    BudgetExceeded { expansions: u32 },
}

/// The result of a successful search.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub origin: NodeId,
    pub goal: NodeId,
    /// Nodes to visit after `origin`, ending with `goal`. Empty when
    /// `origin == goal`.
    pub nodes: Vec<NodeId>,
    /// Sum of the edge costs along the path.
    pub cost: f32,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Membership {
    #[default]
    None,
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    state: Membership,
    g: f32,
    h: f32,
    parent: NodeId,
    /// Order in which the node was first opened.
    seq: u32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: Membership::None,
            g: f32::INFINITY,
            h: 0.0,
            parent: NodeId::INVALID,
            seq: u32::MAX,
        }
    }
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NodeId,
    f_score: f32,
    seq: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score, then earliest seq, is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Reusable per-search working set.
#[derive(Default)]
pub struct SearchContext {
    slots: Vec<Slot>,
    touched: Vec<NodeId>,
    open: BinaryHeap<OpenEntry>,
    next_seq: u32,
    expansions: u32,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear what the previous search touched and make room for `node_count`
    /// nodes.
    fn reset(&mut self, node_count: usize) {
        if self.slots.len() < node_count {
            self.slots.resize(node_count, Slot::default());
        }
        for id in self.touched.drain(..) {
            self.slots[id.index()] = Slot::default();
        }
        self.open.clear();
        self.next_seq = 0;
        self.expansions = 0;
    }

    /// Nodes expanded by the most recent search.
    pub fn expansions(&self) -> u32 {
        self.expansions
    }

    /// Nodes the most recent search touched (opened or closed).
    pub fn touched(&self) -> usize {
        self.touched.len()
    }

    fn slot(&mut self, id: NodeId) -> &mut Slot {
        &mut self.slots[id.index()]
    }

    fn open_node(&mut self, id: NodeId, parent: NodeId, g: f32, h: f32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self.slot(id);
        if slot.state == Membership::None {
            self.touched.push(id);
        }
        let slot = self.slot(id);
        *slot = Slot {
            state: Membership::Open,
            g,
            h,
            parent,
            seq,
        };
        self.open.push(OpenEntry {
            node: id,
            f_score: g + h,
            seq,
        });
    }

    fn close_node(&mut self, id: NodeId) {
        let slot = self.slot(id);
        let was_untracked = slot.state == Membership::None;
        slot.state = Membership::Closed;
        if was_untracked {
            self.touched.push(id);
        }
    }

    /// Pop the open node with the lowest F, skipping stale entries.
    fn pop_best(&mut self) -> Option<NodeId> {
        while let Some(entry) = self.open.pop() {
            let slot = self.slots[entry.node.index()];
            if slot.state != Membership::Open {
                continue;
            }
            if (slot.g + slot.h).to_bits() != entry.f_score.to_bits() {
                continue;
            }
            return Some(entry.node);
        }
        None
    }
}

/// Estimated cost from `node` to `goal`. A TELEPORTER_IN node is measured
/// from its paired exit.
pub fn heuristic_estimate(
    store: &NodeStore,
    node: NodeId,
    goal: NodeId,
    heuristic: Heuristic,
) -> f32 {
    let from = effective_origin(store, node);
    let to = store.origin(goal);
    match heuristic {
        Heuristic::Manhattan => {
            let d = (from - to).abs();
            d.x + d.y + d.z
        }
        Heuristic::Euclidean => from.distance(to),
    }
}

fn effective_origin(store: &NodeStore, node: NodeId) -> Vec3 {
    let n = store.node(node);
    if n.flags.contains(NodeFlags::TELEPORTER_IN) {
        if let Some(exit) = store.get(node.paired_exit()) {
            return exit.origin;
        }
    }
    n.origin
}

/// Cost of the step `from -> to`, falling back to `missing_link_cost` when the
/// pair has no recorded link in either direction.
pub(crate) fn edge_cost(
    store: &NodeStore,
    from: NodeId,
    to: NodeId,
    mask: LinkType,
    params: &SearchParams,
) -> f32 {
    store.link_distance(from, to, mask).unwrap_or_else(|| {
        warn!(from = %from, to = %to, "no link distance in either direction, using fallback cost");
        params.missing_link_cost
    })
}

/// Find a path from `origin` to `goal` using only links whose movement type
/// intersects `mask` (an empty mask means `LinkType::DEFAULT_MASK`).
pub fn find_path(
    store: &NodeStore,
    ctx: &mut SearchContext,
    origin: NodeId,
    goal: NodeId,
    mask: LinkType,
    params: &SearchParams,
) -> Result<Path, PathError> {
    if !store.contains(origin) {
        return Err(PathError::InvalidNode(origin));
    }
    if !store.contains(goal) {
        return Err(PathError::InvalidNode(goal));
    }
    if origin == goal {
        return Ok(Path {
            origin,
            goal,
            nodes: Vec::new(),
            cost: 0.0,
        });
    }

    let mask = mask.or_default_mask();
    ctx.reset(store.len());
    {
        let slot = ctx.slot(origin);
        slot.g = 0.0;
        slot.h = heuristic_estimate(store, origin, goal, params.heuristic);
    }

    let mut current = origin;
    loop {
        if params.stop_when_goal_opened {
            if ctx.slots[goal.index()].state == Membership::Open {
                break;
            }
        } else if current == goal {
            break;
        }

        ctx.close_node(current);
        ctx.expansions += 1;
        if let Some(cap) = params.max_expansions {
            if ctx.expansions > cap {
                debug!(origin = %origin, goal = %goal, cap, "search budget exceeded");
                return Err(PathError::BudgetExceeded {
                    expansions: ctx.expansions,
                });
            }
        }

        let current_g = ctx.slots[current.index()].g;
        for link in store.links(current) {
            let next = link.target;
            if !link.move_type.intersects(mask) || next == current || !store.contains(next) {
                continue;
            }
            let slot = ctx.slots[next.index()];
            match slot.state {
                Membership::Closed => {}
                Membership::Open => {
                    let g = current_g + edge_cost(store, current, next, mask, params);
                    if g < slot.g {
                        let s = ctx.slot(next);
                        s.g = g;
                        s.parent = current;
                        let (h, seq) = (s.h, s.seq);
                        ctx.open.push(OpenEntry {
                            node: next,
                            f_score: g + h,
                            seq,
                        });
                    }
                }
                Membership::None => {
                    let g = current_g + edge_cost(store, current, next, mask, params);
                    let h = heuristic_estimate(store, next, goal, params.heuristic);
                    ctx.open_node(next, current, g, h);
                }
            }
        }

        match ctx.pop_best() {
            Some(best) => current = best,
            None => return Err(PathError::Blocked { origin, goal }),
        }
    }

    let cost = ctx.slots[goal.index()].g;
    let mut nodes = Vec::new();
    let mut at = goal;
    while at != origin {
        nodes.push(at);
        at = ctx.slots[at.index()].parent;
    }
    nodes.reverse();
    Ok(Path {
        origin,
        goal,
        nodes,
        cost,
    })
}

/// `find_path` with a context allocated for this one call.
pub fn find_path_once(
    store: &NodeStore,
    origin: NodeId,
    goal: NodeId,
    mask: LinkType,
    params: &SearchParams,
) -> Result<Path, PathError> {
    find_path(store, &mut SearchContext::new(), origin, goal, mask, params)
}
