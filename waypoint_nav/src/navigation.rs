// Per-agent navigation: goals, path following, replanning.
//
// Higher-level bot logic picks a goal node and calls `AgentNav::set_goal`.
// Every tick it then calls `follow_path` with the agent's position; the
// result is either a `MoveGoal` for the movement executor (which node to head
// for, where it is, and which kind of link leads there) or a status change.
//
// Planning resolves the agent's position to the closest node it can reach in
// a straight line, then runs A* from there to the goal. The route therefore
// starts with that node. Failures are not fatal: a failed plan, a node not
// reached in time, or an agent that stops moving all drop the route and
// count one replan. The next tick plans again, searching for a start node in
// a wider radius. After `max_replans` in a row the goal is abandoned and the
// caller gets `FollowOutcome::Failed`. Reaching any route node past the start
// node resets the count (and with it the search radius).
//
// Node timeouts scale with distance: `node_timeout_ticks` plus
// `ticks_per_unit` per unit between the agent and the node when it became
// the target.
//
// See also: `pathfinding.rs` for the search, `linking.rs` for how links get
// their movement types.

use crate::config::NavConfig;
use crate::nodes::NodeStore;
use crate::pathfinding::{Path, PathError, SearchContext, find_path};
use crate::trace::{MASK_AISOLID, TraceWorld};
use crate::types::{EntityId, LinkType, NodeFilter, NodeFlags, NodeId, Vec3};
use thiserror::Error;
use tracing::{debug, warn};
use waypoint_prng::NavRng;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum NavError {
    #[error("agent has no goal")]
    NoGoal,
    #[error("no reachable node within {radius} units")]
    Unreachable { radius: f32 },
    #[error("path search failed: {0}")]
    PathFailed(#[from] PathError),
    #[error("goal abandoned after {attempts} failed attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Short-range target handed to the movement executor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveGoal {
    pub node: NodeId,
    pub target: Vec3,
    /// Movement needed to get there (jump, crouch, swim...).
    pub link: LinkType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReplanReason {
    /// The next node was not reached within its time allowance.
    NodeTimeout(NodeId),
    /// The agent stopped making progress.
    Blocked,
    /// Planning itself failed; it will be retried.
    SearchFailed(NavError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FollowOutcome {
    /// No goal set.
    Idle,
    Moving(MoveGoal),
    /// The goal node was reached; the goal is cleared.
    Arrived(NodeId),
    /// The route was dropped and will be rebuilt next tick.
    Replanning(ReplanReason),
    /// The goal was abandoned.
    Failed(NavError),
}

// ---------------------------------------------------------------------------
// Closest reachable node
// ---------------------------------------------------------------------------

/// The nearest node within `radius` of `pos` that matches `filter` and that a
/// box can reach from `pos` in a straight line.
///
/// The box is the agent's, raised by `step_height` at the bottom so small
/// steps between the agent and the node do not block it. Monsters and
/// corpses block; `ignore` (usually the agent itself) does not.
pub fn find_closest_reachable_node<W: TraceWorld>(
    store: &NodeStore,
    world: &W,
    pos: Vec3,
    ignore: Option<EntityId>,
    radius: f32,
    filter: NodeFilter,
    config: &NavConfig,
) -> Option<NodeId> {
    let mins = config.agent.mins + Vec3::new(0.0, 0.0, config.links.step_height);
    let maxs = config.agent.maxs;
    store
        .nodes_within(pos, radius, filter)
        .into_iter()
        .map(|(id, _)| id)
        .find(|&id| world.is_clear(pos, mins, maxs, store.origin(id), ignore, MASK_AISOLID))
}

/// `find_closest_reachable_node`, retried with the radius multiplied by
/// `node_search_growth` up to `node_search_tries` times.
pub fn find_closest_reachable_node_escalating<W: TraceWorld>(
    store: &NodeStore,
    world: &W,
    pos: Vec3,
    ignore: Option<EntityId>,
    start_radius: f32,
    filter: NodeFilter,
    config: &NavConfig,
) -> Result<NodeId, NavError> {
    let follow = &config.follow;
    let mut radius = start_radius;
    for attempt in 0..follow.node_search_tries.max(1) {
        if attempt > 0 {
            radius *= follow.node_search_growth;
        }
        if let Some(id) = find_closest_reachable_node(store, world, pos, ignore, radius, filter, config) {
            return Ok(id);
        }
    }
    Err(NavError::Unreachable { radius })
}

/// A random BOTROAM node not listed in `exclude`.
pub fn pick_roam_goal(store: &NodeStore, rng: &mut NavRng, exclude: &[NodeId]) -> Option<NodeId> {
    let spots: Vec<NodeId> = store
        .iter()
        .filter(|(id, n)| n.flags.contains(NodeFlags::BOTROAM) && !exclude.contains(id))
        .map(|(id, _)| id)
        .collect();
    rng.choose(&spots).copied()
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// Navigation state owned by one agent.
#[derive(Clone, Debug)]
pub struct AgentNav {
    /// The agent's own entity, ignored by reachability traces.
    entity: Option<EntityId>,
    mask: LinkType,
    goal: Option<NodeId>,
    /// Last node reached.
    current: Option<NodeId>,
    path: Option<Path>,
    /// Nodes to visit: the start node, then the path.
    route: Vec<NodeId>,
    /// Index into `route` of the node being headed for.
    cursor: usize,
    node_deadline: u64,
    replans: u32,
    progress_pos: Vec3,
    progress_tick: u64,
}

impl AgentNav {
    /// An empty mask means `LinkType::DEFAULT_MASK`.
    pub fn new(entity: Option<EntityId>, mask: LinkType) -> Self {
        Self {
            entity,
            mask: mask.or_default_mask(),
            goal: None,
            current: None,
            path: None,
            route: Vec::new(),
            cursor: 0,
            node_deadline: 0,
            replans: 0,
            progress_pos: Vec3::ZERO,
            progress_tick: 0,
        }
    }

    /// Replace the goal, dropping any route and resetting retry counters.
    pub fn set_goal(&mut self, goal: NodeId) {
        self.goal = Some(goal);
        self.drop_route();
        self.replans = 0;
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
        self.drop_route();
        self.replans = 0;
    }

    pub fn set_mask(&mut self, mask: LinkType) {
        self.mask = mask.or_default_mask();
        self.drop_route();
    }

    pub fn goal(&self) -> Option<NodeId> {
        self.goal
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.current
    }

    /// The node being headed for, if a route exists.
    pub fn next_node(&self) -> Option<NodeId> {
        self.route.get(self.cursor).copied()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn replans(&self) -> u32 {
        self.replans
    }

    fn drop_route(&mut self) {
        self.path = None;
        self.route.clear();
        self.cursor = 0;
    }

    /// Advance along the route and return what the agent should do this tick.
    pub fn follow_path<W: TraceWorld>(
        &mut self,
        store: &NodeStore,
        world: &W,
        ctx: &mut SearchContext,
        config: &NavConfig,
        position: Vec3,
        now: u64,
    ) -> FollowOutcome {
        let Some(goal) = self.goal else {
            return FollowOutcome::Idle;
        };

        if self.route.is_empty() {
            if let Err(err) = self.plan(store, world, ctx, config, goal, position, now) {
                return self.plan_failed(err, config);
            }
        }

        while let Some(next) = self.next_node() {
            if !self.reached(store, next, position, config) {
                break;
            }
            // Progress past the start node means the last plan worked.
            if self.cursor > 0 {
                self.replans = 0;
            }
            self.current = Some(next);
            self.cursor += 1;
            // Touching a teleporter entry lands the agent on its exit.
            if store.flags(next).contains(NodeFlags::TELEPORTER_IN)
                && self.next_node() == Some(next.paired_exit())
            {
                self.current = Some(next.paired_exit());
                self.cursor += 1;
            }
            match self.next_node() {
                None => {
                    debug!(goal = %goal, "goal reached");
                    self.clear_goal();
                    return FollowOutcome::Arrived(goal);
                }
                Some(following) => {
                    self.start_leg(store, config, following, position, now);
                }
            }
        }

        let Some(next) = self.next_node() else {
            return FollowOutcome::Idle;
        };

        if position.distance(self.progress_pos) > config.follow.blocked_epsilon {
            self.progress_pos = position;
            self.progress_tick = now;
        }
        if now > self.node_deadline {
            return self.replan(ReplanReason::NodeTimeout(next), config);
        }
        if now.saturating_sub(self.progress_tick) >= config.follow.blocked_ticks {
            return self.replan(ReplanReason::Blocked, config);
        }

        let link = self
            .current
            .and_then(|from| store.link_between(from, next, self.mask))
            .map_or(LinkType::MOVE, |l| l.move_type);
        FollowOutcome::Moving(MoveGoal {
            node: next,
            target: store.origin(next),
            link,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn plan<W: TraceWorld>(
        &mut self,
        store: &NodeStore,
        world: &W,
        ctx: &mut SearchContext,
        config: &NavConfig,
        goal: NodeId,
        position: Vec3,
        now: u64,
    ) -> Result<(), NavError> {
        let follow = &config.follow;
        let radius = follow.node_search_radius * follow.node_search_growth.powi(self.replans as i32);
        let start = find_closest_reachable_node_escalating(
            store,
            world,
            position,
            self.entity,
            radius,
            NodeFilter::All,
            config,
        )?;
        let path = find_path(store, ctx, start, goal, self.mask, &config.search)?;
        debug!(start = %start, goal = %goal, hops = path.len(), cost = path.cost, "route planned");

        self.route.clear();
        self.route.push(start);
        self.route.extend_from_slice(&path.nodes);
        self.path = Some(path);
        self.cursor = 0;
        self.current = None;
        self.progress_pos = position;
        self.progress_tick = now;
        self.start_leg(store, config, start, position, now);
        Ok(())
    }

    fn start_leg(&mut self, store: &NodeStore, config: &NavConfig, node: NodeId, position: Vec3, now: u64) {
        let distance = position.distance(store.origin(node));
        let allowance = config.follow.node_timeout_ticks + (distance * config.follow.ticks_per_unit) as u64;
        self.node_deadline = now + allowance;
        self.progress_tick = now;
        self.progress_pos = position;
    }

    fn reached(&self, store: &NodeStore, node: NodeId, position: Vec3, config: &NavConfig) -> bool {
        let n = store.node(node);
        let radius = if n.flags.contains(NodeFlags::REACHATTOUCH) {
            config.follow.touch_radius
        } else {
            config.follow.reach_radius
        };
        if position.distance(n.origin) <= radius {
            return true;
        }
        n.flags.contains(NodeFlags::TELEPORTER_IN)
            && store
                .get(node.paired_exit())
                .is_some_and(|exit| position.distance(exit.origin) <= config.follow.reach_radius)
    }

    fn replan(&mut self, reason: ReplanReason, config: &NavConfig) -> FollowOutcome {
        self.drop_route();
        self.replans += 1;
        debug!(?reason, replans = self.replans, "dropping route");
        if self.replans > config.follow.max_replans {
            return self.give_up();
        }
        FollowOutcome::Replanning(reason)
    }

    fn plan_failed(&mut self, err: NavError, config: &NavConfig) -> FollowOutcome {
        if let NavError::PathFailed(PathError::InvalidNode(_)) = err {
            warn!(%err, "goal is not a valid node");
            self.clear_goal();
            return FollowOutcome::Failed(err);
        }
        self.replan(ReplanReason::SearchFailed(err), config)
    }

    fn give_up(&mut self) -> FollowOutcome {
        let attempts = self.replans;
        warn!(goal = ?self.goal, attempts, "navigation goal abandoned");
        self.clear_goal();
        FollowOutcome::Failed(NavError::RetriesExhausted { attempts })
    }
}
