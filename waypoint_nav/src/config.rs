// Data-driven navigation configuration.
//
// Every tunable used by link discovery, path search and path following lives
// in `NavConfig`, loaded from JSON by the host at level start. The algorithms
// never embed their own constants: agent dimensions, movement limits, search
// budgets and timeouts are all read from here so a mod can retune bots for a
// different movement model without recompiling.
//
// Parameters are grouped by the module that consumes them:
// - `AgentBounds`:  collision box used for every trace (`linking.rs`,
//                   `grid.rs`, `navigation.rs`).
// - `LinkParams`:   movement limits for link classification (`linking.rs`).
// - `SearchParams`: heuristic, termination and step cap (`pathfinding.rs`).
// - `FollowParams`: reach radii, timeouts and retry escalation
//                   (`navigation.rs`).
// - `GridParams`:   runtime node generation (`grid.rs`).
//
// Distances are game units, times are simulation ticks unless a field says
// seconds, and Z is up.

use crate::types::Vec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// The agent's collision box relative to its origin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentBounds {
    pub mins: Vec3,
    pub maxs: Vec3,
    /// Top of the box while crouched. Used to test crouch-only passages.
    pub crouch_maxs_z: f32,
}

impl AgentBounds {
    /// Box extents while crouched.
    pub fn crouched_maxs(&self) -> Vec3 {
        Vec3::new(self.maxs.x, self.maxs.y, self.crouch_maxs_z)
    }
}

/// Movement limits used to decide whether two nodes can be linked and how.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkParams {
    /// Nodes farther apart than this are never linked by geometry.
    pub link_radius: f32,
    /// Tallest ledge a walking agent steps onto without jumping.
    pub step_height: f32,
    /// Tallest ledge that can be climbed from standing.
    pub climb_height: f32,
    /// Horizontal reach of a ledge climb.
    pub climb_reach: f32,
    /// Deepest drop considered survivable.
    pub max_fall_height: f32,
    /// Apex height of a standing jump.
    pub jump_height: f32,
    /// Horizontal reach of a running jump.
    pub max_jump_distance: f32,
    /// Tallest lip an agent can pull itself over when leaving water.
    pub waterjump_height: f32,
    /// Length of each swept-box step when testing a walk.
    pub trace_step: f32,
    /// Number of segments the jump arc is split into.
    pub arc_segments: u32,
    /// Downward acceleration, units/s².
    pub gravity: f32,
    /// How close a jump-pad landing must be to a node to link to it.
    pub jumppad_land_tolerance: f32,
    /// Integration step for jump-pad flight, seconds.
    pub jumppad_sim_step: f32,
    /// Give up integrating a jump-pad flight after this long, seconds.
    pub jumppad_max_flight_time: f32,
    /// Cost recorded on teleporter links.
    pub teleport_distance: f32,
}

/// Heuristic used by A*.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heuristic {
    /// Sum of per-axis distances. Fast, but overestimates straight-line
    /// edge costs, so results are best-effort rather than optimal.
    Manhattan,
    /// Straight-line distance. Never overestimates spatial edge costs.
    Euclidean,
}

/// A* settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchParams {
    pub heuristic: Heuristic,
    /// Stop as soon as the goal enters the open list instead of waiting for
    /// it to be expanded. Faster, not guaranteed optimal.
    pub stop_when_goal_opened: bool,
    /// Abort after this many node expansions. `None` disables the cap.
    pub max_expansions: Option<u32>,
    /// Cost used when two linked nodes have no recorded distance in either
    /// direction.
    pub missing_link_cost: f32,
}

/// Path-following and replanning settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FollowParams {
    /// Distance at which an ordinary node counts as reached.
    pub reach_radius: f32,
    /// Distance at which a REACHATTOUCH node counts as reached.
    pub touch_radius: f32,
    /// First radius tried when resolving a position to a node.
    pub node_search_radius: f32,
    /// Each retry multiplies the radius by this factor.
    pub node_search_growth: f32,
    /// Radius escalations tried before a position is declared unreachable.
    pub node_search_tries: u32,
    /// Failed plans tolerated before the goal is reported as unreachable.
    pub max_replans: u32,
    /// Fixed allowance for reaching the next node.
    pub node_timeout_ticks: u64,
    /// Additional allowance per unit of link distance.
    pub ticks_per_unit: f32,
    /// Ticks without measurable movement before the agent counts as blocked.
    pub blocked_ticks: u64,
    /// Movement below this distance does not count as progress.
    pub blocked_epsilon: f32,
}

/// Runtime node generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridParams {
    /// Distance between sampled columns.
    pub spacing: f32,
    /// New nodes closer than this to an existing node are dropped.
    pub min_separation: f32,
    /// Farthest a node is moved down when snapped to the floor.
    pub drop_height: f32,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// All navigation tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavConfig {
    pub agent: AgentBounds,
    pub links: LinkParams,
    pub search: SearchParams,
    pub follow: FollowParams,
    pub grid: GridParams,
}

impl NavConfig {
    /// Parse a config from JSON. Every group must be present.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            agent: AgentBounds {
                mins: Vec3::new(-15.0, -15.0, -24.0),
                maxs: Vec3::new(15.0, 15.0, 32.0),
                crouch_maxs_z: 4.0,
            },
            links: LinkParams {
                link_radius: 256.0,
                step_height: 18.0,
                climb_height: 44.0,
                climb_reach: 48.0,
                max_fall_height: 224.0,
                jump_height: 44.0,
                max_jump_distance: 140.0,
                waterjump_height: 32.0,
                trace_step: 16.0,
                arc_segments: 8,
                gravity: 800.0,
                jumppad_land_tolerance: 72.0,
                jumppad_sim_step: 0.05,
                jumppad_max_flight_time: 4.0,
                teleport_distance: 1.0,
            },
            search: SearchParams {
                heuristic: Heuristic::Manhattan,
                stop_when_goal_opened: true,
                max_expansions: Some(8192),
                missing_link_cost: 9999.0,
            },
            follow: FollowParams {
                reach_radius: 24.0,
                touch_radius: 10.0,
                node_search_radius: 128.0,
                node_search_growth: 2.0,
                node_search_tries: 3,
                max_replans: 4,
                node_timeout_ticks: 20,
                ticks_per_unit: 0.05,
                blocked_ticks: 15,
                blocked_epsilon: 1.0,
            },
            grid: GridParams {
                spacing: 96.0,
                min_separation: 48.0,
                drop_height: 512.0,
            },
        }
    }
}
