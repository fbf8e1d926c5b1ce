// waypoint_nav: bot navigation for a first-person shooter.
//
// This crate owns everything between "here is the level geometry" and "walk
// toward this point with this kind of move": the waypoint graph, discovery
// of traversable links, A* search, and per-bot path following. It knows
// nothing about weapons, items, or combat; bot decision logic calls in with
// goals and gets movement targets back.
//
// Module overview:
// - `types.rs`:       Vec3 re-export, NodeId/EntityId newtypes, NodeFlags, LinkType, NodeFilter.
// - `config.rs`:      NavConfig: every tuning constant, loadable from JSON.
// - `trace.rs`:       Collision boundary: ContentFlags, masks, TraceResult, the TraceWorld trait.
// - `world.rs`:       BrushWorld: axis-aligned brush world implementing TraceWorld.
// - `nodes.rs`:       NodeStore: the node arena and its links.
// - `spawn.rs`:       Server-linked nodes declared by level entities (teleporters, lifts, pads).
// - `grid.rs`:        Runtime node generation and floor snapping.
// - `linking.rs`:     Link discovery: movement classification plus the jump-pad flight pass.
// - `pathfinding.rs`: A* over the node store with a caller-owned SearchContext.
// - `navigation.rs`:  AgentNav: goals, path following, timeouts, replanning.
// - `prng`:           Re-exported from `waypoint_prng`: xoshiro256++ for roam goals.
//
// Typical level load: fill a `NodeStore` (loader or `grid::generate_grid`),
// `spawn::spawn_all` the level's teleporters/lifts/pads, then
// `linking::discover_links`. After that the store is read-only and any number
// of `AgentNav`s can follow paths through it, each with its own
// `SearchContext`.
//
// **Determinism.** Given the same store, geometry and seeds, every operation
// here produces the same result. Link discovery runs in parallel but inserts
// in node order; A* breaks ties by discovery order; randomness comes only
// from a seeded `NavRng`.

pub mod config;
pub mod grid;
pub mod linking;
pub mod navigation;
pub mod nodes;
pub mod pathfinding;
pub use waypoint_prng as prng;
pub mod spawn;
pub mod trace;
pub mod types;
pub mod world;

pub use config::NavConfig;
pub use navigation::{AgentNav, FollowOutcome, MoveGoal, NavError, ReplanReason};
pub use nodes::{Link, Node, NodeStore};
pub use pathfinding::{Path, PathError, SearchContext, find_path};
pub use trace::{ContentFlags, TraceResult, TraceWorld};
pub use types::{EntityId, LinkType, NodeFilter, NodeFlags, NodeId, Vec3};
pub use world::BrushWorld;
