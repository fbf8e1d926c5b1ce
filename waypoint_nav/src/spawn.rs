// Server-linked node declaration.
//
// Teleporters, lifts and jump pads move the agent by game logic, not by
// walking, so geometry cannot discover where they lead. The level's entities
// declare them here instead: each `SpawnEntity` appends its nodes, flags them
// SERVERLINK, and (for teleporters and platforms) inserts the links directly.
// Link discovery later skips pairs of SERVERLINK nodes and never adds
// outgoing links from teleporter entries or pads.
//
// A teleporter's entry and exit are appended back to back so that
// `NodeId::paired_exit` of the entry is always its exit.
//
// See also: `linking.rs` for the jump-pad flight pass that consumes
// `JumpPadLaunch`.

use crate::config::LinkParams;
use crate::nodes::NodeStore;
use crate::types::{LinkType, NodeFlags, NodeId, Vec3};
use serde::{Deserialize, Serialize};

/// A level entity that contributes navigation nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpawnEntity {
    /// `trigger_teleport` touch point and its destination.
    Teleporter { entry: Vec3, exit: Vec3 },
    /// A lift: stand at `bottom`, ride to `top`.
    Platform { bottom: Vec3, top: Vec3 },
    /// `trigger_push` pad and the velocity it launches with.
    JumpPad { origin: Vec3, velocity: Vec3 },
    /// Item spot or other place worth wandering to.
    RoamSpot { origin: Vec3 },
}

/// A jump pad waiting for its landing to be discovered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpPadLaunch {
    pub node: NodeId,
    pub velocity: Vec3,
}

/// Nodes created for one entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spawned {
    pub nodes: Vec<NodeId>,
    pub launch: Option<JumpPadLaunch>,
}

/// Append the nodes (and declared links) for `entity`.
pub fn spawn_entity(store: &mut NodeStore, entity: &SpawnEntity, params: &LinkParams) -> Spawned {
    match *entity {
        SpawnEntity::Teleporter { entry, exit } => {
            let tin = store.add_node(entry, NodeFlags::TELEPORTER_IN | NodeFlags::SERVERLINK);
            let tout = store.add_node(exit, NodeFlags::TELEPORTER_OUT | NodeFlags::SERVERLINK);
            debug_assert_eq!(tin.paired_exit(), tout);
            store.add_link(tin, tout, params.teleport_distance, LinkType::TELEPORT);
            Spawned {
                nodes: vec![tin, tout],
                launch: None,
            }
        }
        SpawnEntity::Platform { bottom, top } => {
            let flags = NodeFlags::PLATFORM | NodeFlags::SERVERLINK;
            let lo = store.add_node(bottom, flags);
            let hi = store.add_node(top, flags);
            let travel = (top.z - bottom.z).abs();
            store.add_link(lo, hi, travel, LinkType::PLATFORM);
            store.add_link(hi, lo, travel, LinkType::PLATFORM);
            Spawned {
                nodes: vec![lo, hi],
                launch: None,
            }
        }
        SpawnEntity::JumpPad { origin, velocity } => {
            let pad = store.add_node(origin, NodeFlags::JUMPPAD | NodeFlags::SERVERLINK);
            Spawned {
                nodes: vec![pad],
                launch: Some(JumpPadLaunch {
                    node: pad,
                    velocity,
                }),
            }
        }
        SpawnEntity::RoamSpot { origin } => {
            let spot = store.add_node(origin, NodeFlags::BOTROAM);
            Spawned {
                nodes: vec![spot],
                launch: None,
            }
        }
    }
}

/// Spawn every entity in order. Returns the jump pads for the flight pass.
pub fn spawn_all(
    store: &mut NodeStore,
    entities: &[SpawnEntity],
    params: &LinkParams,
) -> Vec<JumpPadLaunch> {
    entities
        .iter()
        .filter_map(|e| spawn_entity(store, e, params).launch)
        .collect()
}
