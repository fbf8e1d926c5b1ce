// Core types shared across the navigation crate.
//
// Defines world positions (`Vec3`, Z up, in game units), the strongly-typed
// node and entity identifiers, and the bitsets that describe node properties
// (`NodeFlags`) and movement capabilities (`LinkType`). The bitsets are plain
// `bitflags` types so `&`, `|` and containment tests are defined once here
// and used everywhere else.
//
// See also: `nodes.rs` for the store that hands out `NodeId`s, `linking.rs`
// which classifies links by `LinkType`, `pathfinding.rs` which filters links
// by a `LinkType` mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// World-space position or direction. Z is up.
pub use glam::Vec3;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Index of a node in the `NodeStore`.
///
/// Indices are stable for the lifetime of a loaded level. `INVALID` is never
/// handed out by the store and is what agents hold when they have no node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The node stored right after this one. A TELEPORTER_IN node's exit
    /// always lives at this index.
    pub fn paired_exit(self) -> Self {
        if self.is_valid() {
            Self(self.0.saturating_add(1))
        } else {
            Self::INVALID
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "node#{}", self.0)
        } else {
            write!(f, "node#invalid")
        }
    }
}

/// Game entity number, as reported by collision traces (doors, lifts,
/// monsters, other players).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

// ---------------------------------------------------------------------------
// Node flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Properties of a navigation node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NodeFlags: u32 {
        /// Node is submerged.
        const WATER          = 1 << 0;
        /// Node sits on a ladder.
        const LADDER         = 1 << 1;
        /// Links of this node are declared by game entities, not discovered.
        const SERVERLINK     = 1 << 2;
        /// Node hangs in the air; never snapped to the floor.
        const FLOAT          = 1 << 3;
        /// Candidate destination for idle wandering.
        const BOTROAM        = 1 << 4;
        const JUMPPAD        = 1 << 5;
        const JUMPPAD_LAND   = 1 << 6;
        const PLATFORM       = 1 << 7;
        const TELEPORTER_IN  = 1 << 8;
        const TELEPORTER_OUT = 1 << 9;
        /// Must be touched, not merely approached, to count as reached.
        const REACHATTOUCH   = 1 << 10;
    }
}

/// Flag filter used by closest-node queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeFilter {
    /// Every node qualifies, whatever its flags.
    All,
    /// Only nodes sharing at least one bit with the given flags. An empty
    /// set therefore matches nothing.
    Any(NodeFlags),
}

impl NodeFilter {
    pub fn matches(self, flags: NodeFlags) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::Any(wanted) => flags.intersects(wanted),
        }
    }
}

// ---------------------------------------------------------------------------
// Movement types
// ---------------------------------------------------------------------------

bitflags! {
    /// Movement techniques. A link carries exactly one bit; an agent's mask
    /// carries every technique it may use.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LinkType: u32 {
        const MOVE      = 1 << 0;
        const STAIRS    = 1 << 1;
        const FALL      = 1 << 2;
        const CLIMB     = 1 << 3;
        const TELEPORT  = 1 << 4;
        const PLATFORM  = 1 << 5;
        const JUMPPAD   = 1 << 6;
        const WATER     = 1 << 7;
        const WATERJUMP = 1 << 8;
        const LADDER    = 1 << 9;
        const JUMP      = 1 << 10;
        const CROUCH    = 1 << 11;
    }
}

impl LinkType {
    /// What an agent may use unless it asks for more. Ladders are opt-in.
    pub const DEFAULT_MASK: Self = Self::all().difference(Self::LADDER);

    /// Empty masks mean "whatever the default allows".
    pub fn or_default_mask(self) -> Self {
        if self.is_empty() {
            Self::DEFAULT_MASK
        } else {
            self
        }
    }

    /// Tie-break order between movement types that reach the same node at
    /// the same cost. Lower is preferred. Masks with several bits rank as
    /// their most expensive bit.
    pub fn preference_rank(self) -> u8 {
        const ORDER: [LinkType; 12] = [
            LinkType::MOVE,
            LinkType::STAIRS,
            LinkType::FALL,
            LinkType::WATER,
            LinkType::WATERJUMP,
            LinkType::JUMPPAD,
            LinkType::PLATFORM,
            LinkType::TELEPORT,
            LinkType::CLIMB,
            LinkType::LADDER,
            LinkType::JUMP,
            LinkType::CROUCH,
        ];
        ORDER
            .iter()
            .rposition(|&t| self.contains(t))
            .map_or(u8::MAX, |i| i as u8)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}
