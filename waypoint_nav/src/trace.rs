// Collision query boundary between navigation and the game world.
//
// Navigation never looks at level geometry directly. Everything it knows
// about walls, floors and water comes from `TraceWorld`: sweep a box from one
// point to another and report how far it got, or ask what contents occupy a
// point. The host engine implements the trait over its BSP; `world.rs`
// provides a brush-list implementation for tools and tests.
//
// Content masks mirror in-game movement clipping. Link discovery runs
// against static geometry only (`MASK_NODESOLID`); runtime reachability
// checks made on behalf of a bot also collide with monsters and corpses
// (`MASK_AISOLID`).

use crate::types::{EntityId, Vec3};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What a volume is made of.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ContentFlags: u32 {
        const SOLID       = 1 << 0;
        /// Glass and grates: block movement, not sight.
        const WINDOW      = 1 << 1;
        const LAVA        = 1 << 3;
        const SLIME       = 1 << 4;
        const WATER       = 1 << 5;
        /// Non-solid climbable volume.
        const LADDER      = 1 << 6;
        const PLAYERCLIP  = 1 << 16;
        const MONSTERCLIP = 1 << 17;
        const MONSTER     = 1 << 25;
        const DEADMONSTER = 1 << 26;
    }
}

/// Geometry that blocks a walking player or bot.
pub const MASK_NODESOLID: ContentFlags = ContentFlags::SOLID
    .union(ContentFlags::PLAYERCLIP)
    .union(ContentFlags::MONSTERCLIP)
    .union(ContentFlags::WINDOW);

/// `MASK_NODESOLID` plus bodies, for traces made while a bot is moving.
pub const MASK_AISOLID: ContentFlags = MASK_NODESOLID
    .union(ContentFlags::MONSTER)
    .union(ContentFlags::DEADMONSTER);

/// Any liquid.
pub const MASK_LIQUID: ContentFlags = ContentFlags::WATER
    .union(ContentFlags::SLIME)
    .union(ContentFlags::LAVA);

/// Result of sweeping a box through the world.
#[derive(Clone, Debug)]
pub struct TraceResult {
    /// Portion of the move completed: 1.0 means nothing was hit.
    pub fraction: f32,
    /// Where the box stopped. Backed off slightly from any impact.
    pub end_pos: Vec3,
    /// The box started inside something it collides with.
    pub start_solid: bool,
    /// The whole move was inside solid.
    pub all_solid: bool,
    /// Normal of the surface hit, if any.
    pub normal: Option<Vec3>,
    /// Contents of what was hit.
    pub contents: ContentFlags,
    /// Entity hit; `None` for world geometry or no hit.
    pub entity: Option<EntityId>,
}

impl TraceResult {
    /// A trace that travelled all the way to `end`.
    pub fn clear(end: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_pos: end,
            start_solid: false,
            all_solid: false,
            normal: None,
            contents: ContentFlags::empty(),
            entity: None,
        }
    }

    pub fn hit_something(&self) -> bool {
        self.start_solid || self.fraction < 1.0
    }

    /// The hit surface faces upward enough to stand on.
    pub fn hit_floor(&self) -> bool {
        self.normal.is_some_and(|n| n.z > 0.7)
    }
}

/// Collision queries consumed by navigation.
pub trait TraceWorld {
    /// Sweep the box `mins..maxs` from `start` to `end`, colliding with
    /// contents in `mask` and ignoring `ignore`.
    fn trace(
        &self,
        start: Vec3,
        mins: Vec3,
        maxs: Vec3,
        end: Vec3,
        ignore: Option<EntityId>,
        mask: ContentFlags,
    ) -> TraceResult;

    /// Union of the contents of every volume containing `point`.
    fn point_contents(&self, point: Vec3) -> ContentFlags;

    /// The box can move from `start` to `end` without touching `mask`.
    fn is_clear(
        &self,
        start: Vec3,
        mins: Vec3,
        maxs: Vec3,
        end: Vec3,
        ignore: Option<EntityId>,
        mask: ContentFlags,
    ) -> bool {
        !self.trace(start, mins, maxs, end, ignore, mask).hit_something()
    }
}
