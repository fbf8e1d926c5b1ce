// Brush-list collision world.
//
// `BrushWorld` is a flat list of axis-aligned boxes, each with contents and an
// optional owning entity (a door, a lift, a monster). It implements
// `TraceWorld` by sweeping the query box against every brush: the brush is
// grown by the query box (Minkowski sum) and the sweep becomes a segment vs.
// box slab test. Level tools use it to preview node graphs without a BSP, and
// every navigation test builds its levels out of it.
//
// Touching is not colliding: a box resting exactly on a floor, or sliding
// along a wall, does not hit it. Only penetrating motion does. Impacts are
// backed off by `DIST_EPSILON` along the move so the reported end position is
// always outside solid.
//
// See also: `trace.rs` for the trait and content masks.

use crate::trace::{ContentFlags, TraceResult, TraceWorld};
use crate::types::{EntityId, Vec3};

/// Distance kept between a stopped box and the surface it hit.
pub const DIST_EPSILON: f32 = 0.03125;

/// An axis-aligned volume.
#[derive(Clone, Debug)]
pub struct Brush {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub contents: ContentFlags,
    pub entity: Option<EntityId>,
}

/// Collision world made of axis-aligned brushes.
#[derive(Clone, Debug, Default)]
pub struct BrushWorld {
    brushes: Vec<Brush>,
}

impl BrushWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a world brush with the given contents.
    pub fn add_brush(&mut self, mins: Vec3, maxs: Vec3, contents: ContentFlags) {
        self.brushes.push(Brush {
            mins: mins.min(maxs),
            maxs: mins.max(maxs),
            contents,
            entity: None,
        });
    }

    /// Add a solid world brush.
    pub fn add_solid(&mut self, mins: Vec3, maxs: Vec3) {
        self.add_brush(mins, maxs, ContentFlags::SOLID);
    }

    /// Add a brush owned by a game entity (door, lift, monster).
    pub fn add_entity_brush(
        &mut self,
        entity: EntityId,
        mins: Vec3,
        maxs: Vec3,
        contents: ContentFlags,
    ) {
        self.brushes.push(Brush {
            mins: mins.min(maxs),
            maxs: mins.max(maxs),
            contents,
            entity: Some(entity),
        });
    }

    /// Remove every brush owned by `entity` (a killed monster, an opened door).
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.brushes.retain(|b| b.entity != Some(entity));
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }
}

/// Entry into the grown brush along a sweep.
struct Entry {
    /// Parametric entry time; negative when the sweep starts inside.
    t_enter: f32,
    /// Parametric exit time.
    t_exit: f32,
    /// Axis whose slab was entered last, and the sign of the surface normal.
    axis: usize,
    normal_sign: f32,
}

/// Segment `start + t * delta` (t in [0, 1]) against the open box
/// `bmin..bmax`. Surfaces only touched, never crossed, are not reported.
fn sweep_box(start: Vec3, delta: Vec3, bmin: Vec3, bmax: Vec3) -> Option<Entry> {
    let s = start.to_array();
    let d = delta.to_array();
    let lo = bmin.to_array();
    let hi = bmax.to_array();

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut axis = 2;
    let mut normal_sign = 1.0;

    for a in 0..3 {
        if d[a].abs() < 1e-6 {
            // Parallel to this slab: must already be strictly inside it.
            if s[a] <= lo[a] || s[a] >= hi[a] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[a];
        let (t0, t1, sign) = if inv > 0.0 {
            ((lo[a] - s[a]) * inv, (hi[a] - s[a]) * inv, -1.0)
        } else {
            ((hi[a] - s[a]) * inv, (lo[a] - s[a]) * inv, 1.0)
        };
        if t0 > t_enter {
            t_enter = t0;
            axis = a;
            normal_sign = sign;
        }
        t_exit = t_exit.min(t1);
    }

    if t_enter >= t_exit || t_exit <= 0.0 || t_enter >= 1.0 {
        return None;
    }
    Some(Entry {
        t_enter,
        t_exit,
        axis,
        normal_sign,
    })
}

impl TraceWorld for BrushWorld {
    fn trace(
        &self,
        start: Vec3,
        mins: Vec3,
        maxs: Vec3,
        end: Vec3,
        ignore: Option<EntityId>,
        mask: ContentFlags,
    ) -> TraceResult {
        let delta = end - start;
        let length = delta.length();
        let mut result = TraceResult::clear(end);
        let mut best_t = 1.0f32;

        for brush in &self.brushes {
            if !brush.contents.intersects(mask) {
                continue;
            }
            if brush.entity.is_some() && brush.entity == ignore {
                continue;
            }
            // Grow the brush by the moving box so the box becomes a point.
            let grown_min = brush.mins - maxs;
            let grown_max = brush.maxs - mins;

            if length < 1e-6 {
                let inside = (0..3).all(|a| {
                    start[a] > grown_min[a] && start[a] < grown_max[a]
                });
                if inside {
                    result.start_solid = true;
                    result.all_solid = true;
                    result.fraction = 0.0;
                    result.end_pos = start;
                    result.contents = brush.contents;
                    result.entity = brush.entity;
                    return result;
                }
                continue;
            }

            let Some(entry) = sweep_box(start, delta, grown_min, grown_max) else {
                continue;
            };

            if entry.t_enter < 0.0 {
                // Started inside this brush.
                result.start_solid = true;
                if entry.t_exit >= 1.0 {
                    result.all_solid = true;
                }
                result.fraction = 0.0;
                result.end_pos = start;
                result.contents = brush.contents;
                result.entity = brush.entity;
                result.normal = None;
                best_t = 0.0;
                continue;
            }

            if entry.t_enter < best_t {
                best_t = entry.t_enter;
                let backed = (entry.t_enter - DIST_EPSILON / length).max(0.0);
                let mut normal = Vec3::ZERO;
                normal[entry.axis] = entry.normal_sign;
                result.fraction = backed;
                result.end_pos = start + delta * backed;
                result.normal = Some(normal);
                result.contents = brush.contents;
                result.entity = brush.entity;
            }
        }

        result
    }

    fn point_contents(&self, point: Vec3) -> ContentFlags {
        self.brushes
            .iter()
            .filter(|b| {
                (0..3).all(|a| point[a] > b.mins[a] && point[a] < b.maxs[a])
            })
            .fold(ContentFlags::empty(), |acc, b| acc | b.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{MASK_AISOLID, MASK_NODESOLID};

    const MINS: Vec3 = Vec3::new(-15.0, -15.0, -24.0);
    const MAXS: Vec3 = Vec3::new(15.0, 15.0, 32.0);

    /// A 1024-wide floor whose top is at z = 0.
    fn floor_world() -> BrushWorld {
        let mut world = BrushWorld::new();
        world.add_solid(Vec3::new(-512.0, -512.0, -16.0), Vec3::new(512.0, 512.0, 0.0));
        world
    }

    #[test]
    fn box_resting_on_floor_slides_freely() {
        let world = floor_world();
        let start = Vec3::new(0.0, 0.0, 24.0);
        let end = Vec3::new(200.0, 0.0, 24.0);
        let tr = world.trace(start, MINS, MAXS, end, None, MASK_NODESOLID);
        assert!(!tr.hit_something());
        assert_eq!(tr.end_pos, end);
    }

    #[test]
    fn dropping_box_lands_on_floor() {
        let world = floor_world();
        let start = Vec3::new(0.0, 0.0, 200.0);
        let end = Vec3::new(0.0, 0.0, -100.0);
        let tr = world.trace(start, MINS, MAXS, end, None, MASK_NODESOLID);
        assert!(tr.hit_something());
        assert!(tr.hit_floor());
        assert!((tr.end_pos.z - 24.0).abs() < 0.1, "landed at {}", tr.end_pos.z);
        assert!(tr.end_pos.z >= 24.0);
    }

    #[test]
    fn wall_stops_horizontal_sweep() {
        let mut world = floor_world();
        world.add_solid(Vec3::new(100.0, -64.0, 0.0), Vec3::new(116.0, 64.0, 128.0));
        let tr = world.trace(
            Vec3::new(0.0, 0.0, 24.0),
            MINS,
            MAXS,
            Vec3::new(200.0, 0.0, 24.0),
            None,
            MASK_NODESOLID,
        );
        assert!(tr.hit_something());
        assert!(tr.end_pos.x < 85.0 && tr.end_pos.x > 84.0);
        assert_eq!(tr.normal, Some(Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn masks_and_ignore_filter_brushes() {
        let mut world = floor_world();
        let monster = EntityId(7);
        world.add_entity_brush(
            monster,
            Vec3::new(90.0, -16.0, 0.0),
            Vec3::new(122.0, 16.0, 56.0),
            ContentFlags::MONSTER,
        );
        let start = Vec3::new(0.0, 0.0, 24.0);
        let end = Vec3::new(200.0, 0.0, 24.0);
        assert!(world.is_clear(start, MINS, MAXS, end, None, MASK_NODESOLID));
        let tr = world.trace(start, MINS, MAXS, end, None, MASK_AISOLID);
        assert_eq!(tr.entity, Some(monster));
        assert!(world.is_clear(start, MINS, MAXS, end, Some(monster), MASK_AISOLID));

        world.remove_entity(monster);
        assert!(world.is_clear(start, MINS, MAXS, end, None, MASK_AISOLID));
    }

    #[test]
    fn start_inside_solid_is_reported() {
        let world = floor_world();
        let tr = world.trace(
            Vec3::new(0.0, 0.0, 0.0),
            MINS,
            MAXS,
            Vec3::new(10.0, 0.0, 0.0),
            None,
            MASK_NODESOLID,
        );
        assert!(tr.start_solid);
        assert!(tr.all_solid);
        assert_eq!(tr.fraction, 0.0);
    }

    #[test]
    fn point_contents_unions_overlapping_volumes() {
        let mut world = floor_world();
        world.add_brush(
            Vec3::new(-64.0, -64.0, 0.0),
            Vec3::new(64.0, 64.0, 64.0),
            ContentFlags::WATER,
        );
        assert_eq!(world.point_contents(Vec3::new(0.0, 0.0, 10.0)), ContentFlags::WATER);
        assert_eq!(world.point_contents(Vec3::new(0.0, 0.0, -8.0)), ContentFlags::SOLID);
        assert!(world.point_contents(Vec3::new(0.0, 0.0, 100.0)).is_empty());
    }
}
