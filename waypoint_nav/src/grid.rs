// Runtime node generation.
//
// Levels shipped without a node file get a grid: the XY rectangle is scanned
// at `grid.spacing` and, in every column, the agent box is dropped from the
// top of the volume. Each floor it lands on becomes a node (the box's origin,
// so nodes sit at standing height). Below each floor the scan continues by
// stepping through the slab until the box fits again, so stacked floors all
// get nodes.
//
// `snap_to_floor` does the same drop for nodes placed by hand or by a loader
// that recorded eye or item positions.

use crate::config::NavConfig;
use crate::nodes::NodeStore;
use crate::trace::{ContentFlags, MASK_LIQUID, MASK_NODESOLID, TraceWorld};
use crate::types::{NodeFilter, NodeFlags, Vec3};
use tracing::{debug, info};

/// Node flags implied by the contents at a standing position.
pub fn flags_for_contents(contents: ContentFlags) -> NodeFlags {
    let mut flags = NodeFlags::empty();
    if contents.intersects(MASK_LIQUID) {
        flags |= NodeFlags::WATER;
    }
    if contents.contains(ContentFlags::LADDER) {
        flags |= NodeFlags::LADDER;
    }
    flags
}

/// Add a node on every floor found in the box `min..max`. Returns how many
/// nodes were added.
pub fn generate_grid<W: TraceWorld>(
    store: &mut NodeStore,
    world: &W,
    config: &NavConfig,
    min: Vec3,
    max: Vec3,
) -> usize {
    let spacing = config.grid.spacing.max(1.0);
    let step = config.links.trace_step.max(1.0);
    let (mins, maxs) = (config.agent.mins, config.agent.maxs);
    let mut added = 0;

    let mut x = min.x;
    while x <= max.x {
        let mut y = min.y;
        while y <= max.y {
            let mut top = max.z;
            while top > min.z {
                let start = Vec3::new(x, y, top);
                let tr = world.trace(start, mins, maxs, Vec3::new(x, y, min.z), None, MASK_NODESOLID);
                if tr.start_solid {
                    top -= step;
                    continue;
                }
                if !tr.hit_floor() {
                    break;
                }
                let pos = tr.end_pos;
                let crowded = !store
                    .nodes_within(pos, config.grid.min_separation, NodeFilter::All)
                    .is_empty();
                if !crowded {
                    let flags = flags_for_contents(world.point_contents(pos));
                    store.add_node(pos, flags);
                    added += 1;
                }
                top = pos.z - step;
            }
            y += spacing;
        }
        x += spacing;
    }

    info!(added, total = store.len(), "grid nodes generated");
    added
}

/// Drop every walkable node onto the floor below it. Nodes flagged FLOAT,
/// WATER or LADDER stay where they are. Returns how many nodes moved.
pub fn snap_to_floor<W: TraceWorld>(store: &mut NodeStore, world: &W, config: &NavConfig) -> usize {
    let keep = NodeFlags::FLOAT | NodeFlags::WATER | NodeFlags::LADDER;
    let (mins, maxs) = (config.agent.mins, config.agent.maxs);
    let mut moved = 0;

    for id in store.ids().collect::<Vec<_>>() {
        if store.flags(id).intersects(keep) {
            continue;
        }
        let origin = store.origin(id);
        let below = origin - Vec3::new(0.0, 0.0, config.grid.drop_height);
        let tr = world.trace(origin, mins, maxs, below, None, MASK_NODESOLID);
        if tr.start_solid {
            debug!(node = %id, "node starts in solid, not snapped");
            continue;
        }
        if tr.hit_floor() && tr.end_pos != origin {
            store.set_origin(id, tr.end_pos);
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BrushWorld;

    fn two_storey() -> BrushWorld {
        let mut world = BrushWorld::new();
        // Ground floor, top at z = 0.
        world.add_solid(Vec3::new(-256.0, -256.0, -16.0), Vec3::new(256.0, 256.0, 0.0));
        // Upper floor over the positive-x half, top at z = 192.
        world.add_solid(Vec3::new(0.0, -256.0, 176.0), Vec3::new(256.0, 256.0, 192.0));
        world
    }

    #[test]
    fn grid_finds_both_floors() {
        let world = two_storey();
        let mut store = NodeStore::new();
        let config = NavConfig::default();
        let added = generate_grid(
            &mut store,
            &world,
            &config,
            Vec3::new(-200.0, 0.0, -100.0),
            Vec3::new(200.0, 0.0, 400.0),
        );
        assert_eq!(added, store.len());
        let ground = store.iter().filter(|(_, n)| (n.origin.z - 24.0).abs() < 0.5).count();
        let upper = store.iter().filter(|(_, n)| (n.origin.z - 216.0).abs() < 0.5).count();
        assert!(ground >= 4, "ground nodes: {ground}");
        assert!(upper >= 2, "upper nodes: {upper}");
        assert_eq!(ground + upper, store.len());
    }

    #[test]
    fn grid_respects_min_separation() {
        let world = two_storey();
        let mut store = NodeStore::new();
        let mut config = NavConfig::default();
        config.grid.spacing = 16.0;
        config.grid.min_separation = 64.0;
        generate_grid(
            &mut store,
            &world,
            &config,
            Vec3::new(-200.0, 0.0, -100.0),
            Vec3::new(-100.0, 0.0, 100.0),
        );
        for (a, na) in store.iter() {
            for (b, nb) in store.iter() {
                if a != b {
                    assert!(na.origin.distance(nb.origin) > 64.0);
                }
            }
        }
    }

    #[test]
    fn grid_flags_water_nodes() {
        let mut world = two_storey();
        world.add_brush(
            Vec3::new(-256.0, -256.0, 0.0),
            Vec3::new(-100.0, 256.0, 64.0),
            ContentFlags::WATER,
        );
        let mut store = NodeStore::new();
        generate_grid(
            &mut store,
            &world,
            &NavConfig::default(),
            Vec3::new(-200.0, 0.0, -100.0),
            Vec3::new(-200.0, 0.0, 100.0),
        );
        assert_eq!(store.len(), 1);
        assert!(store.flags(crate::types::NodeId(0)).contains(NodeFlags::WATER));
    }

    #[test]
    fn snap_moves_walkable_nodes_only() {
        let world = two_storey();
        let mut store = NodeStore::new();
        let config = NavConfig::default();
        let walk = store.add_node(Vec3::new(-100.0, 0.0, 90.0), NodeFlags::empty());
        let float = store.add_node(Vec3::new(-120.0, 0.0, 90.0), NodeFlags::FLOAT);
        let moved = snap_to_floor(&mut store, &world, &config);
        assert_eq!(moved, 1);
        assert!((store.origin(walk).z - 24.0).abs() < 0.1);
        assert_eq!(store.origin(float).z, 90.0);
    }
}
