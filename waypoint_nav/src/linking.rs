// Link discovery: decides which node pairs are traversable, and how.
//
// Discovery runs once per level, after the store holds every node (loaded,
// generated by `grid.rs`, or declared by `spawn.rs`). It has two passes:
//
// 1. **Proximity pass.** For each source node, every node within
//    `links.link_radius` is classified by sweeping the agent box along the
//    movements a player can make: a ground walk with step-ups (MOVE, or STAIRS
//    when any step was taken), the same walk crouched (CROUCH), a ledge drop
//    (FALL), a ledge climb (CLIMB), a jump arc (JUMP), swimming (WATER),
//    leaving water (WATERJUMP) and ladder climbing (LADDER). Of the movements
//    that succeed, the cheapest wins; equal costs fall back to
//    `LinkType::preference_rank`.
// 2. **Jump-pad pass.** Each pad's flight is integrated under gravity until
//    the box lands. The nearest node to the landing spot receives a JUMPPAD
//    link from the pad and is flagged JUMPPAD_LAND.
//
// Classification is a pure function of node positions and geometry, so the
// proximity pass classifies sources in parallel and then inserts links in
// ascending source order. The result does not depend on thread scheduling.
//
// Pairs never classified: both nodes SERVERLINK (only the level knows how
// those connect), sources flagged TELEPORTER_IN or JUMPPAD (touching them
// moves the agent elsewhere), and pairs that already have a link. The last
// rule makes re-running discovery a no-op.
//
// See also: `spawn.rs` for declared links, `trace.rs` for the collision
// queries used here.

use crate::config::{LinkParams, NavConfig};
use crate::nodes::NodeStore;
use crate::spawn::JumpPadLaunch;
use crate::trace::{MASK_NODESOLID, TraceWorld};
use crate::types::{LinkType, NodeFilter, NodeFlags, NodeId, Vec3};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

/// A successful movement test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkCandidate {
    pub move_type: LinkType,
    pub distance: f32,
}

/// Summary of one discovery run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkReport {
    /// Links inserted by the proximity pass.
    pub added: usize,
    /// Pairs not classified because a link already existed.
    pub skipped_existing: usize,
    /// Links inserted by the jump-pad pass.
    pub jumppad_links: usize,
    /// Nodes left with no outgoing link.
    pub isolated: Vec<NodeId>,
}

/// Run both passes and report isolated nodes.
pub fn discover_links<W: TraceWorld + Sync>(
    store: &mut NodeStore,
    world: &W,
    config: &NavConfig,
    pads: &[JumpPadLaunch],
) -> LinkReport {
    let mut report = link_nodes(store, world, config);
    report.jumppad_links = link_jump_pads(store, world, config, pads);

    report.isolated = store
        .iter()
        .filter(|(_, n)| n.links.is_empty())
        .map(|(id, _)| id)
        .collect();
    for &id in &report.isolated {
        warn!(node = %id, origin = ?store.origin(id), "node has no outgoing links");
    }
    info!(
        nodes = store.len(),
        added = report.added,
        skipped_existing = report.skipped_existing,
        jumppad_links = report.jumppad_links,
        isolated = report.isolated.len(),
        "link discovery finished"
    );
    report
}

// ---------------------------------------------------------------------------
// Proximity pass
// ---------------------------------------------------------------------------

/// Classify every eligible pair and insert the resulting links. The returned
/// report has `jumppad_links` and `isolated` left empty.
pub fn link_nodes<W: TraceWorld + Sync>(
    store: &mut NodeStore,
    world: &W,
    config: &NavConfig,
) -> LinkReport {
    let snapshot: &NodeStore = store;
    let existing: FxHashSet<(NodeId, NodeId)> = snapshot
        .iter()
        .flat_map(|(from, n)| n.links.iter().map(move |l| (from, l.target)))
        .collect();
    let found: Vec<(Vec<(NodeId, LinkCandidate)>, usize)> = (0..snapshot.len() as u32)
        .into_par_iter()
        .map(|i| links_from(snapshot, &existing, world, config, NodeId(i)))
        .collect();

    let mut report = LinkReport::default();
    for (i, (candidates, skipped)) in found.into_iter().enumerate() {
        let from = NodeId(i as u32);
        report.skipped_existing += skipped;
        for (to, c) in candidates {
            if store.add_link(from, to, c.distance, c.move_type) {
                report.added += 1;
            }
        }
    }
    report
}

/// Links discovered from one source node, plus the number of pairs skipped
/// because they were already linked.
fn links_from<W: TraceWorld>(
    store: &NodeStore,
    existing: &FxHashSet<(NodeId, NodeId)>,
    world: &W,
    config: &NavConfig,
    from: NodeId,
) -> (Vec<(NodeId, LinkCandidate)>, usize) {
    let src = store.node(from);
    if src
        .flags
        .intersects(NodeFlags::TELEPORTER_IN | NodeFlags::JUMPPAD)
    {
        return (Vec::new(), 0);
    }

    let mut out = Vec::new();
    let mut skipped = 0;
    for (to, _) in store.nodes_within(src.origin, config.links.link_radius, NodeFilter::All) {
        if to == from {
            continue;
        }
        let dst = store.node(to);
        if src.flags.contains(NodeFlags::SERVERLINK) && dst.flags.contains(NodeFlags::SERVERLINK) {
            continue;
        }
        if existing.contains(&(from, to)) {
            skipped += 1;
            continue;
        }
        if let Some(c) = classify_link(world, config, src.origin, src.flags, dst.origin, dst.flags) {
            out.push((to, c));
        }
    }
    (out, skipped)
}

/// Test every movement from `from` to `to` and return the best one.
pub fn classify_link<W: TraceWorld>(
    world: &W,
    config: &NavConfig,
    from: Vec3,
    from_flags: NodeFlags,
    to: Vec3,
    to_flags: NodeFlags,
) -> Option<LinkCandidate> {
    let p = &config.links;
    let mins = config.agent.mins;
    let maxs = config.agent.maxs;
    let dz = to.z - from.z;
    let horiz = from.truncate().distance(to.truncate());
    let mut candidates: Vec<LinkCandidate> = Vec::new();

    let straight = |mask_maxs: Vec3| world.is_clear(from, mins, mask_maxs, to, None, MASK_NODESOLID);

    if from_flags.contains(NodeFlags::LADDER) && to_flags.contains(NodeFlags::LADDER) && straight(maxs) {
        candidates.push(LinkCandidate {
            move_type: LinkType::LADDER,
            distance: from.distance(to),
        });
    }

    let from_water = from_flags.contains(NodeFlags::WATER);
    let to_water = to_flags.contains(NodeFlags::WATER);
    if from_water && to_water && straight(maxs) {
        candidates.push(LinkCandidate {
            move_type: LinkType::WATER,
            distance: from.distance(to),
        });
    }
    if from_water && !to_water && dz > 0.0 && dz <= p.waterjump_height + p.step_height {
        let lip = Vec3::new(from.x, from.y, to.z);
        if world.is_clear(from, mins, maxs, lip, None, MASK_NODESOLID)
            && world.is_clear(lip, mins, maxs, to, None, MASK_NODESOLID)
        {
            candidates.push(LinkCandidate {
                move_type: LinkType::WATERJUMP,
                distance: horiz + dz,
            });
        }
    }

    if let Some((distance, stepped)) = walk(world, p, mins, maxs, from, to) {
        candidates.push(LinkCandidate {
            move_type: if stepped { LinkType::STAIRS } else { LinkType::MOVE },
            distance,
        });
    } else if let Some((distance, _)) = walk(world, p, mins, config.agent.crouched_maxs(), from, to) {
        candidates.push(LinkCandidate {
            move_type: LinkType::CROUCH,
            distance,
        });
    }

    if dz < -p.step_height && -dz <= p.max_fall_height {
        let over = Vec3::new(to.x, to.y, from.z);
        if world.is_clear(from, mins, maxs, over, None, MASK_NODESOLID)
            && world.is_clear(over, mins, maxs, to, None, MASK_NODESOLID)
        {
            candidates.push(LinkCandidate {
                move_type: LinkType::FALL,
                distance: horiz - dz,
            });
        }
    }

    if dz > p.step_height && dz <= p.climb_height && horiz <= p.climb_reach {
        let up = Vec3::new(from.x, from.y, to.z);
        if world.is_clear(from, mins, maxs, up, None, MASK_NODESOLID)
            && world.is_clear(up, mins, maxs, to, None, MASK_NODESOLID)
        {
            candidates.push(LinkCandidate {
                move_type: LinkType::CLIMB,
                distance: horiz + dz,
            });
        }
    }

    if horiz <= p.max_jump_distance && dz <= p.jump_height && !from_water {
        if let Some(distance) = jump_arc(world, p, mins, maxs, from, to) {
            candidates.push(LinkCandidate {
                move_type: LinkType::JUMP,
                distance,
            });
        }
    }

    candidates.into_iter().min_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.move_type.preference_rank().cmp(&b.move_type.preference_rank()))
    })
}

/// Walk the box along the ground from `from` to `to`, stepping up ledges up
/// to `step_height` and following the floor down by as much. Returns the
/// walked length and whether any step was taken, or `None` when the walk is
/// blocked, runs off a ledge, or ends away from `to`.
fn walk<W: TraceWorld>(
    world: &W,
    p: &LinkParams,
    mins: Vec3,
    maxs: Vec3,
    from: Vec3,
    to: Vec3,
) -> Option<(f32, bool)> {
    let offset = (to - from).truncate();
    let total = offset.length();
    if total < 1e-3 {
        return ((to.z - from.z).abs() <= p.step_height).then_some(((to.z - from.z).abs(), false));
    }
    let dir = offset / total;
    let step = p.trace_step.max(1.0);
    let segments = (total / step).ceil() as u32;

    let mut pos = from;
    let mut walked = 0.0;
    let mut stepped = false;
    let rise = Vec3::new(0.0, 0.0, p.step_height);

    for i in 1..=segments {
        let xy = from.truncate() + dir * (i as f32 * step).min(total);
        let flat = xy.extend(pos.z);

        let tr = world.trace(pos, mins, maxs, flat, None, MASK_NODESOLID);
        let moved = if !tr.hit_something() {
            flat
        } else {
            let up = world.trace(pos, mins, maxs, pos + rise, None, MASK_NODESOLID);
            if up.start_solid {
                return None;
            }
            let raised = up.end_pos;
            let ahead = xy.extend(raised.z);
            if !world.is_clear(raised, mins, maxs, ahead, None, MASK_NODESOLID) {
                return None;
            }
            stepped = true;
            ahead
        };

        let down = world.trace(moved, mins, maxs, moved - rise - rise, None, MASK_NODESOLID);
        if down.start_solid || !down.hit_floor() {
            return None;
        }
        if moved.z - down.end_pos.z > p.step_height {
            return None;
        }
        if (moved.z - down.end_pos.z).abs() > 1.0 && moved == flat {
            stepped = true;
        }
        walked += pos.distance(down.end_pos);
        pos = down.end_pos;
    }

    ((pos.z - to.z).abs() <= p.step_height).then_some((walked, stepped))
}

/// Sweep the box along a parabolic arc peaking `jump_height` above the higher
/// endpoint's line. Returns the arc length if every segment is clear.
fn jump_arc<W: TraceWorld>(
    world: &W,
    p: &LinkParams,
    mins: Vec3,
    maxs: Vec3,
    from: Vec3,
    to: Vec3,
) -> Option<f32> {
    let segments = p.arc_segments.max(1);
    let mut prev = from;
    let mut length = 0.0;
    for i in 1..=segments {
        let t = i as f32 / segments as f32;
        let lift = 4.0 * p.jump_height * t * (1.0 - t);
        let next = from.lerp(to, t) + Vec3::new(0.0, 0.0, lift);
        if !world.is_clear(prev, mins, maxs, next, None, MASK_NODESOLID) {
            return None;
        }
        length += prev.distance(next);
        prev = next;
    }
    Some(length)
}

// ---------------------------------------------------------------------------
// Jump-pad pass
// ---------------------------------------------------------------------------

/// Where a jump pad's flight ends and how far it travelled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landing {
    pub position: Vec3,
    pub flight_length: f32,
}

/// Integrate a launch from `origin` with `velocity` until the box lands on a
/// floor. Walls stop horizontal motion; the fall continues. `None` if the
/// flight outlasts `jumppad_max_flight_time` or starts inside solid.
pub fn simulate_flight<W: TraceWorld>(
    world: &W,
    config: &NavConfig,
    origin: Vec3,
    velocity: Vec3,
) -> Option<Landing> {
    let p = &config.links;
    let (mins, maxs) = (config.agent.mins, config.agent.maxs);
    let dt = p.jumppad_sim_step.max(1e-3);
    let mut pos = origin;
    let mut vel = velocity;
    let mut elapsed = 0.0;
    let mut length = 0.0;

    while elapsed < p.jumppad_max_flight_time {
        vel.z -= p.gravity * dt;
        let next = pos + vel * dt;
        let tr = world.trace(pos, mins, maxs, next, None, MASK_NODESOLID);
        if tr.start_solid {
            return None;
        }
        length += pos.distance(tr.end_pos);
        pos = tr.end_pos;
        if tr.hit_something() {
            if tr.hit_floor() {
                return Some(Landing {
                    position: pos,
                    flight_length: length,
                });
            }
            vel.x = 0.0;
            vel.y = 0.0;
            if vel.z > 0.0 && tr.normal.is_some_and(|n| n.z < -0.7) {
                vel.z = 0.0;
            }
        }
        elapsed += dt;
    }
    None
}

/// Link every pad to the node nearest its landing spot. Returns the number
/// of links added.
pub fn link_jump_pads<W: TraceWorld>(
    store: &mut NodeStore,
    world: &W,
    config: &NavConfig,
    pads: &[JumpPadLaunch],
) -> usize {
    let mut added = 0;
    for pad in pads {
        let origin = store.origin(pad.node);
        let Some(landing) = simulate_flight(world, config, origin, pad.velocity) else {
            warn!(pad = %pad.node, "jump pad flight never lands");
            continue;
        };
        let target = store
            .nodes_within(landing.position, config.links.jumppad_land_tolerance, NodeFilter::All)
            .into_iter()
            .map(|(id, _)| id)
            .find(|&id| id != pad.node);
        let Some(target) = target else {
            warn!(
                pad = %pad.node,
                landing = ?landing.position,
                "no node near jump pad landing"
            );
            continue;
        };
        if store.add_link(pad.node, target, landing.flight_length, LinkType::JUMPPAD) {
            added += 1;
        }
        store.insert_flags(target, NodeFlags::JUMPPAD_LAND);
        debug!(pad = %pad.node, target = %target, "jump pad linked");
    }
    added
}
