// End-to-end navigation scenarios.
//
// Each test builds a brush level through the real load pipeline (grid
// generation, entity spawning, link discovery) and drives a `SimBot` through
// it tick by tick, checking where it goes and how navigation reports
// success and failure.
//
// Set `RUST_LOG=waypoint_nav=debug` to see discovery and replanning logs.

use tracing_subscriber::EnvFilter;
use waypoint_nav::linking::discover_links;
use waypoint_nav::navigation::{FollowOutcome, NavError, ReplanReason, pick_roam_goal};
use waypoint_nav::pathfinding::find_path_once;
use waypoint_nav::trace::ContentFlags;
use waypoint_nav::{EntityId, LinkType, NavConfig, NodeFlags, Vec3};
use waypoint_prng::NavRng;
use waypoint_scenarios::{
    STAND, SimBot, TestLevel, corridor_level, jumppad_level, sealed_rooms_level, teleporter_level,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start() -> Vec3 {
    Vec3::new(0.0, 0.0, STAND)
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

/// Walk the corridor end to end, climbing the step on the way.
#[test]
fn corridor_walk() {
    init_logging();
    let level = corridor_level();
    assert!(level.report.isolated.is_empty(), "isolated: {:?}", level.report.isolated);

    let goal = level.nearest(Vec3::new(960.0, 0.0, 16.0 + STAND)).unwrap();
    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);
    let outcome = bot.run(&level, 500);

    assert_eq!(outcome, Some(FollowOutcome::Arrived(goal)));
    assert_eq!(bot.replans_seen(), 0);
    assert!(bot.links_used.contains(&LinkType::STAIRS), "links: {:?}", bot.links_used);
    assert!(
        bot.links_used
            .iter()
            .all(|l| *l == LinkType::MOVE || *l == LinkType::STAIRS)
    );
    assert!(bot.position.distance(level.store.origin(goal)) <= level.config.follow.reach_radius);
}

/// The only way into the second room is the teleporter.
#[test]
fn teleporter_crossing() {
    init_logging();
    let level = teleporter_level();
    let tin = level.nodes_with(NodeFlags::TELEPORTER_IN)[0];
    let tout = tin.paired_exit();
    assert!(level.store.flags(tout).contains(NodeFlags::TELEPORTER_OUT));

    let goal = level.nearest(Vec3::new(984.0, 0.0, STAND)).unwrap();
    let plan = find_path_once(
        &level.store,
        level.nearest(start()).unwrap(),
        goal,
        LinkType::DEFAULT_MASK,
        &level.config.search,
    )
    .unwrap();
    assert!(plan.nodes.windows(2).any(|w| w == [tin, tout]), "path: {:?}", plan.nodes);

    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);
    assert_eq!(bot.run(&level, 500), Some(FollowOutcome::Arrived(goal)));
    // Touching the entry lands the bot on the exit; it never walks the
    // teleport link itself.
    assert!(bot.visited.contains(&tout));
    assert!(!bot.visited.contains(&tin));
    assert!(!bot.links_used.contains(&LinkType::TELEPORT));
    assert!(bot.position.x > 900.0);
}

/// The ledge is only reachable through the jump pad.
#[test]
fn jump_pad_to_ledge() {
    init_logging();
    let level = jumppad_level();
    assert_eq!(level.report.jumppad_links, 1);
    let pad = level.pads[0].node;
    let landing = level.store.links(pad)[0].target;
    assert!(level.store.flags(landing).contains(NodeFlags::JUMPPAD_LAND));
    assert!(level.store.origin(landing).z > 256.0);

    let goal = level.nearest(Vec3::new(944.0, 0.0, 256.0 + STAND)).unwrap();
    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);
    assert_eq!(bot.run(&level, 500), Some(FollowOutcome::Arrived(goal)));
    assert!(bot.links_used.contains(&LinkType::JUMPPAD));
    assert!(bot.position.z > 256.0);

    // Without the jump-pad bit in the mask the ledge is out of reach.
    let walk_only = LinkType::DEFAULT_MASK.difference(LinkType::JUMPPAD);
    let start_node = level.nearest(start()).unwrap();
    assert!(find_path_once(&level.store, start_node, goal, walk_only, &level.config.search).is_err());
}

/// A goal behind a solid wall is retried a bounded number of times, then
/// abandoned.
#[test]
fn sealed_goal_is_abandoned() {
    init_logging();
    let level = sealed_rooms_level();
    let goal = level.nearest(Vec3::new(984.0, 0.0, STAND)).unwrap();
    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);

    let outcome = bot.run(&level, 100);
    let attempts = level.config.follow.max_replans + 1;
    assert_eq!(
        outcome,
        Some(FollowOutcome::Failed(NavError::RetriesExhausted { attempts }))
    );
    assert_eq!(bot.replans_seen(), level.config.follow.max_replans as usize);
    assert_eq!(bot.nav.goal(), None);
    assert!(bot.position.x < 500.0);
}

/// A door closing mid-route blocks the bot; once it opens, a new goal gets
/// through.
#[test]
fn door_blocks_then_opens() {
    init_logging();
    let mut level = corridor_level();
    let goal = level.nearest(Vec3::new(960.0, 0.0, 16.0 + STAND)).unwrap();
    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);
    for _ in 0..5 {
        bot.step(&level);
    }

    let door = EntityId(99);
    level.world.add_entity_brush(
        door,
        Vec3::new(600.0, -128.0, 0.0),
        Vec3::new(616.0, 128.0, 256.0),
        ContentFlags::SOLID,
    );
    let outcome = bot.run(&level, 1000);
    assert!(
        matches!(outcome, Some(FollowOutcome::Failed(NavError::RetriesExhausted { .. }))),
        "{outcome:?}"
    );
    assert!(bot.events.iter().any(|e| matches!(
        e,
        FollowOutcome::Replanning(ReplanReason::Blocked | ReplanReason::NodeTimeout(_))
    )));
    assert!(bot.position.x < 600.0);

    level.world.remove_entity(door);
    bot.nav.set_goal(goal);
    assert_eq!(bot.run(&level, 500), Some(FollowOutcome::Arrived(goal)));
}

/// Re-running discovery on a linked level changes nothing.
#[test]
fn relinking_is_idempotent() {
    init_logging();
    for mut level in [corridor_level(), teleporter_level(), jumppad_level()] {
        let before: Vec<_> = level.store.ids().map(|id| level.store.links(id).to_vec()).collect();
        let report = discover_links(&mut level.store, &level.world, &level.config, &level.pads);
        assert_eq!(report.added, 0);
        assert_eq!(report.jumppad_links, 0);
        let after: Vec<_> = level.store.ids().map(|id| level.store.links(id).to_vec()).collect();
        assert_eq!(before, after);
    }
}

/// Idle wandering between roam spots.
#[test]
fn roaming_between_spots() {
    init_logging();
    let level = corridor_level();
    let spots = level.nodes_with(NodeFlags::BOTROAM);
    assert_eq!(spots.len(), 3);

    let mut rng = NavRng::new(42);
    let mut bot = SimBot::new(start());
    let mut last = None;
    for _ in 0..5 {
        let exclude: Vec<_> = last.into_iter().collect();
        let goal = pick_roam_goal(&level.store, &mut rng, &exclude).unwrap();
        assert!(spots.contains(&goal));
        assert_ne!(Some(goal), last);
        bot.nav.set_goal(goal);
        assert_eq!(bot.run(&level, 500), Some(FollowOutcome::Arrived(goal)));
        last = Some(goal);
    }
}

/// Same level, same start: same route and timing.
#[test]
fn runs_are_deterministic() {
    init_logging();
    let run = || {
        let level = teleporter_level();
        let goal = level.nearest(Vec3::new(984.0, 0.0, STAND)).unwrap();
        let mut bot = SimBot::new(start());
        bot.nav.set_goal(goal);
        let outcome = bot.run(&level, 500);
        (outcome, bot.visited, bot.tick)
    };
    assert_eq!(run(), run());
}

/// Entities can come from a JSON entity list, and a JSON config can switch
/// the search to optimal mode without changing where the bot ends up.
#[test]
fn json_entities_and_config() {
    init_logging();
    let mut config = NavConfig::default();
    config.search = NavConfig::from_json(
        &NavConfig::default()
            .to_json()
            .unwrap()
            .replace("\"Manhattan\"", "\"Euclidean\"")
            .replace("\"stop_when_goal_opened\": true", "\"stop_when_goal_opened\": false"),
    )
    .unwrap()
    .search;
    assert!(!config.search.stop_when_goal_opened);

    let base = sealed_rooms_level();
    let mut level = TestLevel::new(base.world, config);
    level.add_grid(Vec3::new(0.0, 0.0, -64.0), Vec3::new(448.0, 0.0, 512.0));
    level.add_grid(Vec3::new(600.0, 0.0, -64.0), Vec3::new(1000.0, 0.0, 512.0));
    level
        .spawn_json(
            r#"[
                {"Teleporter": {"entry": [440.0, 0.0, 24.0], "exit": [640.0, 0.0, 24.0]}},
                {"RoamSpot": {"origin": [900.0, 0.0, 24.0]}}
            ]"#,
        )
        .unwrap();
    level.link();

    let goal = level.nodes_with(NodeFlags::BOTROAM)[0];
    let mut bot = SimBot::new(start());
    bot.nav.set_goal(goal);
    assert_eq!(bot.run(&level, 500), Some(FollowOutcome::Arrived(goal)));
    let tout = level.nodes_with(NodeFlags::TELEPORTER_OUT)[0];
    assert!(bot.visited.contains(&tout));
}
