// Scenario harness for end-to-end navigation tests.
//
// A `TestLevel` is a brush world plus the node graph built from it the same
// way a real level load does it: grid generation, entity spawning, link
// discovery. A `SimBot` stands in for a bot entity. Each tick it asks its
// `AgentNav` for a movement goal and executes it with a deliberately simple
// movement model: walk in a straight line (stopped by anything solid), ride
// teleporters and jump pads when touching them.
//
// The only test-specific code is the movement model. Navigation itself runs
// through the same calls a game would make.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use tracing::{debug, info};
use waypoint_nav::config::NavConfig;
use waypoint_nav::grid::generate_grid;
use waypoint_nav::linking::{LinkReport, discover_links, simulate_flight};
use waypoint_nav::navigation::{AgentNav, FollowOutcome, MoveGoal};
use waypoint_nav::pathfinding::SearchContext;
use waypoint_nav::spawn::{JumpPadLaunch, SpawnEntity, spawn_all};
use waypoint_nav::trace::MASK_AISOLID;
use waypoint_nav::{BrushWorld, LinkType, NodeFilter, NodeFlags, NodeId, NodeStore, TraceWorld, Vec3};

/// Bots within this distance of a teleporter entry or pad trigger it.
pub const TRIGGER_RADIUS: f32 = 32.0;

/// Walking speed used by scenario bots, units per tick.
pub const BOT_SPEED: f32 = 16.0;

/// Height of the standing agent's origin above the floor.
pub const STAND: f32 = 24.0;

/// A brush world and its node graph.
pub struct TestLevel {
    pub world: BrushWorld,
    pub store: NodeStore,
    pub config: NavConfig,
    pub pads: Vec<JumpPadLaunch>,
    pub report: LinkReport,
}

impl TestLevel {
    pub fn new(world: BrushWorld, config: NavConfig) -> Self {
        Self {
            world,
            store: NodeStore::new(),
            config,
            pads: Vec::new(),
            report: LinkReport::default(),
        }
    }

    /// Generate grid nodes over `min..max`.
    pub fn add_grid(&mut self, min: Vec3, max: Vec3) -> usize {
        generate_grid(&mut self.store, &self.world, &self.config, min, max)
    }

    /// Spawn level entities, remembering jump pads for linking.
    pub fn spawn(&mut self, entities: &[SpawnEntity]) {
        let pads = spawn_all(&mut self.store, entities, &self.config.links);
        self.pads.extend(pads);
    }

    /// Parse a JSON entity list and spawn it.
    pub fn spawn_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let entities: Vec<SpawnEntity> = serde_json::from_str(json)?;
        self.spawn(&entities);
        Ok(())
    }

    /// Run link discovery over everything added so far.
    pub fn link(&mut self) -> &LinkReport {
        self.report = discover_links(&mut self.store, &self.world, &self.config, &self.pads);
        &self.report
    }

    /// Nearest node to `pos`, ignoring geometry.
    pub fn nearest(&self, pos: Vec3) -> Option<NodeId> {
        self.store.find_nearest(pos, NodeFilter::All)
    }

    /// All nodes with any of `flags`.
    pub fn nodes_with(&self, flags: NodeFlags) -> Vec<NodeId> {
        self.store
            .iter()
            .filter(|(_, n)| n.flags.intersects(flags))
            .map(|(id, _)| id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Floor slab with its top at z = 0 covering `x0..x1`, 256 wide in y.
fn floor(world: &mut BrushWorld, x0: f32, x1: f32) {
    world.add_solid(Vec3::new(x0, -128.0, -16.0), Vec3::new(x1, 128.0, 0.0));
}

/// Full-height wall across the level at `x..x+16`.
fn dividing_wall(world: &mut BrushWorld, x: f32) {
    world.add_solid(Vec3::new(x, -128.0, 0.0), Vec3::new(x + 16.0, 128.0, 512.0));
}

fn grid_row(level: &mut TestLevel, x0: f32, x1: f32) -> usize {
    level.add_grid(Vec3::new(x0, 0.0, -64.0), Vec3::new(x1, 0.0, 512.0))
}

/// A straight corridor with a 16-unit step at x = 480 and three roam spots.
pub fn corridor_level() -> TestLevel {
    let mut world = BrushWorld::new();
    floor(&mut world, -64.0, 1088.0);
    world.add_solid(Vec3::new(480.0, -128.0, 0.0), Vec3::new(1088.0, 128.0, 16.0));

    let mut level = TestLevel::new(world, NavConfig::default());
    grid_row(&mut level, 0.0, 1024.0);
    level.spawn(&[
        SpawnEntity::RoamSpot {
            origin: Vec3::new(48.0, 0.0, STAND),
        },
        SpawnEntity::RoamSpot {
            origin: Vec3::new(528.0, 0.0, 16.0 + STAND),
        },
        SpawnEntity::RoamSpot {
            origin: Vec3::new(1000.0, 0.0, 16.0 + STAND),
        },
    ]);
    level.link();
    level
}

/// Two rooms split by a wall at x = 500; a teleporter leads from the first
/// room (entry at x = 440) to the second (exit at x = 640).
pub fn teleporter_level() -> TestLevel {
    let mut world = BrushWorld::new();
    floor(&mut world, -64.0, 1088.0);
    dividing_wall(&mut world, 500.0);

    let mut level = TestLevel::new(world, NavConfig::default());
    grid_row(&mut level, 0.0, 448.0);
    grid_row(&mut level, 600.0, 1000.0);
    level.spawn(&[SpawnEntity::Teleporter {
        entry: Vec3::new(440.0, 0.0, STAND),
        exit: Vec3::new(640.0, 0.0, STAND),
    }]);
    level.link();
    level
}

/// Low floor with a 256-unit cliff up to a ledge at x = 512. A jump pad at
/// x = 300 throws the agent onto the ledge.
pub fn jumppad_level() -> TestLevel {
    let mut world = BrushWorld::new();
    floor(&mut world, -64.0, 1088.0);
    world.add_solid(Vec3::new(512.0, -128.0, 0.0), Vec3::new(1088.0, 128.0, 256.0));

    let mut level = TestLevel::new(world, NavConfig::default());
    grid_row(&mut level, 0.0, 448.0);
    grid_row(&mut level, 560.0, 1000.0);
    level.spawn(&[SpawnEntity::JumpPad {
        origin: Vec3::new(300.0, 0.0, STAND),
        velocity: Vec3::new(186.0, 0.0, 900.0),
    }]);
    level.link();
    level
}

/// Two rooms split by a wall, with no way across.
pub fn sealed_rooms_level() -> TestLevel {
    let mut world = BrushWorld::new();
    floor(&mut world, -64.0, 1088.0);
    dividing_wall(&mut world, 500.0);

    let mut level = TestLevel::new(world, NavConfig::default());
    grid_row(&mut level, 0.0, 448.0);
    grid_row(&mut level, 600.0, 1000.0);
    level.link();
    level
}

// ---------------------------------------------------------------------------
// Simulated bot
// ---------------------------------------------------------------------------

/// A bot driven by `AgentNav` with a minimal movement model.
pub struct SimBot {
    pub nav: AgentNav,
    pub position: Vec3,
    pub tick: u64,
    ctx: SearchContext,
    /// Nodes reached, in order.
    pub visited: Vec<NodeId>,
    /// Movement type of every distinct leg headed for.
    pub links_used: Vec<LinkType>,
    /// Every non-`Moving` outcome seen.
    pub events: Vec<FollowOutcome>,
    last_goal: Option<NodeId>,
}

impl SimBot {
    pub fn new(position: Vec3) -> Self {
        Self {
            nav: AgentNav::new(None, LinkType::empty()),
            position,
            tick: 0,
            ctx: SearchContext::new(),
            visited: Vec::new(),
            links_used: Vec::new(),
            events: Vec::new(),
            last_goal: None,
        }
    }

    /// One think-and-move tick.
    pub fn step(&mut self, level: &TestLevel) -> FollowOutcome {
        let outcome = self.nav.follow_path(
            &level.store,
            &level.world,
            &mut self.ctx,
            &level.config,
            self.position,
            self.tick,
        );
        if let Some(node) = self.nav.current_node() {
            if self.visited.last() != Some(&node) {
                self.visited.push(node);
            }
        }
        match &outcome {
            FollowOutcome::Moving(goal) => self.execute(level, *goal),
            FollowOutcome::Arrived(node) => {
                if self.visited.last() != Some(node) {
                    self.visited.push(*node);
                }
                self.events.push(outcome.clone());
            }
            other => self.events.push(other.clone()),
        }
        self.tick += 1;
        outcome
    }

    /// Tick until the bot arrives, fails, or goes idle. `None` if
    /// `max_ticks` pass first.
    pub fn run(&mut self, level: &TestLevel, max_ticks: u64) -> Option<FollowOutcome> {
        for _ in 0..max_ticks {
            match self.step(level) {
                FollowOutcome::Moving(_) | FollowOutcome::Replanning(_) => {}
                done => {
                    info!(tick = self.tick, outcome = ?done, "bot finished");
                    return Some(done);
                }
            }
        }
        None
    }

    /// Number of replans seen so far.
    pub fn replans_seen(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FollowOutcome::Replanning(_)))
            .count()
    }

    fn execute(&mut self, level: &TestLevel, goal: MoveGoal) {
        if self.last_goal != Some(goal.node) {
            self.last_goal = Some(goal.node);
            self.links_used.push(goal.link);
        }

        if goal.link.contains(LinkType::JUMPPAD) {
            let pad = level
                .pads
                .iter()
                .find(|p| level.store.origin(p.node).distance(self.position) <= TRIGGER_RADIUS);
            if let Some(pad) = pad {
                let origin = level.store.origin(pad.node);
                if let Some(landing) = simulate_flight(&level.world, &level.config, origin, pad.velocity) {
                    debug!(pad = %pad.node, landing = ?landing.position, "bot launched");
                    self.position = landing.position;
                    return;
                }
            }
        }

        self.walk_toward(level, goal.target);

        let entry = level.store.iter().find(|(_, n)| {
            n.flags.contains(NodeFlags::TELEPORTER_IN) && n.origin.distance(self.position) <= TRIGGER_RADIUS
        });
        if let Some((id, _)) = entry {
            if let Some(exit) = level.store.get(id.paired_exit()) {
                debug!(entry = %id, "bot teleported");
                self.position = exit.origin;
            }
        }
    }

    /// Straight-line move of at most `BOT_SPEED`. The box is raised by the
    /// step height so stairs do not stop it; walls and bodies do.
    fn walk_toward(&mut self, level: &TestLevel, target: Vec3) {
        let delta = target - self.position;
        let next = if delta.length() <= BOT_SPEED {
            target
        } else {
            self.position + delta.normalize() * BOT_SPEED
        };
        let agent = &level.config.agent;
        let mins = agent.mins + Vec3::new(0.0, 0.0, level.config.links.step_height);
        let tr = level
            .world
            .trace(self.position, mins, agent.maxs, next, None, MASK_AISOLID);
        self.position = tr.end_pos;
    }
}
