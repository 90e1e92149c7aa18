use std::time::Duration;

use scene_flow::{
    EntityDesc, EntityId, GameStateBag, InputSnapshot, Key, MovementConfig, Objective,
    ObjectiveEvent, ObjectiveTracked, ObjectiveTracker, Scene, SceneCommand, SceneWorld,
    SpriteEntity, TextureRegistry, TimerQueue, Vec2,
};
use serde_json::json;
use tracing::{debug, info};

use super::{drive_character, setup_platformer, spawn_character, GROUND_TOP, PLAYER_NAME};

pub(crate) const PLAYER_X: f32 = 150.0;
pub(crate) const OBSTACLE_SIZE: Vec2 = Vec2::new(60.0, 60.0);
pub(crate) const FINISH_LINE_NAME: &str = "finish_line";
pub(crate) const OBSTACLE_NAME: &str = "obstacle";
const BOOST_SIZE: Vec2 = Vec2::new(40.0, 40.0);
const OBSTACLE_COUNT: usize = 20;
const BOOST_COUNT: usize = 8;
const FIRST_OBSTACLE_AT: f32 = 300.0;
const LAST_OBSTACLE_BEFORE_FINISH: f32 = 200.0;
const END_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RunnerTuning {
    pub(crate) time_limit: Duration,
    /// Course length in pixels.
    pub(crate) distance: f32,
    pub(crate) max_speed: f32,
    /// Base speed gain per press, scaled by press cadence.
    pub(crate) press_increment: f32,
    pub(crate) decay_per_second: f32,
    /// Idle time before speed starts to decay.
    pub(crate) decay_grace: Duration,
    pub(crate) obstacle_factor: f32,
    /// Minimum time between two hits of the same obstacle.
    pub(crate) obstacle_cooldown: Duration,
    pub(crate) boost_factor: f32,
    pub(crate) boost_duration: Duration,
    pub(crate) jump_speed: f32,
}

impl Default for RunnerTuning {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_millis(30_000),
            distance: 10_000.0,
            max_speed: 800.0,
            press_increment: 10.0,
            decay_per_second: 50.0,
            decay_grace: Duration::from_millis(500),
            obstacle_factor: 0.3,
            obstacle_cooldown: Duration::from_millis(1000),
            boost_factor: 1.5,
            boost_duration: Duration::from_millis(2000),
            jump_speed: -500.0,
        }
    }
}

impl RunnerTuning {
    /// Rapid presses count more than slow ones.
    pub(crate) fn cadence_multiplier(since_last_press: Option<Duration>) -> f32 {
        match since_last_press {
            Some(gap) if gap < Duration::from_millis(200) => 1.5,
            Some(gap) if gap < Duration::from_millis(400) => 1.0,
            _ => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObstacleKind {
    Ground,
    Raised,
    Air,
}

impl ObstacleKind {
    /// Ground-level obstacles alternate with air ones so a single jump
    /// never has to clear two blocking obstacles.
    fn for_index(index: usize) -> Self {
        match index % 4 {
            0 => Self::Ground,
            2 => Self::Raised,
            _ => Self::Air,
        }
    }

    fn bottom(self) -> f32 {
        match self {
            Self::Ground => 550.0,
            Self::Raised => 520.0,
            Self::Air => 405.0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ground => "suelo",
            Self::Raised => "elevado",
            Self::Air => "aire",
        }
    }
}

#[derive(Debug, Clone)]
struct CourseObject {
    entity: EntityId,
    course_x: f32,
    bottom: f32,
    size: Vec2,
    /// Course time of the last hit or pickup.
    touched_at: Option<Duration>,
}

impl CourseObject {
    fn overlaps(&self, distance: f32, player_feet: f32, player_size: Vec2) -> bool {
        let world_x = course_to_world(self.course_x, distance);
        let horizontal = (world_x - PLAYER_X).abs() < (self.size.x + player_size.x) * 0.5;
        let vertical =
            self.bottom - self.size.y < player_feet && player_feet - player_size.y < self.bottom;
        horizontal && vertical
    }
}

fn course_to_world(course_x: f32, distance: f32) -> f32 {
    PLAYER_X + course_x - distance
}

#[derive(Debug, Default)]
struct RunnerProgress {
    finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunnerPhase {
    Running,
    Finished,
    TimedOut,
}

/// Timed runner. Space presses build speed, idling bleeds it, obstacles
/// cut it and boosts multiply it for a while.
pub(crate) struct RunnerScene {
    tuning: RunnerTuning,
    textures: TextureRegistry,
    player: Option<SpriteEntity>,
    obstacles: Vec<CourseObject>,
    boosts: Vec<CourseObject>,
    finish_line: Option<EntityId>,
    hud: Option<EntityId>,
    phase: RunnerPhase,
    elapsed: Duration,
    distance: f32,
    speed: f32,
    last_press: Option<Duration>,
    boost_until: Option<Duration>,
    progress: RunnerProgress,
    tracker: ObjectiveTracker<RunnerProgress>,
    timers: TimerQueue<RunnerPhase>,
}

impl RunnerScene {
    pub(crate) fn new(tuning: RunnerTuning) -> Self {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(
            Objective::manual("reach_finish", "Llega a la meta antes de que acabe el tiempo")
                .when(|progress: &RunnerProgress| progress.finished),
        );
        Self {
            tuning,
            textures: TextureRegistry::new(),
            player: None,
            obstacles: Vec::new(),
            boosts: Vec::new(),
            finish_line: None,
            hud: None,
            phase: RunnerPhase::Running,
            elapsed: Duration::ZERO,
            distance: 0.0,
            speed: 0.0,
            last_press: None,
            boost_until: None,
            progress: RunnerProgress::default(),
            tracker,
            timers: TimerQueue::new(),
        }
    }

    pub(crate) fn with_textures(mut self, textures: TextureRegistry) -> Self {
        self.textures = textures;
        self
    }

    fn effective_speed(&self) -> f32 {
        match self.boost_until {
            Some(until) if self.elapsed < until => self.speed * self.tuning.boost_factor,
            _ => self.speed,
        }
    }

    fn spawn_course(&mut self, world: &mut SceneWorld) {
        let last = self.tuning.distance - LAST_OBSTACLE_BEFORE_FINISH;
        let spacing = (last - FIRST_OBSTACLE_AT) / (OBSTACLE_COUNT - 1) as f32;
        for index in 0..OBSTACLE_COUNT {
            let kind = ObstacleKind::for_index(index);
            let course_x = FIRST_OBSTACLE_AT + spacing * index as f32;
            let position = Vec2::new(course_to_world(course_x, 0.0), kind.bottom());
            let entity = world.spawn(
                EntityDesc::new(OBSTACLE_NAME, position)
                    .with_texture(&format!("obstacle_{}", kind.label()))
                    .with_label(kind.label()),
            );
            self.obstacles.push(CourseObject {
                entity,
                course_x,
                bottom: kind.bottom(),
                size: OBSTACLE_SIZE,
                touched_at: None,
            });
        }

        for index in 0..BOOST_COUNT {
            let course_x = FIRST_OBSTACLE_AT + spacing * (2 * index + 1) as f32 + spacing * 0.5;
            let bottom = if index % 2 == 0 { 510.0 } else { 395.0 };
            let entity = world.spawn(
                EntityDesc::new("boost", Vec2::new(course_to_world(course_x, 0.0), bottom))
                    .with_texture("boost"),
            );
            self.boosts.push(CourseObject {
                entity,
                course_x,
                bottom,
                size: BOOST_SIZE,
                touched_at: None,
            });
        }

        self.finish_line = Some(world.spawn(EntityDesc::new(
            FINISH_LINE_NAME,
            Vec2::new(course_to_world(self.tuning.distance, 0.0), GROUND_TOP),
        )));
    }

    fn apply_press(&mut self) {
        let since = self.last_press.map(|at| self.elapsed.saturating_sub(at));
        let gain = self.tuning.press_increment * RunnerTuning::cadence_multiplier(since);
        self.speed = (self.speed + gain).min(self.tuning.max_speed);
        self.last_press = Some(self.elapsed);
    }

    fn apply_decay(&mut self, dt: Duration) {
        let idle = self
            .last_press
            .map_or(self.elapsed, |at| self.elapsed.saturating_sub(at));
        if idle > self.tuning.decay_grace {
            self.speed = (self.speed - self.tuning.decay_per_second * dt.as_secs_f32()).max(0.0);
        }
    }

    fn collide(&mut self, world: &SceneWorld, player_id: EntityId) {
        let (Some(feet), Some(size)) = (
            world.position(player_id).map(|position| position.y),
            world.body(player_id).map(|body| body.size),
        ) else {
            return;
        };

        let cooldown = self.tuning.obstacle_cooldown;
        for obstacle in &mut self.obstacles {
            let ready = obstacle
                .touched_at
                .map_or(true, |at| self.elapsed.saturating_sub(at) >= cooldown);
            if ready && obstacle.overlaps(self.distance, feet, size) {
                obstacle.touched_at = Some(self.elapsed);
                self.speed *= self.tuning.obstacle_factor;
                debug!(course_x = obstacle.course_x, speed = self.speed, "obstacle_hit");
            }
        }

        for boost in &mut self.boosts {
            if boost.touched_at.is_none() && boost.overlaps(self.distance, feet, size) {
                boost.touched_at = Some(self.elapsed);
                self.boost_until = Some(self.elapsed + self.tuning.boost_duration);
                debug!(course_x = boost.course_x, "boost_collected");
            }
        }
    }

    fn sync_course(&self, world: &mut SceneWorld) {
        for object in self.obstacles.iter().chain(&self.boosts) {
            let x = course_to_world(object.course_x, self.distance);
            world.set_position(object.entity, Vec2::new(x, object.bottom));
        }
        for boost in self.boosts.iter().filter(|boost| boost.touched_at.is_some()) {
            if let Some(entity) = world.find_entity_mut(boost.entity) {
                entity.visible = false;
            }
        }
        if let Some(finish) = self.finish_line {
            let x = course_to_world(self.tuning.distance, self.distance);
            world.set_position(finish, Vec2::new(x, GROUND_TOP));
        }
        if let Some(hud) = self.hud {
            let remaining = self.tuning.time_limit.saturating_sub(self.elapsed);
            world.set_label(
                hud,
                Some(format!(
                    "Tiempo: {:.1}s  Velocidad: {:.0}  Distancia: {:.0}/{:.0}",
                    remaining.as_secs_f32(),
                    self.effective_speed(),
                    self.distance.min(self.tuning.distance),
                    self.tuning.distance
                )),
            );
        }
    }

    fn finish(&mut self, state: &mut dyn GameStateBag) {
        self.phase = RunnerPhase::Finished;
        self.progress.finished = true;
        let events = self.tracker.evaluate(&mut self.progress);
        if events.contains(&ObjectiveEvent::ChallengeCompleted) {
            state.update_state("runner.best_time_ms", json!(self.elapsed.as_millis() as u64));
            self.timers.schedule(END_DELAY, RunnerPhase::Finished);
        }
        info!(elapsed_ms = self.elapsed.as_millis() as u64, "runner_finished");
    }

    fn time_out(&mut self) {
        self.phase = RunnerPhase::TimedOut;
        if self.tracker.fail_challenge(&mut self.progress).is_some() {
            self.timers.schedule(END_DELAY, RunnerPhase::TimedOut);
        }
        info!(distance = self.distance, "runner_timed_out");
    }
}

impl Scene for RunnerScene {
    fn load(&mut self, world: &mut SceneWorld, _state: &mut dyn GameStateBag) {
        setup_platformer(world);
        self.player = Some(spawn_character(
            world,
            &mut self.textures,
            PLAYER_NAME,
            "player",
            Vec2::new(PLAYER_X, GROUND_TOP),
            MovementConfig {
                speed: 0.0,
                jump_speed: self.tuning.jump_speed,
                allow_jump: true,
            },
        ));
        self.spawn_course(world);
        self.hud = Some(world.spawn(EntityDesc::new("runner_hud", Vec2::new(400.0, 30.0))));
        info!(
            obstacles = self.obstacles.len(),
            boosts = self.boosts.len(),
            distance = self.tuning.distance,
            time_limit_ms = self.tuning.time_limit.as_millis() as u64,
            "runner_ready"
        );
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        for phase in self.timers.advance(fixed_dt) {
            match phase {
                RunnerPhase::Finished => return SceneCommand::complete(),
                RunnerPhase::TimedOut => return SceneCommand::fail(),
                RunnerPhase::Running => {}
            }
        }
        if self.phase != RunnerPhase::Running {
            return SceneCommand::None;
        }

        self.elapsed += fixed_dt;
        if input.just_pressed(Key::Space) {
            self.apply_press();
        } else {
            self.apply_decay(fixed_dt);
        }

        // Space drives speed here, so only a fresh Up press jumps.
        let jump = InputSnapshot::empty().with_key_down(Key::Up, input.just_pressed(Key::Up));
        let Some(player) = self.player.as_mut() else {
            return SceneCommand::None;
        };
        drive_character(player, world, &jump);
        let player_id = player.id();

        self.distance += self.effective_speed() * fixed_dt.as_secs_f32();
        self.collide(world, player_id);
        self.sync_course(world);

        if self.distance >= self.tuning.distance {
            self.finish(state);
        } else if self.elapsed >= self.tuning.time_limit {
            self.time_out();
        }
        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.timers.cancel_all();
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!(
            "Runner {:.0}/{:.0} @ {:.0}",
            self.distance, self.tuning.distance, self.speed
        ))
    }
}
