use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::progress::ProgressStore;

use super::machine::{MachineStep, SceneMachine};
use super::metrics::MetricsAccumulator;
use super::{InputSnapshot, SceneWorld};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stops the run after this many ticks even if the flow is unfinished.
    pub max_ticks: Option<u64>,
    /// Paces frames against the wall clock instead of feeding one fixed
    /// step per frame.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            realtime: false,
        }
    }
}

/// Produces the input for each simulation tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, scene_key: &str, world: &SceneWorld) -> InputSnapshot;
}

/// Never presses anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn snapshot_for_tick(&mut self, _scene_key: &str, _world: &SceneWorld) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FrameClock {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn max_ticks_per_frame(&self) -> u32 {
        self.max_ticks_per_frame
    }

    /// Adds one frame of elapsed time and returns how many ticks to run.
    pub fn push_frame(&mut self, raw_frame_dt: Duration) -> StepPlan {
        let clamped = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = plan.remaining_accumulator;
        plan
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: u64,
    pub scene_switches: u32,
    /// The flow reached its end, either by finishing or by a scene starting
    /// it over.
    pub finished: bool,
    pub final_scene: Option<String>,
    /// Scene keys in the order they were entered, repeats included.
    pub visited: Vec<String>,
}

/// Drives `machine` until the flow finishes, restarts, or the tick budget
/// runs out, then shuts it down.
pub fn run_headless<S, I>(
    machine: &mut SceneMachine<S>,
    input_source: &mut I,
    config: &LoopConfig,
) -> RunSummary
where
    S: ProgressStore,
    I: InputSource + ?Sized,
{
    let mut clock = FrameClock::new(config);
    let fixed_dt = clock.fixed_dt();
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut summary = RunSummary::default();

    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = config.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = clock.max_ticks_per_frame(),
        max_ticks = config.max_ticks,
        realtime = config.realtime,
        "loop_config"
    );

    if machine.active_key().is_none() && !machine.is_finished() {
        machine.start();
    }
    if let Some(key) = machine.active_key() {
        summary.visited.push(key.to_string());
    }

    let mut last_frame_instant = Instant::now();
    'frames: while !machine.is_finished() {
        let raw_frame_dt = if config.realtime {
            let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
            if elapsed < fixed_dt {
                thread::sleep(fixed_dt - elapsed);
            }
            let now = Instant::now();
            let raw = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            raw
        } else {
            fixed_dt
        };

        let step_plan = clock.push_frame(raw_frame_dt);
        summary.frames = summary.frames.saturating_add(1);

        for _ in 0..step_plan.ticks_to_run {
            if config.max_ticks.is_some_and(|limit| summary.ticks >= limit) {
                info!(ticks = summary.ticks, "tick_budget_exhausted");
                break 'frames;
            }
            let Some(scene_key) = machine.active_key().map(str::to_string) else {
                break 'frames;
            };

            let input = input_source.snapshot_for_tick(&scene_key, machine.world());
            let step = machine.update(fixed_dt, &input);
            summary.ticks = summary.ticks.saturating_add(1);
            metrics_accumulator.record_tick(fixed_dt);

            match step {
                MachineStep::Running => {}
                MachineStep::Switched { to, .. } => {
                    metrics_accumulator.record_scene_switch();
                    summary.visited.push(to);
                }
                MachineStep::Restarted { to, .. } => {
                    metrics_accumulator.record_scene_switch();
                    summary.visited.push(to);
                    break 'frames;
                }
                MachineStep::Finished => break 'frames,
            }
        }

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = clock.max_ticks_per_frame(),
                "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot() {
            info!(
                tps = snapshot.tps,
                ticks = snapshot.ticks,
                scene_switches = snapshot.scene_switches,
                entity_count = machine.world().entity_count(),
                scene = machine.active_key().unwrap_or("-"),
                "loop_metrics"
            );
        }
    }

    summary.scene_switches = machine.switch_count();
    summary.finished = machine.is_finished() || machine.completed_runs() > 0;
    summary.final_scene = machine.router().current_scene().map(|scene| scene.key.clone());
    machine.shutdown();

    info!(
        ticks = summary.ticks,
        frames = summary.frames,
        scene_switches = summary.scene_switches,
        finished = summary.finished,
        final_scene = summary.final_scene.as_deref().unwrap_or("-"),
        "run_finished"
    );
    summary
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
