use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::content::SceneDescriptor;
use crate::progress::{ProgressStore, SceneOutcome, SceneRouter};

use super::input::InputSnapshot;
use super::scene::{Scene, SceneCommand, SceneWorld};

pub type SceneFactory = Box<dyn Fn(&SceneDescriptor) -> Box<dyn Scene>>;

/// Registers how to build the scene for one descriptor key.
pub struct SceneEntry {
    key: String,
    factory: SceneFactory,
}

impl SceneEntry {
    pub fn new(
        key: &str,
        factory: impl Fn(&SceneDescriptor) -> Box<dyn Scene> + 'static,
    ) -> Self {
        Self {
            key: key.to_string(),
            factory: Box::new(factory),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneMachineError {
    #[error("scene '{key}' is in the scene table but has no registered scene")]
    MissingScene { key: String },
    #[error("scene '{key}' is registered more than once")]
    DuplicateScene { key: String },
    #[error("scene '{key}' is registered but not in the scene table")]
    UnknownScene { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineStep {
    Running,
    Switched { from: String, to: String },
    /// Progress was reset and the first scene is running again.
    Restarted { from: String, to: String },
    Finished,
}

struct ActiveScene {
    key: String,
    scene: Box<dyn Scene>,
}

/// Runs one scene at a time and moves between them through the router.
///
/// Every visit builds a fresh scene instance in a cleared world, so a
/// failed challenge that routes back to itself starts over.
pub struct SceneMachine<S: ProgressStore> {
    router: SceneRouter<S>,
    factories: HashMap<String, SceneFactory>,
    world: SceneWorld,
    active: Option<ActiveScene>,
    finished: bool,
    switch_count: u32,
    completed_runs: u32,
}

impl<S: ProgressStore> SceneMachine<S> {
    pub fn new(router: SceneRouter<S>, entries: Vec<SceneEntry>) -> Result<Self, SceneMachineError> {
        let mut factories = HashMap::with_capacity(entries.len());
        for entry in entries {
            if router.table().index_of(&entry.key).is_none() {
                return Err(SceneMachineError::UnknownScene { key: entry.key });
            }
            if factories.contains_key(&entry.key) {
                return Err(SceneMachineError::DuplicateScene { key: entry.key });
            }
            factories.insert(entry.key, entry.factory);
        }
        for descriptor in router.table().descriptors() {
            if !factories.contains_key(&descriptor.key) {
                return Err(SceneMachineError::MissingScene {
                    key: descriptor.key.clone(),
                });
            }
        }

        Ok(Self {
            router,
            factories,
            world: SceneWorld::default(),
            active: None,
            finished: false,
            switch_count: 0,
            completed_runs: 0,
        })
    }

    /// Loads the router's current scene. Returns `false` when there is
    /// nothing to run.
    pub fn start(&mut self) -> bool {
        self.unload_active();
        self.finished = false;
        match self.router.current_scene().cloned() {
            Some(descriptor) => {
                self.enter(&descriptor);
                true
            }
            None => {
                warn!("scene_table_empty");
                self.finished = true;
                false
            }
        }
    }

    pub fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> MachineStep {
        let Some(active) = self.active.as_mut() else {
            return MachineStep::Finished;
        };

        let command = active
            .scene
            .update(fixed_dt, input, &mut self.world, &mut self.router);
        self.world.apply_pending();
        self.world.step(fixed_dt);

        match command {
            SceneCommand::None => MachineStep::Running,
            SceneCommand::Transition { outcome, data } => self.transition(outcome, data),
            SceneCommand::Restart => self.restart(),
        }
    }

    /// Jumps straight to `key`, bypassing the descriptor links.
    pub fn go_to(&mut self, key: &str) -> bool {
        let Some(descriptor) = self.router.go_to_scene_by_key(key).cloned() else {
            return false;
        };
        self.unload_active();
        self.finished = false;
        self.save();
        self.enter(&descriptor);
        true
    }

    /// Unloads the active scene and writes progress a final time.
    pub fn shutdown(&mut self) {
        self.unload_active();
        self.router.shutdown();
        info!(switches = self.switch_count, "scene_machine_shutdown");
    }

    pub fn router(&self) -> &SceneRouter<S> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut SceneRouter<S> {
        &mut self.router
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.key.as_str())
    }

    pub fn debug_title(&self) -> Option<String> {
        self.active.as_ref().and_then(|active| active.scene.debug_title())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    /// How many times a scene restarted the flow from the beginning.
    pub fn completed_runs(&self) -> u32 {
        self.completed_runs
    }

    fn transition(&mut self, outcome: SceneOutcome, data: Value) -> MachineStep {
        let from = self.unload_active().unwrap_or_default();
        let next = self.router.resolve(outcome, data).cloned();
        self.save();

        match next {
            Some(descriptor) => {
                self.enter(&descriptor);
                self.switch_count = self.switch_count.saturating_add(1);
                info!(from = %from, to = %descriptor.key, ?outcome, "scene_switched");
                MachineStep::Switched {
                    from,
                    to: descriptor.key,
                }
            }
            None => {
                self.finished = true;
                info!(scene = %from, ?outcome, "scene_flow_finished");
                MachineStep::Finished
            }
        }
    }

    fn restart(&mut self) -> MachineStep {
        let from = self.unload_active().unwrap_or_default();
        self.router.reset_state();
        self.completed_runs = self.completed_runs.saturating_add(1);

        let Some(descriptor) = self.router.current_scene().cloned() else {
            self.finished = true;
            return MachineStep::Finished;
        };
        self.enter(&descriptor);
        self.switch_count = self.switch_count.saturating_add(1);
        info!(
            from = %from,
            to = %descriptor.key,
            completed_runs = self.completed_runs,
            "scene_flow_restarted"
        );
        MachineStep::Restarted {
            from,
            to: descriptor.key,
        }
    }

    fn enter(&mut self, descriptor: &SceneDescriptor) {
        let Some(factory) = self.factories.get(&descriptor.key) else {
            error!(scene = %descriptor.key, "scene_factory_missing");
            self.finished = true;
            return;
        };
        let mut scene = factory(descriptor);
        self.world.clear();
        scene.load(&mut self.world, &mut self.router);
        self.world.apply_pending();
        info!(
            scene = %descriptor.key,
            kind = descriptor.kind.as_str(),
            entity_count = self.world.entity_count(),
            progress = self.router.progress(),
            "scene_loaded"
        );
        self.active = Some(ActiveScene {
            key: descriptor.key.clone(),
            scene,
        });
    }

    fn unload_active(&mut self) -> Option<String> {
        let mut active = self.active.take()?;
        active.scene.unload(&mut self.world);
        self.world.clear();
        Some(active.key)
    }

    fn save(&mut self) {
        if let Err(error) = self.router.save_state() {
            warn!(error = %error, "progress_save_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::app::{EntityDesc, GameStateBag, Vec2};
    use crate::content::SceneTable;
    use crate::progress::{MemoryStore, ProgressSnapshot, PROGRESS_STORAGE_KEY};

    type Log = Rc<RefCell<Vec<String>>>;

    /// Ends with `command` after `ticks` updates and logs lifecycle calls.
    struct ScriptedScene {
        key: String,
        ticks: u32,
        command: SceneCommand,
        log: Log,
        elapsed: u32,
    }

    impl Scene for ScriptedScene {
        fn load(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
            world.spawn(EntityDesc::new(&self.key, Vec2::ZERO));
            let visits = state.get_state("visits", json!(0)).as_u64().unwrap_or(0);
            state.update_state("visits", json!(visits + 1));
            self.log.borrow_mut().push(format!("load:{}", self.key));
        }

        fn update(
            &mut self,
            _fixed_dt: Duration,
            _input: &InputSnapshot,
            _world: &mut SceneWorld,
            _state: &mut dyn GameStateBag,
        ) -> SceneCommand {
            self.elapsed += 1;
            if self.elapsed >= self.ticks {
                self.command.clone()
            } else {
                SceneCommand::None
            }
        }

        fn unload(&mut self, _world: &mut SceneWorld) {
            self.log.borrow_mut().push(format!("unload:{}", self.key));
        }
    }

    fn entry(key: &str, ticks: u32, command: SceneCommand, log: &Log) -> SceneEntry {
        let log = Rc::clone(log);
        SceneEntry::new(key, move |descriptor: &SceneDescriptor| -> Box<dyn Scene> {
            Box::new(ScriptedScene {
                key: descriptor.key.clone(),
                ticks,
                command: command.clone(),
                log: Rc::clone(&log),
                elapsed: 0,
            })
        })
    }

    fn table() -> SceneTable {
        SceneTable::new(vec![
            SceneDescriptor::presentation("Intro", Some("Trial")),
            SceneDescriptor::challenge("Trial", Some("End"), None),
            SceneDescriptor::presentation("End", None),
        ])
        .expect("table")
    }

    fn machine(trial_command: SceneCommand, log: &Log) -> SceneMachine<MemoryStore> {
        let router = SceneRouter::new(table(), MemoryStore::new());
        SceneMachine::new(
            router,
            vec![
                entry("Intro", 1, SceneCommand::advance(), log),
                entry("Trial", 2, trial_command, log),
                entry("End", 1, SceneCommand::advance(), log),
            ],
        )
        .expect("machine")
    }

    fn run_until_finished(machine: &mut SceneMachine<MemoryStore>, max_ticks: u32) -> Vec<MachineStep> {
        let mut steps = Vec::new();
        for _ in 0..max_ticks {
            let step = machine.update(Duration::from_millis(16), &InputSnapshot::empty());
            if step != MachineStep::Running {
                steps.push(step.clone());
            }
            if step == MachineStep::Finished {
                break;
            }
        }
        steps
    }

    #[test]
    fn registry_must_cover_table_exactly() {
        let log = Log::default();
        let missing = SceneMachine::new(
            SceneRouter::new(table(), MemoryStore::new()),
            vec![entry("Intro", 1, SceneCommand::None, &log)],
        );
        assert!(matches!(missing, Err(SceneMachineError::MissingScene { key }) if key == "Trial"));

        let unknown = SceneMachine::new(
            SceneRouter::new(table(), MemoryStore::new()),
            vec![entry("Bogus", 1, SceneCommand::None, &log)],
        );
        assert!(matches!(unknown, Err(SceneMachineError::UnknownScene { .. })));

        let duplicate = SceneMachine::new(
            SceneRouter::new(table(), MemoryStore::new()),
            vec![
                entry("Intro", 1, SceneCommand::None, &log),
                entry("Intro", 1, SceneCommand::None, &log),
            ],
        );
        assert!(matches!(duplicate, Err(SceneMachineError::DuplicateScene { .. })));
    }

    #[test]
    fn plays_the_flow_to_the_terminal_scene() {
        let log = Log::default();
        let mut machine = machine(SceneCommand::complete(), &log);
        assert!(machine.start());
        assert_eq!(machine.world().entity_count(), 1);

        let steps = run_until_finished(&mut machine, 20);

        assert_eq!(
            steps,
            vec![
                MachineStep::Switched {
                    from: "Intro".to_string(),
                    to: "Trial".to_string()
                },
                MachineStep::Switched {
                    from: "Trial".to_string(),
                    to: "End".to_string()
                },
                MachineStep::Finished,
            ]
        );
        assert!(machine.is_finished());
        assert_eq!(machine.active_key(), None);
        assert_eq!(machine.switch_count(), 2);
        assert_eq!(
            log.borrow().as_slice(),
            &[
                "load:Intro",
                "unload:Intro",
                "load:Trial",
                "unload:Trial",
                "load:End",
                "unload:End",
            ]
        );
    }

    #[test]
    fn failure_without_on_fail_restarts_with_a_fresh_instance() {
        let log = Log::default();
        let mut machine = machine(SceneCommand::fail(), &log);
        machine.start();
        machine.update(Duration::from_millis(16), &InputSnapshot::empty());

        for _ in 0..4 {
            machine.update(Duration::from_millis(16), &InputSnapshot::empty());
        }

        assert_eq!(machine.active_key(), Some("Trial"));
        let loads = log
            .borrow()
            .iter()
            .filter(|entry| entry.as_str() == "load:Trial")
            .count();
        assert_eq!(loads, 3);
        assert_eq!(machine.router().get_state("visits", json!(0)), json!(4));
    }

    #[test]
    fn transitions_persist_progress() {
        let log = Log::default();
        let mut machine = machine(SceneCommand::complete(), &log);
        machine.start();
        machine.update(Duration::from_millis(16), &InputSnapshot::empty());

        let raw = machine
            .router()
            .store()
            .get(PROGRESS_STORAGE_KEY)
            .expect("saved")
            .to_string();
        let snapshot = ProgressSnapshot::from_json(&raw).expect("parse");
        assert_eq!(snapshot.current_scene_index, 1);
    }

    #[test]
    fn go_to_jumps_and_restarts_from_there() {
        let log = Log::default();
        let mut machine = machine(SceneCommand::complete(), &log);
        machine.start();

        assert!(machine.go_to("End"));
        assert_eq!(machine.active_key(), Some("End"));
        assert!(!machine.go_to("Nowhere"));
        assert_eq!(machine.active_key(), Some("End"));
    }

    #[test]
    fn restart_clears_progress_and_reenters_first_scene() {
        let log = Log::default();
        let router = SceneRouter::new(table(), MemoryStore::new());
        let mut machine = SceneMachine::new(
            router,
            vec![
                entry("Intro", 1, SceneCommand::advance(), &log),
                entry("Trial", 1, SceneCommand::complete(), &log),
                entry("End", 1, SceneCommand::Restart, &log),
            ],
        )
        .expect("machine");
        machine.start();
        machine.update(Duration::from_millis(16), &InputSnapshot::empty());
        machine.update(Duration::from_millis(16), &InputSnapshot::empty());
        assert_eq!(machine.active_key(), Some("End"));
        assert!(machine.router().store().get(PROGRESS_STORAGE_KEY).is_some());

        let step = machine.update(Duration::from_millis(16), &InputSnapshot::empty());

        assert_eq!(
            step,
            MachineStep::Restarted {
                from: "End".to_string(),
                to: "Intro".to_string()
            }
        );
        assert!(!machine.is_finished());
        assert_eq!(machine.completed_runs(), 1);
        assert_eq!(machine.active_key(), Some("Intro"));
        assert_eq!(machine.router().current_index(), 0);
        // Intro's load runs after the reset and counts the fresh visit.
        assert_eq!(machine.router().get_state("visits", json!(0)), json!(1));
        assert_eq!(
            log.borrow().last().map(String::as_str),
            Some("load:Intro")
        );
    }

    #[test]
    fn empty_table_finishes_immediately() {
        let mut machine = SceneMachine::new(
            SceneRouter::new(SceneTable::empty(), MemoryStore::new()),
            Vec::new(),
        )
        .expect("machine");
        assert!(!machine.start());
        assert!(machine.is_finished());
        assert_eq!(
            machine.update(Duration::from_millis(16), &InputSnapshot::empty()),
            MachineStep::Finished
        );
    }
}
