use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::app::GameStateBag;
use crate::content::{SceneDescriptor, SceneTable};

use super::snapshot::{ProgressError, ProgressSnapshot};
use super::store::ProgressStore;

pub const PROGRESS_STORAGE_KEY: &str = "onboarding-game-state";

type SceneChangeObserver = Box<dyn FnMut(&SceneDescriptor, &Value)>;

/// What a scene reports when it is done; the router maps it to the next
/// scene through the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOutcome {
    /// Follow `next_scene`.
    Advance,
    /// Follow `on_complete`, falling back to `next_scene`.
    Complete,
    /// Follow `on_fail`, falling back to restarting the current scene.
    Fail,
}

/// Cursor over the scene table plus the persisted key-value state bag.
///
/// Navigation never fails loudly: out-of-range requests return `None` and
/// leave the cursor where it was.
pub struct SceneRouter<S: ProgressStore> {
    table: SceneTable,
    current_scene_index: usize,
    game_state: Map<String, Value>,
    store: S,
    on_scene_change: Option<SceneChangeObserver>,
    clock: fn() -> u64,
}

impl<S: ProgressStore> SceneRouter<S> {
    pub fn new(table: SceneTable, store: S) -> Self {
        Self {
            table,
            current_scene_index: 0,
            game_state: Map::new(),
            store,
            on_scene_change: None,
            clock: unix_millis,
        }
    }

    pub fn with_initial_state(mut self, initial_state: Map<String, Value>) -> Self {
        self.game_state = initial_state;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_on_scene_change(
        &mut self,
        observer: impl FnMut(&SceneDescriptor, &Value) + 'static,
    ) {
        self.on_scene_change = Some(Box::new(observer));
    }

    pub fn table(&self) -> &SceneTable {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_index(&self) -> usize {
        self.current_scene_index
    }

    pub fn game_state(&self) -> &Map<String, Value> {
        &self.game_state
    }

    pub fn current_scene(&self) -> Option<&SceneDescriptor> {
        self.table.get(self.current_scene_index)
    }

    pub fn next_scene(&mut self, data: Value) -> Option<&SceneDescriptor> {
        if self.current_scene_index + 1 >= self.table.len() {
            return None;
        }
        self.current_scene_index += 1;
        self.notify_scene_change(&data);
        self.current_scene()
    }

    pub fn previous_scene(&mut self) -> Option<&SceneDescriptor> {
        if self.current_scene_index == 0 || self.table.is_empty() {
            return None;
        }
        self.current_scene_index -= 1;
        self.current_scene()
    }

    pub fn go_to_scene(&mut self, index: usize) -> Option<&SceneDescriptor> {
        if index >= self.table.len() {
            warn!(
                index,
                scene_count = self.table.len(),
                "scene_index_out_of_range"
            );
            return None;
        }
        self.current_scene_index = index;
        self.current_scene()
    }

    pub fn go_to_scene_by_key(&mut self, key: &str) -> Option<&SceneDescriptor> {
        match self.table.index_of(key) {
            Some(index) => self.go_to_scene(index),
            None => {
                warn!(scene = key, "scene_key_not_found");
                None
            }
        }
    }

    /// `(index + 1) / len`, or `0.0` for an empty table.
    pub fn progress(&self) -> f32 {
        if self.table.is_empty() {
            return 0.0;
        }
        (self.current_scene_index + 1) as f32 / self.table.len() as f32
    }

    /// Moves to the scene the current descriptor links to for `outcome` and
    /// notifies the observer. Returns `None` when the link is terminal.
    pub fn resolve(&mut self, outcome: SceneOutcome, data: Value) -> Option<&SceneDescriptor> {
        let current = self.current_scene()?;
        let target = match outcome {
            SceneOutcome::Advance => current.next_scene.clone(),
            SceneOutcome::Complete => current
                .on_complete
                .clone()
                .or_else(|| current.next_scene.clone()),
            SceneOutcome::Fail => Some(
                current
                    .on_fail
                    .clone()
                    .unwrap_or_else(|| current.key.clone()),
            ),
        };
        let Some(target) = target else {
            debug!(scene = %current.key, ?outcome, "scene_flow_terminal");
            return None;
        };
        let index = self.table.index_of(&target)?;
        self.current_scene_index = index;
        self.notify_scene_change(&data);
        self.current_scene()
    }

    pub fn save_state(&mut self) -> Result<(), ProgressError> {
        let snapshot = self.snapshot();
        let encoded = snapshot.to_json()?;
        self.store.write(PROGRESS_STORAGE_KEY, &encoded)?;
        debug!(
            current_scene_index = snapshot.current_scene_index,
            state_keys = snapshot.game_state.len(),
            "progress_saved"
        );
        Ok(())
    }

    /// Restores index and state from storage. Any read, parse or
    /// consistency failure is logged and reported as `None`, leaving the
    /// in-memory state as it was.
    pub fn load_state(&mut self) -> Option<ProgressSnapshot> {
        let raw = match self.store.read(PROGRESS_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                error!(error = %error, "progress_load_failed");
                return None;
            }
        };

        let snapshot = match ProgressSnapshot::from_json(&raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                error!(error = %error, "progress_load_failed");
                return None;
            }
        };

        if snapshot.current_scene_index != 0
            && snapshot.current_scene_index >= self.table.len()
        {
            error!(
                current_scene_index = snapshot.current_scene_index,
                scene_count = self.table.len(),
                "progress_load_failed_index_out_of_range"
            );
            return None;
        }

        if let Some(fingerprint) = &snapshot.table_fingerprint {
            if fingerprint != self.table.fingerprint() {
                warn!(
                    saved = %fingerprint,
                    current = %self.table.fingerprint(),
                    "progress_load_rejected_table_changed"
                );
                return None;
            }
        }

        self.current_scene_index = snapshot.current_scene_index;
        self.game_state = snapshot.game_state.clone();
        info!(
            current_scene_index = self.current_scene_index,
            state_keys = self.game_state.len(),
            timestamp = snapshot.timestamp,
            "progress_loaded"
        );
        Some(snapshot)
    }

    pub fn reset_state(&mut self) {
        self.current_scene_index = 0;
        self.game_state.clear();
        if let Err(error) = self.store.remove(PROGRESS_STORAGE_KEY) {
            warn!(error = %error, "progress_remove_failed");
        }
        info!("progress_reset");
    }

    /// Sets one key and immediately writes the whole snapshot.
    pub fn update_state(&mut self, key: &str, value: Value) {
        self.game_state.insert(key.to_string(), value);
        if let Err(error) = self.save_state() {
            warn!(key, error = %error, "progress_save_failed");
        }
    }

    pub fn get_state(&self, key: &str, default: Value) -> Value {
        self.game_state.get(key).cloned().unwrap_or(default)
    }

    /// Final write on teardown.
    pub fn shutdown(&mut self) {
        if let Err(error) = self.save_state() {
            warn!(error = %error, "progress_save_failed");
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_scene_index: self.current_scene_index,
            game_state: self.game_state.clone(),
            timestamp: (self.clock)(),
            table_fingerprint: Some(self.table.fingerprint().to_string()),
        }
    }

    fn notify_scene_change(&mut self, data: &Value) {
        if let (Some(descriptor), Some(observer)) = (
            self.table.get(self.current_scene_index),
            self.on_scene_change.as_mut(),
        ) {
            observer(descriptor, data);
        }
    }
}

impl<S: ProgressStore> GameStateBag for SceneRouter<S> {
    fn get_state(&self, key: &str, default: Value) -> Value {
        SceneRouter::get_state(self, key, default)
    }

    fn update_state(&mut self, key: &str, value: Value) {
        SceneRouter::update_state(self, key, value)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::progress::{FileStore, MemoryStore};

    fn fixed_clock() -> u64 {
        1_700_000_000_000
    }

    fn table() -> SceneTable {
        SceneTable::new(vec![
            SceneDescriptor::presentation("Menu", Some("Intro")),
            SceneDescriptor::presentation("Intro", Some("Trial")),
            SceneDescriptor::challenge("Trial", Some("Story"), Some("Reward"))
                .with_on_fail("Retry"),
            SceneDescriptor::presentation("Story", Some("Runner")),
            SceneDescriptor::presentation("Reward", Some("Story")),
            SceneDescriptor::challenge("Runner", Some("End"), None),
            SceneDescriptor::presentation("Retry", Some("Trial")),
            SceneDescriptor::presentation("End", None),
        ])
        .expect("table")
    }

    fn router() -> SceneRouter<MemoryStore> {
        SceneRouter::new(table(), MemoryStore::new()).with_clock(fixed_clock)
    }

    #[test]
    fn next_scene_increments_by_one_until_last() {
        let mut router = router();
        let len = router.table().len();
        for expected in 1..len {
            let key = router.next_scene(Value::Null).map(|d| d.key.clone());
            assert_eq!(router.current_index(), expected);
            assert_eq!(key, router.table().get(expected).map(|d| d.key.clone()));
        }
    }

    #[test]
    fn next_scene_at_terminal_returns_none_and_keeps_index() {
        let mut router = router();
        let last = router.table().len() - 1;
        router.go_to_scene(last).expect("last");

        assert!(router.next_scene(Value::Null).is_none());
        assert!(router.next_scene(Value::Null).is_none());
        assert_eq!(router.current_index(), last);
    }

    #[test]
    fn next_scene_notifies_observer_with_data() {
        let seen = Rc::new(RefCell::new(Vec::<(String, Value)>::new()));
        let sink = Rc::clone(&seen);
        let mut router = router();
        router.set_on_scene_change(move |descriptor, data| {
            sink.borrow_mut().push((descriptor.key.clone(), data.clone()));
        });

        router.next_scene(json!({ "difficulty": "easy" }));

        assert_eq!(
            seen.borrow().as_slice(),
            &[("Intro".to_string(), json!({ "difficulty": "easy" }))]
        );
    }

    #[test]
    fn previous_scene_stops_at_zero() {
        let mut router = router();
        assert!(router.previous_scene().is_none());
        router.go_to_scene(2).expect("jump");
        assert_eq!(
            router.previous_scene().map(|d| d.key.as_str()),
            Some("Intro")
        );
        assert_eq!(router.current_index(), 1);
    }

    #[test]
    fn go_to_scene_out_of_range_is_a_no_op() {
        let mut router = router();
        router.go_to_scene(3).expect("jump");
        assert!(router.go_to_scene(99).is_none());
        assert_eq!(router.current_index(), 3);
    }

    #[test]
    fn go_to_scene_by_unknown_key_does_not_move() {
        let mut router = router();
        router.go_to_scene_by_key("Trial").expect("trial");
        assert!(router.go_to_scene_by_key("Nope").is_none());
        assert_eq!(router.current_index(), 2);
    }

    #[test]
    fn progress_is_index_ratio() {
        let mut router = router();
        assert!((router.progress() - 1.0 / 8.0).abs() < f32::EPSILON);
        router.go_to_scene(7).expect("end");
        assert!((router.progress() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_table_degrades_to_none_and_zero() {
        let mut router = SceneRouter::new(SceneTable::empty(), MemoryStore::new());
        assert!(router.current_scene().is_none());
        assert_eq!(router.progress(), 0.0);
        assert!(router.next_scene(Value::Null).is_none());
        assert!(router.previous_scene().is_none());
        assert!(router.go_to_scene(0).is_none());
        assert!(router.resolve(SceneOutcome::Advance, Value::Null).is_none());
    }

    #[test]
    fn resolve_follows_descriptor_links() {
        let mut router = router();
        router.go_to_scene_by_key("Trial").expect("trial");

        assert_eq!(
            router
                .resolve(SceneOutcome::Complete, Value::Null)
                .map(|d| d.key.as_str()),
            Some("Reward")
        );
        assert_eq!(
            router
                .resolve(SceneOutcome::Advance, Value::Null)
                .map(|d| d.key.as_str()),
            Some("Story")
        );
    }

    #[test]
    fn resolve_complete_without_on_complete_uses_next_scene() {
        let mut router = router();
        router.go_to_scene_by_key("Runner").expect("runner");
        assert_eq!(
            router
                .resolve(SceneOutcome::Complete, Value::Null)
                .map(|d| d.key.as_str()),
            Some("End")
        );
    }

    #[test]
    fn resolve_fail_uses_on_fail_or_restarts() {
        let mut router = router();
        router.go_to_scene_by_key("Trial").expect("trial");
        assert_eq!(
            router
                .resolve(SceneOutcome::Fail, Value::Null)
                .map(|d| d.key.as_str()),
            Some("Retry")
        );

        router.go_to_scene_by_key("Runner").expect("runner");
        assert_eq!(
            router
                .resolve(SceneOutcome::Fail, Value::Null)
                .map(|d| d.key.as_str()),
            Some("Runner")
        );
    }

    #[test]
    fn resolve_at_terminal_returns_none() {
        let mut router = router();
        router.go_to_scene_by_key("End").expect("end");
        assert!(router.resolve(SceneOutcome::Advance, Value::Null).is_none());
        assert!(router.resolve(SceneOutcome::Complete, Value::Null).is_none());
        assert_eq!(router.current_scene().map(|d| d.key.as_str()), Some("End"));
    }

    #[test]
    fn save_then_fresh_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let mut router =
                SceneRouter::new(table(), FileStore::new(temp.path())).with_clock(fixed_clock);
            router.go_to_scene(4).expect("jump");
            router.update_state("coins", json!(12));
            router.update_state("badges", json!(["sorting", "combat"]));
            router.save_state().expect("save");
        }

        let mut reloaded = SceneRouter::new(table(), FileStore::new(temp.path()));
        let snapshot = reloaded.load_state().expect("snapshot");

        assert_eq!(snapshot.timestamp, fixed_clock());
        assert_eq!(reloaded.current_index(), 4);
        assert_eq!(reloaded.get_state("coins", Value::Null), json!(12));
        assert_eq!(
            reloaded.get_state("badges", Value::Null),
            json!(["sorting", "combat"])
        );
    }

    #[test]
    fn update_state_writes_through() {
        let mut router = router();
        router.update_state("seen_intro", json!(true));

        let raw = router.store().get(PROGRESS_STORAGE_KEY).expect("written");
        let snapshot = ProgressSnapshot::from_json(raw).expect("parse");
        assert_eq!(snapshot.game_state.get("seen_intro"), Some(&json!(true)));
    }

    #[test]
    fn corrupted_storage_returns_none_and_keeps_state() {
        let store = MemoryStore::new().with_entry(PROGRESS_STORAGE_KEY, "{not json");
        let mut router = SceneRouter::new(table(), store);
        router.go_to_scene(3).expect("jump");
        let mut initial = Map::new();
        initial.insert("kept".to_string(), json!(1));
        let mut router = router.with_initial_state(initial);

        assert!(router.load_state().is_none());
        assert_eq!(router.current_index(), 3);
        assert_eq!(router.get_state("kept", Value::Null), json!(1));
    }

    #[test]
    fn out_of_range_saved_index_is_rejected() {
        let store = MemoryStore::new()
            .with_entry(PROGRESS_STORAGE_KEY, r#"{"currentSceneIndex": 42, "gameState": {}}"#);
        let mut router = SceneRouter::new(table(), store);
        assert!(router.load_state().is_none());
        assert_eq!(router.current_index(), 0);
    }

    #[test]
    fn snapshot_from_other_table_is_rejected() {
        let store = MemoryStore::new().with_entry(
            PROGRESS_STORAGE_KEY,
            r#"{"currentSceneIndex": 1, "gameState": {}, "timestamp": 5, "tableFingerprint": "abc"}"#,
        );
        let mut router = SceneRouter::new(table(), store);
        assert!(router.load_state().is_none());
        assert_eq!(router.current_index(), 0);
    }

    #[test]
    fn snapshot_without_fingerprint_is_accepted() {
        let store = MemoryStore::new().with_entry(
            PROGRESS_STORAGE_KEY,
            r#"{"currentSceneIndex": 2, "gameState": {"name": "Ada"}, "timestamp": 5}"#,
        );
        let mut router = SceneRouter::new(table(), store);
        assert!(router.load_state().is_some());
        assert_eq!(router.current_scene().map(|d| d.key.as_str()), Some("Trial"));
        assert_eq!(router.get_state("name", Value::Null), json!("Ada"));
    }

    #[test]
    fn reset_clears_state_and_storage() {
        let mut router = router();
        router.go_to_scene(5).expect("jump");
        router.update_state("coins", json!(1));

        router.reset_state();

        assert_eq!(router.current_index(), 0);
        assert!(router.game_state().is_empty());
        assert!(router.store().get(PROGRESS_STORAGE_KEY).is_none());
        assert!(router.load_state().is_none());
    }

    #[test]
    fn get_state_falls_back_to_default() {
        let router = router();
        assert_eq!(router.get_state("missing", json!("fallback")), json!("fallback"));
    }
}
