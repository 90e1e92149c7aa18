use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

type Condition<C> = Box<dyn Fn(&C) -> bool>;
type Callback<C> = Box<dyn FnMut(&mut C)>;

/// A named completion condition, evaluated against the scene context `C`.
pub struct Objective<C> {
    pub id: String,
    pub description: String,
    condition: Option<Condition<C>>,
    on_complete: Option<Callback<C>>,
}

impl<C> fmt::Debug for Objective<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<C> Objective<C> {
    /// An objective completed only through `complete_objective`.
    pub fn manual(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            condition: None,
            on_complete: None,
        }
    }

    pub fn when(mut self, condition: impl Fn(&C) -> bool + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn on_complete(mut self, callback: impl FnMut(&mut C) + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveEvent {
    ObjectiveCompleted(String),
    ChallengeCompleted,
    ChallengeFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reward {
    pub kind: String,
    pub value: Value,
}

/// Objective bookkeeping for a challenge scene.
///
/// `Completed` and `Failed` are terminal for the instance; retrying means
/// building a new tracker.
pub trait ObjectiveTracked<C> {
    fn add_objective(&mut self, objective: Objective<C>);
    /// Marks one objective done. Unknown or already-completed ids are
    /// ignored and return no events.
    fn complete_objective(&mut self, id: &str, context: &mut C) -> Vec<ObjectiveEvent>;
    /// Re-evaluates every pending condition in insertion order.
    fn evaluate(&mut self, context: &mut C) -> Vec<ObjectiveEvent>;
    fn check_completion(&mut self) -> Option<ObjectiveEvent>;
    fn fail_challenge(&mut self, context: &mut C) -> Option<ObjectiveEvent>;
    fn status(&self) -> ChallengeStatus;
}

pub struct ObjectiveTracker<C> {
    objectives: Vec<Objective<C>>,
    completed: HashSet<String>,
    completed_order: Vec<String>,
    rewards: Vec<Reward>,
    status: ChallengeStatus,
    on_failed: Option<Callback<C>>,
}

impl<C> fmt::Debug for ObjectiveTracker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveTracker")
            .field("objectives", &self.objectives)
            .field("completed", &self.completed_order)
            .field("rewards", &self.rewards)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<C> Default for ObjectiveTracker<C> {
    fn default() -> Self {
        Self {
            objectives: Vec::new(),
            completed: HashSet::new(),
            completed_order: Vec::new(),
            rewards: Vec::new(),
            status: ChallengeStatus::Active,
            on_failed: None,
        }
    }
}

impl<C> ObjectiveTracker<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_failed(mut self, callback: impl FnMut(&mut C) + 'static) -> Self {
        self.on_failed = Some(Box::new(callback));
        self
    }

    pub fn objectives(&self) -> &[Objective<C>] {
        &self.objectives
    }

    /// Completed ids in completion order.
    pub fn completed_objectives(&self) -> &[String] {
        &self.completed_order
    }

    pub fn is_objective_complete(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ChallengeStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ChallengeStatus::Failed
    }

    pub fn add_reward(&mut self, kind: &str, value: Value) {
        self.rewards.push(Reward {
            kind: kind.to_string(),
            value,
        });
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    fn mark_complete(&mut self, index: usize, context: &mut C) -> Vec<ObjectiveEvent> {
        let id = self.objectives[index].id.clone();
        self.completed.insert(id.clone());
        self.completed_order.push(id.clone());
        if let Some(callback) = self.objectives[index].on_complete.as_mut() {
            callback(context);
        }
        debug!(objective = %id, "objective_completed");

        let mut events = vec![ObjectiveEvent::ObjectiveCompleted(id)];
        events.extend(self.check_completion());
        events
    }
}

impl<C> ObjectiveTracked<C> for ObjectiveTracker<C> {
    fn add_objective(&mut self, objective: Objective<C>) {
        self.objectives.push(objective);
    }

    fn complete_objective(&mut self, id: &str, context: &mut C) -> Vec<ObjectiveEvent> {
        if self.status != ChallengeStatus::Active || self.completed.contains(id) {
            return Vec::new();
        }
        match self.objectives.iter().position(|objective| objective.id == id) {
            Some(index) => self.mark_complete(index, context),
            None => Vec::new(),
        }
    }

    fn evaluate(&mut self, context: &mut C) -> Vec<ObjectiveEvent> {
        let mut events = Vec::new();
        for index in 0..self.objectives.len() {
            if self.status != ChallengeStatus::Active {
                break;
            }
            let objective = &self.objectives[index];
            if self.completed.contains(&objective.id) {
                continue;
            }
            let satisfied = objective
                .condition
                .as_ref()
                .is_some_and(|condition| condition(&*context));
            if satisfied {
                events.extend(self.mark_complete(index, context));
            }
        }
        events
    }

    fn check_completion(&mut self) -> Option<ObjectiveEvent> {
        if self.status != ChallengeStatus::Active || self.objectives.is_empty() {
            return None;
        }
        let all_done = self
            .objectives
            .iter()
            .all(|objective| self.completed.contains(&objective.id));
        if !all_done {
            return None;
        }
        self.status = ChallengeStatus::Completed;
        info!(objectives = self.objectives.len(), "challenge_completed");
        Some(ObjectiveEvent::ChallengeCompleted)
    }

    fn fail_challenge(&mut self, context: &mut C) -> Option<ObjectiveEvent> {
        if self.status != ChallengeStatus::Active {
            return None;
        }
        self.status = ChallengeStatus::Failed;
        if let Some(callback) = self.on_failed.as_mut() {
            callback(context);
        }
        info!(
            completed = self.completed_order.len(),
            objectives = self.objectives.len(),
            "challenge_failed"
        );
        Some(ObjectiveEvent::ChallengeFailed)
    }

    fn status(&self) -> ChallengeStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Progress {
        opened: bool,
        score: u32,
        completions: u32,
        failures: u32,
    }

    #[test]
    fn always_true_condition_fires_callback_exactly_once() {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(
            Objective::manual("always", "Always satisfied")
                .when(|_: &Progress| true)
                .on_complete(|progress: &mut Progress| progress.completions += 1),
        );
        let mut progress = Progress::default();

        let mut all_events = Vec::new();
        for _ in 0..5 {
            all_events.extend(tracker.evaluate(&mut progress));
        }

        assert_eq!(progress.completions, 1);
        assert_eq!(
            all_events,
            vec![
                ObjectiveEvent::ObjectiveCompleted("always".to_string()),
                ObjectiveEvent::ChallengeCompleted,
            ]
        );
    }

    #[test]
    fn completion_requires_every_objective() {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(Objective::manual("open", "Open").when(|p: &Progress| p.opened));
        tracker.add_objective(Objective::manual("score", "Score").when(|p: &Progress| p.score >= 3));
        let mut progress = Progress {
            opened: true,
            ..Progress::default()
        };

        let events = tracker.evaluate(&mut progress);
        assert_eq!(events, vec![ObjectiveEvent::ObjectiveCompleted("open".to_string())]);
        assert_eq!(tracker.status(), ChallengeStatus::Active);

        progress.score = 3;
        let events = tracker.evaluate(&mut progress);
        assert_eq!(events.last(), Some(&ObjectiveEvent::ChallengeCompleted));
        assert_eq!(tracker.completed_objectives(), &["open".to_string(), "score".to_string()]);
    }

    #[test]
    fn manual_completion_is_idempotent_and_ignores_unknown_ids() {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(
            Objective::manual("a", "A").on_complete(|p: &mut Progress| p.completions += 1),
        );
        tracker.add_objective(Objective::manual("b", "B"));
        let mut progress = Progress::default();

        assert_eq!(tracker.complete_objective("a", &mut progress).len(), 1);
        assert!(tracker.complete_objective("a", &mut progress).is_empty());
        assert!(tracker.complete_objective("zzz", &mut progress).is_empty());
        assert_eq!(progress.completions, 1);
        assert!(!tracker.is_completed());
    }

    #[test]
    fn no_objectives_never_completes() {
        let mut tracker: ObjectiveTracker<Progress> = ObjectiveTracker::new();
        assert_eq!(tracker.check_completion(), None);
        assert!(tracker.evaluate(&mut Progress::default()).is_empty());
        assert_eq!(tracker.status(), ChallengeStatus::Active);
    }

    #[test]
    fn fail_is_unconditional_terminal_and_calls_back_once() {
        let mut tracker =
            ObjectiveTracker::new().on_failed(|p: &mut Progress| p.failures += 1);
        tracker.add_objective(Objective::manual("a", "A").when(|p: &Progress| p.opened));
        tracker.add_objective(Objective::manual("b", "B"));
        let mut progress = Progress {
            opened: true,
            ..Progress::default()
        };
        tracker.evaluate(&mut progress);

        assert_eq!(
            tracker.fail_challenge(&mut progress),
            Some(ObjectiveEvent::ChallengeFailed)
        );
        assert_eq!(tracker.fail_challenge(&mut progress), None);
        assert!(tracker.complete_objective("b", &mut progress).is_empty());
        assert_eq!(progress.failures, 1);
        assert!(tracker.is_failed());
    }

    #[test]
    fn completed_challenge_cannot_fail() {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(Objective::manual("a", "A"));
        let mut progress = Progress::default();
        tracker.complete_objective("a", &mut progress);

        assert!(tracker.is_completed());
        assert_eq!(tracker.fail_challenge(&mut progress), None);
    }

    #[test]
    fn rewards_accumulate_in_order() {
        let mut tracker: ObjectiveTracker<Progress> = ObjectiveTracker::new();
        tracker.add_reward("badge", json!("sorting"));
        tracker.add_reward("xp", json!(50));
        let kinds: Vec<&str> = tracker.rewards().iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["badge", "xp"]);
    }
}
