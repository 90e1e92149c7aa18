//! Reusable behaviours attached to sprites: movement, attacking and
//! interacting. Each operates on an entity in a [`SceneWorld`] and degrades
//! to "nothing happened" when its preconditions are not met.
//!
//! [`SceneWorld`]: crate::app::SceneWorld

mod attack;
mod interaction;
mod movement;

pub use attack::{
    AttackAction, AttackConfig, AttackKind, AttackOutcome, HitTarget, HIT_TINT,
    HIT_TINT_DURATION,
};
pub use interaction::{
    HintLabel, Interactable, InteractionAction, InteractionConfig, InteractionOutcome,
    HINT_OFFSET_Y,
};
pub use movement::{MovementAction, MovementConfig, MovementState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Attack,
    Interact,
}

#[derive(Debug)]
pub enum Action {
    Move(MovementAction),
    Attack(AttackAction),
    Interact(InteractionAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move(_) => ActionKind::Move,
            Action::Attack(_) => ActionKind::Attack,
            Action::Interact(_) => ActionKind::Interact,
        }
    }
}

impl From<MovementAction> for Action {
    fn from(action: MovementAction) -> Self {
        Action::Move(action)
    }
}

impl From<AttackAction> for Action {
    fn from(action: AttackAction) -> Self {
        Action::Attack(action)
    }
}

impl From<InteractionAction> for Action {
    fn from(action: InteractionAction) -> Self {
        Action::Interact(action)
    }
}

/// At most one action of each kind, in insertion order.
#[derive(Debug, Default)]
pub struct ActionSet {
    actions: Vec<Action>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `action`, returning the one of the same kind it replaced.
    pub fn insert(&mut self, action: impl Into<Action>) -> Option<Action> {
        let action = action.into();
        match self
            .actions
            .iter()
            .position(|existing| existing.kind() == action.kind())
        {
            Some(index) => Some(std::mem::replace(&mut self.actions[index], action)),
            None => {
                self.actions.push(action);
                None
            }
        }
    }

    pub fn remove(&mut self, kind: ActionKind) -> Option<Action> {
        let index = self.actions.iter().position(|action| action.kind() == kind)?;
        Some(self.actions.remove(index))
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|action| action.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(Action::kind).collect()
    }

    pub fn movement(&self) -> Option<&MovementAction> {
        self.actions.iter().find_map(|action| match action {
            Action::Move(movement) => Some(movement),
            _ => None,
        })
    }

    pub fn movement_mut(&mut self) -> Option<&mut MovementAction> {
        self.actions.iter_mut().find_map(|action| match action {
            Action::Move(movement) => Some(movement),
            _ => None,
        })
    }

    pub fn attack_mut(&mut self) -> Option<&mut AttackAction> {
        self.actions.iter_mut().find_map(|action| match action {
            Action::Attack(attack) => Some(attack),
            _ => None,
        })
    }

    pub fn interaction(&self) -> Option<&InteractionAction> {
        self.actions.iter().find_map(|action| match action {
            Action::Interact(interaction) => Some(interaction),
            _ => None,
        })
    }

    pub fn interaction_mut(&mut self) -> Option<&mut InteractionAction> {
        self.actions.iter_mut().find_map(|action| match action {
            Action::Interact(interaction) => Some(interaction),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drops every action, releasing interaction hints first.
    pub fn clear(&mut self) {
        if let Some(interaction) = self.interaction_mut() {
            interaction.destroy();
        }
        self.actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_same_kind_and_keeps_order() {
        let mut set = ActionSet::new();
        assert!(set.insert(MovementAction::default()).is_none());
        assert!(set.insert(AttackAction::default()).is_none());

        let replaced = set.insert(MovementAction::new(MovementConfig {
            speed: 250.0,
            ..MovementConfig::default()
        }));

        assert!(matches!(replaced, Some(Action::Move(_))));
        assert_eq!(set.kinds(), vec![ActionKind::Move, ActionKind::Attack]);
        assert_eq!(set.movement().map(|m| m.config().speed), Some(250.0));
    }

    #[test]
    fn typed_accessors_find_their_kind() {
        let mut set = ActionSet::new();
        set.insert(InteractionAction::default());
        assert!(set.movement().is_none());
        assert!(set.attack_mut().is_none());
        assert!(set.interaction().is_some());

        assert!(matches!(set.remove(ActionKind::Interact), Some(Action::Interact(_))));
        assert!(set.remove(ActionKind::Interact).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = ActionSet::new();
        set.insert(MovementAction::default());
        set.insert(InteractionAction::default());
        set.clear();
        assert_eq!(set.len(), 0);
        assert!(!set.contains(ActionKind::Move));
    }
}
