use std::fmt;

use serde_json::Value;

use crate::app::{EntityId, InputSnapshot, Key, SceneWorld, Vec2};

/// Vertical offset of the hint above the interactable.
pub const HINT_OFFSET_Y: f32 = -50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionConfig {
    pub key: Key,
    pub range: f32,
    pub show_hint: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            key: Key::Interact,
            range: 80.0,
            show_hint: true,
        }
    }
}

type InteractHandler = Box<dyn FnMut(&mut SceneWorld, EntityId) -> Value>;

pub struct Interactable {
    pub id: String,
    pub position: Vec2,
    pub hint_message: Option<String>,
    on_interact: Option<InteractHandler>,
}

impl fmt::Debug for Interactable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactable")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("hint_message", &self.hint_message)
            .field("has_handler", &self.on_interact.is_some())
            .finish()
    }
}

impl Interactable {
    pub fn new(id: &str, position: Vec2) -> Self {
        Self {
            id: id.to_string(),
            position,
            hint_message: None,
            on_interact: None,
        }
    }

    pub fn with_hint(mut self, hint_message: &str) -> Self {
        self.hint_message = Some(hint_message.to_string());
        self
    }

    pub fn with_handler(
        mut self,
        handler: impl FnMut(&mut SceneWorld, EntityId) -> Value + 'static,
    ) -> Self {
        self.on_interact = Some(Box::new(handler));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    /// No handler was attached; the caller decides what activation means.
    Activated { id: String },
    /// The interactable's own handler ran and returned `result`.
    Handled { id: String, result: Value },
}

impl InteractionOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Activated { id } | Self::Handled { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HintLabel {
    pub text: String,
    pub position: Vec2,
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct InteractionAction {
    config: InteractionConfig,
    hint: Option<HintLabel>,
}

impl InteractionAction {
    pub fn new(config: InteractionConfig) -> Self {
        Self { config, hint: None }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Index of the nearest interactable within range. Ties keep the
    /// earlier entry.
    pub fn find_interactable(
        &self,
        world: &SceneWorld,
        actor: EntityId,
        interactables: &[Interactable],
    ) -> Option<usize> {
        let origin = world.position(actor)?;
        let mut closest: Option<(usize, f32)> = None;
        for (index, interactable) in interactables.iter().enumerate() {
            let distance = origin.distance(interactable.position);
            if distance > self.config.range {
                continue;
            }
            if closest.map_or(true, |(_, best)| distance < best) {
                closest = Some((index, distance));
            }
        }
        closest.map(|(index, _)| index)
    }

    /// Refreshes the hint, then activates the nearest interactable while
    /// the interaction key is held.
    pub fn execute(
        &mut self,
        world: &mut SceneWorld,
        actor: EntityId,
        interactables: &mut [Interactable],
        input: &InputSnapshot,
    ) -> Option<InteractionOutcome> {
        let found = self.find_interactable(world, actor, interactables);
        if self.config.show_hint {
            self.update_hint(found.map(|index| &interactables[index]));
        }

        if !input.is_down(self.config.key) {
            return None;
        }

        let interactable = &mut interactables[found?];
        let id = interactable.id.clone();
        match interactable.on_interact.as_mut() {
            Some(handler) => Some(InteractionOutcome::Handled {
                result: handler(world, actor),
                id,
            }),
            None => Some(InteractionOutcome::Activated { id }),
        }
    }

    pub fn update_hint(&mut self, interactable: Option<&Interactable>) {
        match interactable {
            Some(interactable) => {
                let text = interactable
                    .hint_message
                    .clone()
                    .unwrap_or_else(|| format!("Press {}", self.config.key.label()));
                let anchor = interactable.position;
                self.hint = Some(HintLabel {
                    text,
                    position: Vec2::new(anchor.x, anchor.y + HINT_OFFSET_Y),
                    visible: true,
                });
            }
            None => {
                if let Some(hint) = self.hint.as_mut() {
                    hint.visible = false;
                }
            }
        }
    }

    /// The hint label, once one has been shown.
    pub fn hint(&self) -> Option<&HintLabel> {
        self.hint.as_ref()
    }

    pub fn visible_hint(&self) -> Option<&HintLabel> {
        self.hint.as_ref().filter(|hint| hint.visible)
    }

    pub fn destroy(&mut self) {
        self.hint = None;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::app::EntityDesc;

    fn world_with_actor(position: Vec2) -> (SceneWorld, EntityId) {
        let mut world = SceneWorld::default();
        let id = world.spawn(EntityDesc::new("player", position));
        world.apply_pending();
        (world, id)
    }

    fn interact_held() -> InputSnapshot {
        InputSnapshot::empty().with_key_down(Key::Interact, true)
    }

    #[test]
    fn nearest_in_range_wins_and_ties_keep_first() {
        let (world, actor) = world_with_actor(Vec2::new(100.0, 100.0));
        let action = InteractionAction::default();
        let interactables = vec![
            Interactable::new("far", Vec2::new(170.0, 100.0)),
            Interactable::new("left", Vec2::new(60.0, 100.0)),
            Interactable::new("right", Vec2::new(140.0, 100.0)),
            Interactable::new("out", Vec2::new(181.0, 100.0)),
        ];

        assert_eq!(action.find_interactable(&world, actor, &interactables), Some(1));
        assert_eq!(action.find_interactable(&world, actor, &interactables[3..]), None);
        assert_eq!(action.find_interactable(&world, actor, &[]), None);
    }

    #[test]
    fn range_boundary_is_inclusive() {
        let (world, actor) = world_with_actor(Vec2::ZERO);
        let action = InteractionAction::default();
        let interactables = vec![Interactable::new("edge", Vec2::new(0.0, 80.0))];
        assert_eq!(action.find_interactable(&world, actor, &interactables), Some(0));
    }

    #[test]
    fn execute_without_key_only_updates_hint() {
        let (mut world, actor) = world_with_actor(Vec2::new(0.0, 0.0));
        let mut action = InteractionAction::default();
        let mut interactables =
            vec![Interactable::new("chest", Vec2::new(40.0, 0.0)).with_hint("Open chest")];

        let outcome = action.execute(&mut world, actor, &mut interactables, &InputSnapshot::empty());

        assert!(outcome.is_none());
        let hint = action.visible_hint().expect("hint");
        assert_eq!(hint.text, "Open chest");
        assert_eq!(hint.position, Vec2::new(40.0, -50.0));
    }

    #[test]
    fn generic_activation_and_default_hint_text() {
        let (mut world, actor) = world_with_actor(Vec2::ZERO);
        let mut action = InteractionAction::default();
        let mut interactables = vec![Interactable::new("lever", Vec2::new(10.0, 10.0))];

        let outcome = action.execute(&mut world, actor, &mut interactables, &interact_held());

        assert_eq!(
            outcome,
            Some(InteractionOutcome::Activated {
                id: "lever".to_string()
            })
        );
        assert_eq!(action.visible_hint().map(|h| h.text.as_str()), Some("Press E"));
    }

    #[test]
    fn handler_result_is_returned_each_held_tick() {
        let (mut world, actor) = world_with_actor(Vec2::ZERO);
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let mut action = InteractionAction::default();
        let mut interactables = vec![Interactable::new("npc", Vec2::new(5.0, 0.0))
            .with_handler(move |_, _| {
                counter.set(counter.get() + 1);
                json!({ "talked": true })
            })];

        for _ in 0..2 {
            let outcome = action
                .execute(&mut world, actor, &mut interactables, &interact_held())
                .expect("handled");
            assert_eq!(outcome.id(), "npc");
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn hint_hides_when_out_of_range_and_destroy_drops_it() {
        let (mut world, actor) = world_with_actor(Vec2::ZERO);
        let mut action = InteractionAction::default();
        let mut interactables = vec![Interactable::new("door", Vec2::new(50.0, 0.0))];

        action.execute(&mut world, actor, &mut interactables, &InputSnapshot::empty());
        assert!(action.visible_hint().is_some());

        world.set_position(actor, Vec2::new(500.0, 0.0));
        let outcome = action.execute(&mut world, actor, &mut interactables, &interact_held());
        assert!(outcome.is_none());
        assert!(action.visible_hint().is_none());
        assert!(action.hint().is_some());

        action.destroy();
        assert!(action.hint().is_none());
    }

    #[test]
    fn actor_without_position_finds_nothing() {
        let mut world = SceneWorld::default();
        let mut action = InteractionAction::default();
        let mut interactables = vec![Interactable::new("chest", Vec2::ZERO)];
        assert!(action
            .execute(&mut world, EntityId(7), &mut interactables, &interact_held())
            .is_none());
    }
}
