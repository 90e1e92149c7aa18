use std::time::Duration;

use scene_flow::{
    EntityDesc, EntityId, GameStateBag, InputSnapshot, Interactable, InteractionAction,
    InteractionConfig, InteractionOutcome, Key, MovementConfig, Objective, ObjectiveEvent,
    ObjectiveTracked, ObjectiveTracker, Platform, Scene, SceneCommand, SceneWorld, SpriteEntity,
    TextureRegistry, TimerQueue, Vec2,
};
use serde_json::json;
use tracing::{debug, info};

use super::{drive_character, setup_platformer, spawn_character, PLAYER_NAME};

pub(crate) const CHEST_POSITION: Vec2 = Vec2::new(700.0, 200.0);
const CHEST_ID: &str = "chest";
const PLAYER_SPAWN: Vec2 = Vec2::new(50.0, 0.0);
/// `(centre x, top)` of the climbable platforms, lowest first.
pub(crate) const PLATFORMS: [(f32, f32); 4] = [
    (250.0, 448.0),
    (400.0, 368.0),
    (550.0, 288.0),
    (700.0, 208.0),
];
const PLATFORM_WIDTH: f32 = 150.0;
const COMPLETE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Default)]
struct ExplorationProgress {
    chest_opened: bool,
}

/// Climb the platforms and open the guardian's chest.
pub(crate) struct ExplorationScene {
    textures: TextureRegistry,
    player: Option<SpriteEntity>,
    chest_entity: Option<EntityId>,
    hint_entity: Option<EntityId>,
    chest: Vec<Interactable>,
    progress: ExplorationProgress,
    tracker: ObjectiveTracker<ExplorationProgress>,
    timers: TimerQueue<()>,
}

impl ExplorationScene {
    pub(crate) fn new() -> Self {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(
            Objective::manual("open_chest", "Abre el cofre del guardián")
                .when(|progress: &ExplorationProgress| progress.chest_opened),
        );
        Self {
            textures: TextureRegistry::new(),
            player: None,
            chest_entity: None,
            hint_entity: None,
            chest: Vec::new(),
            progress: ExplorationProgress::default(),
            tracker,
            timers: TimerQueue::new(),
        }
    }

    pub(crate) fn with_textures(mut self, textures: TextureRegistry) -> Self {
        self.textures = textures;
        self
    }

    fn open_chest(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
        self.progress.chest_opened = true;
        self.chest.clear();
        if let Some(id) = self.chest_entity {
            world.set_label(id, Some("Cofre abierto".to_string()));
        }
        state.update_state("exploration.chest_opened", json!(true));
        info!("chest_opened");

        for event in self.tracker.evaluate(&mut self.progress) {
            if event == ObjectiveEvent::ChallengeCompleted {
                self.timers.schedule(COMPLETE_DELAY, ());
            }
        }
    }

    fn sync_hint(&self, world: &mut SceneWorld) {
        let Some(hint_id) = self.hint_entity else {
            return;
        };
        let hint = self
            .player
            .as_ref()
            .and_then(|player| player.actions().interaction())
            .and_then(InteractionAction::visible_hint)
            .filter(|_| !self.progress.chest_opened)
            .cloned();
        match hint {
            Some(hint) => {
                world.set_label(hint_id, Some(hint.text));
                world.set_position(hint_id, hint.position);
            }
            None => world.set_label(hint_id, None),
        }
    }
}

impl Scene for ExplorationScene {
    fn load(&mut self, world: &mut SceneWorld, _state: &mut dyn GameStateBag) {
        setup_platformer(world);
        for (center_x, top) in PLATFORMS {
            world.add_platform(Platform::centered(center_x, top, PLATFORM_WIDTH));
            world.spawn(
                EntityDesc::new("platform", Vec2::new(center_x, top)).with_texture("platform"),
            );
        }

        let mut player = spawn_character(
            world,
            &mut self.textures,
            PLAYER_NAME,
            "player",
            PLAYER_SPAWN,
            MovementConfig::default(),
        );
        player.add_action(InteractionAction::new(InteractionConfig::default()));
        self.player = Some(player);

        self.chest_entity = Some(
            world.spawn(EntityDesc::new(CHEST_ID, CHEST_POSITION).with_texture("chest_closed")),
        );
        self.hint_entity = Some(world.spawn(EntityDesc::new("hint", CHEST_POSITION)));
        self.chest =
            vec![Interactable::new(CHEST_ID, CHEST_POSITION).with_hint("Presiona E para abrir")];

        info!(platforms = PLATFORMS.len(), "exploration_ready");
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        if !self.timers.advance(fixed_dt).is_empty() {
            return SceneCommand::complete();
        }

        let Some(player) = self.player.as_mut() else {
            return SceneCommand::None;
        };
        drive_character(player, world, input);

        let mut opened = false;
        if !self.progress.chest_opened {
            let player_id = player.id();
            // One activation per press, not per held tick.
            let gated = input.with_key_down(Key::Interact, input.just_pressed(Key::Interact));
            if let Some(interaction) = player.actions_mut().interaction_mut() {
                let outcome = interaction.execute(world, player_id, &mut self.chest, &gated);
                if let Some(InteractionOutcome::Activated { id }) = outcome {
                    debug!(interactable = %id, "interaction_activated");
                    opened = id == CHEST_ID;
                }
            }
        }
        if opened {
            self.open_chest(world, state);
        }
        self.sync_hint(world);

        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.timers.cancel_all();
        if let Some(interaction) = self
            .player
            .as_mut()
            .and_then(|player| player.actions_mut().interaction_mut())
        {
            interaction.destroy();
        }
    }

    fn debug_title(&self) -> Option<String> {
        let done = self.tracker.completed_objectives().len();
        Some(format!("Exploration [{done}/{}]", self.tracker.objectives().len()))
    }
}
