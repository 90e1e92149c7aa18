use std::time::Duration;

use scene_flow::{
    EntityDesc, GameStateBag, InputSnapshot, Key, Scene, SceneCommand, SceneWorld, TimerQueue,
    Vec2,
};
use serde_json::json;
use tracing::info;

const DISPLAY_TIME: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AchievementText {
    pub(crate) title: &'static str,
    pub(crate) description: &'static str,
}

pub(crate) fn achievement_text(key: &str) -> AchievementText {
    match key {
        "Achievement2" => AchievementText {
            title: "¡Victoria!",
            description: "Has derrotado al guardián",
        },
        _ => AchievementText {
            title: "¡Logro Desbloqueado!",
            description: "We aim to be our best",
        },
    }
}

/// Shows an unlocked achievement, records it under `achievements.<key>`
/// and moves on after a short pause or a confirm key.
pub(crate) struct AchievementScene {
    key: String,
    text: AchievementText,
    timers: TimerQueue<()>,
}

impl AchievementScene {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            text: achievement_text(key),
            timers: TimerQueue::new(),
        }
    }
}

impl Scene for AchievementScene {
    fn load(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
        world.spawn(
            EntityDesc::new("achievement_title", Vec2::new(400.0, 250.0))
                .with_label(self.text.title),
        );
        world.spawn(
            EntityDesc::new("achievement_description", Vec2::new(400.0, 320.0))
                .with_label(self.text.description),
        );
        state.update_state(
            &format!("achievements.{}", self.key),
            json!({
                "title": self.text.title,
                "description": self.text.description,
                "unlocked": true,
            }),
        );
        self.timers.schedule(DISPLAY_TIME, ());
        info!(scene = %self.key, title = self.text.title, "achievement_unlocked");
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        _world: &mut SceneWorld,
        _state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        let confirmed = input.just_pressed(Key::Space) || input.just_pressed(Key::Enter);
        let elapsed = !self.timers.advance(fixed_dt).is_empty();
        if confirmed || elapsed {
            self.timers.cancel_all();
            return SceneCommand::advance();
        }
        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.timers.cancel_all();
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!("{}: {}", self.key, self.text.title))
    }
}
