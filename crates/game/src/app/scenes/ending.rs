use std::time::Duration;

use scene_flow::{
    DialogScript, EntityDesc, GameStateBag, InputSnapshot, Key, Scene, SceneCommand, SceneWorld,
    TimerQueue, Vec2,
};
use tracing::info;

const RESTART_HINT_DELAY: Duration = Duration::from_millis(1000);
const MENU_PROMPT_DELAY: Duration = Duration::from_millis(5000);
const DEFAULT_TITLE: &str = "¡FELICIDADES!";
const DEFAULT_MESSAGE: &str = "Has completado el juego";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndingCue {
    RestartHint,
    MenuPrompt,
}

/// Closing screen. R starts over at once; Space or Enter do the same once
/// the menu prompt has appeared. Starting over clears saved progress.
pub(crate) struct EndGameScene {
    key: String,
    title: String,
    message: String,
    timers: TimerQueue<EndingCue>,
    menu_prompt_shown: bool,
}

impl EndGameScene {
    pub(crate) fn new(key: &str, script: Option<&DialogScript>) -> Self {
        let mut lines = script
            .into_iter()
            .flat_map(|script| script.lines.iter())
            .map(|line| line.display_text());
        Self {
            key: key.to_string(),
            title: lines.next().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            message: lines.next().unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            timers: TimerQueue::new(),
            menu_prompt_shown: false,
        }
    }
}

impl Scene for EndGameScene {
    fn load(&mut self, world: &mut SceneWorld, _state: &mut dyn GameStateBag) {
        world.spawn(EntityDesc::new("ending_title", Vec2::new(400.0, 200.0)).with_label(&self.title));
        world.spawn(
            EntityDesc::new("ending_message", Vec2::new(400.0, 300.0)).with_label(&self.message),
        );
        self.timers.schedule(RESTART_HINT_DELAY, EndingCue::RestartHint);
        self.timers.schedule(MENU_PROMPT_DELAY, EndingCue::MenuPrompt);
        info!(scene = %self.key, "ending_shown");
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        _state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        for cue in self.timers.advance(fixed_dt) {
            match cue {
                EndingCue::RestartHint => {
                    world.spawn(
                        EntityDesc::new("restart_hint", Vec2::new(400.0, 450.0))
                            .with_label("Presiona R para reiniciar"),
                    );
                }
                EndingCue::MenuPrompt => {
                    self.menu_prompt_shown = true;
                    world.spawn(
                        EntityDesc::new("menu_prompt", Vec2::new(400.0, 500.0))
                            .with_label("Presiona ESPACIO para volver al menú"),
                    );
                }
            }
        }

        let confirmed = input.just_pressed(Key::Space) || input.just_pressed(Key::Enter);
        if input.just_pressed(Key::Restart) || (self.menu_prompt_shown && confirmed) {
            info!(scene = %self.key, "ending_restart_requested");
            SceneCommand::Restart
        } else {
            SceneCommand::None
        }
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.timers.cancel_all();
    }

    fn debug_title(&self) -> Option<String> {
        Some(self.key.clone())
    }
}
