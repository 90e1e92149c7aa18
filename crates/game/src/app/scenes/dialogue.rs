use std::time::Duration;

use scene_flow::{
    Advanceable, DialogEvent, DialogScript, DialogSequencer, EntityDesc, EntityId, GameStateBag,
    InputSnapshot, Key, Scene, SceneCommand, SceneWorld, Vec2,
};
use tracing::{debug, info};

const TEXT_ANCHOR: Vec2 = Vec2::new(400.0, 500.0);

/// Presentation scene that plays the dialog script authored for its key and
/// advances once the last line is done. Space or Enter skips to the next
/// line.
pub(crate) struct DialogueScene {
    key: String,
    dialog: DialogSequencer,
    text_id: Option<EntityId>,
    done: bool,
}

impl DialogueScene {
    pub(crate) fn new(key: &str, script: Option<DialogScript>) -> Self {
        let script = script.unwrap_or_else(|| DialogScript::new(key));
        Self {
            key: key.to_string(),
            dialog: DialogSequencer::new(script),
            text_id: None,
            done: false,
        }
    }

    fn apply(&mut self, world: &mut SceneWorld, event: Option<DialogEvent>) {
        match event {
            Some(DialogEvent::Showing { index, text }) => {
                debug!(scene = %self.key, index, text = %text, "dialog_line");
                if let Some(id) = self.text_id {
                    world.set_label(id, Some(text));
                }
            }
            Some(DialogEvent::Completed) => self.done = true,
            None => {}
        }
    }
}

impl Scene for DialogueScene {
    fn load(&mut self, world: &mut SceneWorld, _state: &mut dyn GameStateBag) {
        let text = self.dialog.script().lines.first().map(|line| line.display_text());
        let mut desc = EntityDesc::new("dialog_text", TEXT_ANCHOR);
        if let Some(text) = text {
            desc = desc.with_label(&text);
        }
        self.text_id = Some(world.spawn(desc));

        let event = self.dialog.start();
        self.apply(world, event);
        info!(
            scene = %self.key,
            lines = self.dialog.script().lines.len(),
            auto_advance = self.dialog.script().auto_advance,
            "dialogue_started"
        );
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        _state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        if !self.done {
            let event = if input.just_pressed(Key::Space) || input.just_pressed(Key::Enter) {
                self.dialog.advance()
            } else {
                self.dialog.tick(fixed_dt)
            };
            self.apply(world, event);
        }

        if self.done {
            SceneCommand::advance()
        } else {
            SceneCommand::None
        }
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.dialog.cancel();
    }

    fn debug_title(&self) -> Option<String> {
        let total = self.dialog.script().lines.len();
        let shown = self.dialog.current_index().map_or(total, |index| index + 1);
        Some(format!("{} [{shown}/{total}]", self.key))
    }
}
