use std::time::Duration;

use tracing::debug;

use crate::content::{DialogLine, DialogScript};

use super::timer::{TimerHandle, TimerQueue};

/// Something that steps through a sequence and reports when it is done.
pub trait Advanceable {
    fn start(&mut self) -> Option<DialogEvent>;
    /// Explicit "next" signal.
    fn advance(&mut self) -> Option<DialogEvent>;
    /// Elapsed-time signal.
    fn tick(&mut self, dt: Duration) -> Option<DialogEvent>;
    fn is_complete(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEvent {
    Showing { index: usize, text: String },
    /// Raised exactly once per sequencer.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogState {
    Idle,
    Showing(usize),
    Complete,
}

/// Walks a dialog script line by line: idle, then each line in turn, then
/// complete. Does not navigate; the owning scene reacts to `Completed`.
#[derive(Debug)]
pub struct DialogSequencer {
    script: DialogScript,
    state: DialogState,
    timers: TimerQueue<usize>,
    auto_timer: Option<TimerHandle>,
}

impl DialogSequencer {
    pub fn new(script: DialogScript) -> Self {
        Self {
            script,
            state: DialogState::Idle,
            timers: TimerQueue::new(),
            auto_timer: None,
        }
    }

    pub fn script(&self) -> &DialogScript {
        &self.script
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            DialogState::Showing(index) => Some(index),
            _ => None,
        }
    }

    pub fn current_line(&self) -> Option<&DialogLine> {
        self.current_index()
            .and_then(|index| self.script.lines.get(index))
    }

    pub fn current_text(&self) -> Option<String> {
        self.current_line().map(DialogLine::display_text)
    }

    /// Drops any pending auto-advance.
    pub fn cancel(&mut self) {
        self.timers.cancel_all();
        self.auto_timer = None;
    }

    fn show(&mut self, index: usize) -> Option<DialogEvent> {
        let line = self.script.lines.get(index)?;
        let text = line.display_text();
        let delay = line.duration.unwrap_or(self.script.advance_delay);

        self.cancel();
        self.state = DialogState::Showing(index);
        if self.script.auto_advance {
            self.auto_timer = Some(self.timers.schedule(delay, index));
        }
        debug!(
            scene = %self.script.scene_key,
            index,
            auto_advance_ms = self.script.auto_advance.then(|| delay.as_millis() as u64),
            "dialog_line_shown"
        );
        Some(DialogEvent::Showing { index, text })
    }

    fn finish(&mut self) -> Option<DialogEvent> {
        self.cancel();
        self.state = DialogState::Complete;
        debug!(scene = %self.script.scene_key, "dialogs_complete");
        Some(DialogEvent::Completed)
    }
}

impl Advanceable for DialogSequencer {
    /// An empty script completes immediately.
    fn start(&mut self) -> Option<DialogEvent> {
        if self.state != DialogState::Idle {
            return None;
        }
        if self.script.lines.is_empty() {
            return self.finish();
        }
        self.show(0)
    }

    fn advance(&mut self) -> Option<DialogEvent> {
        match self.state {
            DialogState::Showing(index) if index + 1 < self.script.lines.len() => {
                self.show(index + 1)
            }
            DialogState::Showing(_) => self.finish(),
            DialogState::Idle | DialogState::Complete => None,
        }
    }

    fn tick(&mut self, dt: Duration) -> Option<DialogEvent> {
        let fired = self.timers.advance(dt);
        match (self.state, fired.last()) {
            (DialogState::Showing(index), Some(fired_index)) if index == *fired_index => {
                self.advance()
            }
            _ => None,
        }
    }

    fn is_complete(&self) -> bool {
        self.state == DialogState::Complete
    }
}
