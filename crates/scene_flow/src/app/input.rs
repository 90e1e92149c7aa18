#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Space,
    Interact,
    Enter,
    Pointer,
    Restart,
}

const KEY_COUNT: usize = 9;

impl Key {
    pub const ALL: [Key; KEY_COUNT] = [
        Key::Left,
        Key::Right,
        Key::Up,
        Key::Down,
        Key::Space,
        Key::Interact,
        Key::Enter,
        Key::Pointer,
        Key::Restart,
    ];

    const fn index(self) -> usize {
        match self {
            Key::Left => 0,
            Key::Right => 1,
            Key::Up => 2,
            Key::Down => 3,
            Key::Space => 4,
            Key::Interact => 5,
            Key::Enter => 6,
            Key::Pointer => 7,
            Key::Restart => 8,
        }
    }

    /// Label used in on-screen prompts.
    pub fn label(self) -> &'static str {
        match self {
            Key::Left => "LEFT",
            Key::Right => "RIGHT",
            Key::Up => "UP",
            Key::Down => "DOWN",
            Key::Space => "SPACE",
            Key::Interact => "E",
            Key::Enter => "ENTER",
            Key::Pointer => "CLICK",
            Key::Restart => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct KeyStates {
    down: [bool; KEY_COUNT],
}

impl KeyStates {
    pub(crate) fn set(&mut self, key: Key, is_down: bool) {
        self.down[key.index()] = is_down;
    }

    pub(crate) fn is_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }
}

/// Key state for a single tick: level (`is_down`) plus the press edges the
/// host computed against the previous tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    down: KeyStates,
    pressed: KeyStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.down.is_down(key)
    }

    pub fn just_pressed(&self, key: Key) -> bool {
        self.pressed.is_down(key)
    }

    pub fn any_down(&self) -> bool {
        Key::ALL.iter().any(|key| self.is_down(*key))
    }

    pub fn with_key_down(mut self, key: Key, is_down: bool) -> Self {
        self.down.set(key, is_down);
        self
    }

    /// Marks a fresh press; a pressed key is also down.
    pub fn with_key_pressed(mut self, key: Key) -> Self {
        self.down.set(key, true);
        self.pressed.set(key, true);
        self
    }
}

/// Turns successive level states into snapshots with press edges.
#[derive(Debug, Clone, Default)]
pub struct KeyEdgeTracker {
    previous: KeyStates,
}

impl KeyEdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&mut self, down: &[Key]) -> InputSnapshot {
        let mut current = KeyStates::default();
        for key in down {
            current.set(*key, true);
        }

        let mut pressed = KeyStates::default();
        for key in Key::ALL {
            if current.is_down(key) && !self.previous.is_down(key) {
                pressed.set(key, true);
            }
        }

        self.previous = current;
        InputSnapshot {
            down: current,
            pressed,
        }
    }

    pub fn reset(&mut self) {
        self.previous = KeyStates::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_is_pressed_only_on_first_tick() {
        let mut tracker = KeyEdgeTracker::new();

        let first = tracker.snapshot(&[Key::Interact]);
        let second = tracker.snapshot(&[Key::Interact]);
        let released = tracker.snapshot(&[]);
        let again = tracker.snapshot(&[Key::Interact]);

        assert!(first.just_pressed(Key::Interact));
        assert!(second.is_down(Key::Interact));
        assert!(!second.just_pressed(Key::Interact));
        assert!(!released.is_down(Key::Interact));
        assert!(again.just_pressed(Key::Interact));
    }

    #[test]
    fn builder_press_implies_down() {
        let snapshot = InputSnapshot::empty().with_key_pressed(Key::Space);
        assert!(snapshot.is_down(Key::Space));
        assert!(snapshot.just_pressed(Key::Space));
        assert!(!snapshot.is_down(Key::Left));
        assert!(snapshot.any_down());
    }

    #[test]
    fn keys_are_tracked_independently() {
        let snapshot = InputSnapshot::empty()
            .with_key_down(Key::Left, true)
            .with_key_down(Key::Right, true)
            .with_key_down(Key::Left, false);
        assert!(!snapshot.is_down(Key::Left));
        assert!(snapshot.is_down(Key::Right));
        assert!(!InputSnapshot::empty().any_down());
    }
}
