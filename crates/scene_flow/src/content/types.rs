use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Presentation,
    Challenge,
}

impl SceneKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "presentation" => Some(Self::Presentation),
            "challenge" => Some(Self::Challenge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Presentation => "presentation",
            Self::Challenge => "challenge",
        }
    }
}

/// One entry of the scene flow table.
///
/// `next_scene == None` marks the terminal scene. `on_complete` is used when
/// a challenge reports its objectives done; `on_fail` when it reports a
/// failure (absent means "restart this scene").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescriptor {
    pub key: String,
    pub kind: SceneKind,
    pub next_scene: Option<String>,
    pub on_complete: Option<String>,
    pub on_fail: Option<String>,
}

impl SceneDescriptor {
    pub fn presentation(key: &str, next_scene: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            kind: SceneKind::Presentation,
            next_scene: next_scene.map(ToString::to_string),
            on_complete: None,
            on_fail: None,
        }
    }

    pub fn challenge(key: &str, next_scene: Option<&str>, on_complete: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            kind: SceneKind::Challenge,
            next_scene: next_scene.map(ToString::to_string),
            on_complete: on_complete.map(ToString::to_string),
            on_fail: None,
        }
    }

    pub fn with_on_fail(mut self, on_fail: &str) -> Self {
        self.on_fail = Some(on_fail.to_string());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.next_scene.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogLine {
    pub text: String,
    pub speaker: Option<String>,
    /// Overrides the script's advance delay for this line when present.
    pub duration: Option<Duration>,
}

impl DialogLine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            speaker: None,
            duration: None,
        }
    }

    pub fn spoken_by(mut self, speaker: &str) -> Self {
        self.speaker = Some(speaker.to_string());
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// `"Speaker: text"`, or just the text for narration.
    pub fn display_text(&self) -> String {
        match &self.speaker {
            Some(speaker) => format!("{speaker}: {}", self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogScript {
    pub scene_key: String,
    pub auto_advance: bool,
    pub advance_delay: Duration,
    pub lines: Vec<DialogLine>,
}

pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(3000);

impl DialogScript {
    pub fn new(scene_key: &str) -> Self {
        Self {
            scene_key: scene_key.to_string(),
            auto_advance: false,
            advance_delay: DEFAULT_ADVANCE_DELAY,
            lines: Vec::new(),
        }
    }
}
