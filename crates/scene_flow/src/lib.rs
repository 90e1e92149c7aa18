use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod actions;
pub mod app;
pub mod content;
pub mod progress;

pub use actions::{
    Action, ActionKind, ActionSet, AttackAction, AttackConfig, AttackKind, AttackOutcome,
    HintLabel, HitTarget, Interactable, InteractionAction, InteractionConfig, InteractionOutcome,
    MovementAction, MovementConfig, MovementState, HIT_TINT,
};
pub use app::{
    run_headless, Advanceable, AnimationDesc, AnimationRegistry, Body, ChallengeStatus,
    DialogEvent, DialogSequencer, Entity, EntityDesc, EntityId, FrameClock, GameStateBag,
    IdleInput, InputSnapshot, InputSource, Key, KeyEdgeTracker, LoopConfig, LoopMetricsSnapshot,
    MachineStep, Objective, ObjectiveEvent, ObjectiveTracked, ObjectiveTracker, PhysicsConfig,
    PhysicsLayout, Platform, Reward, RunSummary, Scene, SceneCommand, SceneEntry, SceneFactory,
    SceneMachine, SceneMachineError, SceneWorld, SpriteConfig, SpriteEntity, TextureError,
    TextureRegistry, TimerHandle, TimerQueue, Vec2, WorldBounds, DEFAULT_RUN_THRESHOLD,
    MISSING_TEXTURE_KEY,
};
pub use content::{
    compile_scene_content, parse_scene_content_str, ContentCompileError, ContentErrorCode,
    DialogLine, DialogScript, SceneContent, SceneDescriptor, SceneKind, SceneTable,
    SceneTableError, SourceLocation, DEFAULT_ADVANCE_DELAY,
};
pub use progress::{
    FileStore, MemoryStore, ProgressError, ProgressSnapshot, ProgressStore, SceneOutcome,
    SceneRouter, StoreError, PROGRESS_STORAGE_KEY,
};

pub const ROOT_ENV_VAR: &str = "SCENE_FLOW_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    /// `<name>.png` files here load as texture `<name>`.
    pub sprite_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    /// Builds paths under an explicit root without touching the filesystem.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            content_dir: root.join("assets").join("base"),
            sprite_dir: root.join("assets").join("base").join("sprites"),
            save_dir: root.join("cache").join("saves"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "SCENE_FLOW_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/onboarding\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    prepare_app_paths(root)
}

/// Uses `root` as given (after normalization) and makes sure the save
/// directory exists.
pub fn prepare_app_paths(root: impl AsRef<Path>) -> Result<AppPaths, StartupError> {
    let paths = AppPaths::from_root(normalize_path(root.as_ref()));
    fs::create_dir_all(&paths.save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: paths.save_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn prepare_app_paths_creates_save_dir_under_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = prepare_app_paths(temp.path()).expect("paths");
        assert!(paths.save_dir.is_dir());
        assert!(paths.content_dir.ends_with("assets/base"));
        assert!(paths.sprite_dir.ends_with("assets/base/sprites"));
    }
}
