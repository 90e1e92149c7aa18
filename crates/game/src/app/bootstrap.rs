use std::io;
use std::path::Path;

use scene_flow::{
    compile_scene_content, prepare_app_paths, resolve_app_paths, AppPaths, ContentCompileError,
    FileStore, ProgressError, SceneContent, SceneMachine, SceneMachineError, SceneRouter,
    StartupError, StoreError, TextureError, TextureRegistry,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scenes;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentCompileError),
    #[error(transparent)]
    Scenes(#[from] SceneMachineError),
    #[error(transparent)]
    Textures(#[from] TextureError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error("saved progress is malformed at '{path}': {source}")]
    SnapshotParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown scene '{key}'")]
    UnknownScene { key: String },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Paths, compiled content and decoded sprites; everything a command needs
/// before it touches progress.
pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) content: SceneContent,
    pub(crate) textures: TextureRegistry,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_app(root: Option<&Path>) -> Result<AppWiring, AppError> {
    let paths = match root {
        Some(root) => prepare_app_paths(root)?,
        None => resolve_app_paths()?,
    };
    let content = compile_scene_content(&paths)?;
    let mut textures = TextureRegistry::new();
    textures.load_dir(&paths.sprite_dir)?;
    info!(
        root = %paths.root.display(),
        scenes = content.table.len(),
        textures = textures.len(),
        "=== Onboarding Startup ==="
    );
    Ok(AppWiring {
        paths,
        content,
        textures,
    })
}

/// Router over the durable save directory with any saved progress
/// restored.
pub(crate) fn build_router(app: &AppWiring) -> SceneRouter<FileStore> {
    let store = FileStore::new(&app.paths.save_dir);
    let mut router = SceneRouter::new(app.content.table.clone(), store);
    router.set_on_scene_change(|descriptor, data| {
        info!(scene = %descriptor.key, data = %data, "scene_change");
    });
    if router.load_state().is_none() {
        info!("progress_fresh_start");
    }
    router
}

pub(crate) fn build_machine(app: &AppWiring) -> Result<SceneMachine<FileStore>, AppError> {
    let router = build_router(app);
    Ok(SceneMachine::new(router, scenes::scene_entries(&app.content, &app.textures))?)
}
