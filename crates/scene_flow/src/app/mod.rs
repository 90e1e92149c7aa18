mod challenge;
mod input;
mod loop_runner;
mod machine;
mod metrics;
mod physics;
mod presentation;
mod scene;
mod sprite;
mod textures;
mod timer;

pub use challenge::{
    ChallengeStatus, Objective, ObjectiveEvent, ObjectiveTracked, ObjectiveTracker, Reward,
};
pub use input::{InputSnapshot, Key, KeyEdgeTracker};
pub use loop_runner::{
    run_headless, FrameClock, IdleInput, InputSource, LoopConfig, RunSummary, StepPlan,
};
pub use machine::{MachineStep, SceneEntry, SceneFactory, SceneMachine, SceneMachineError};
pub use metrics::LoopMetricsSnapshot;
pub use physics::{PhysicsConfig, PhysicsLayout};
pub use presentation::{Advanceable, DialogEvent, DialogSequencer};
pub use scene::{
    Body, Entity, EntityDesc, EntityId, EntityIdAllocator, GameStateBag, Platform, Scene,
    SceneCommand, SceneWorld, Vec2, WorldBounds,
};
pub use sprite::{
    AnimationDesc, AnimationRegistry, SpriteConfig, SpriteEntity, DEFAULT_RUN_THRESHOLD,
};
pub use textures::{TextureError, TextureRegistry, MISSING_TEXTURE_KEY, MISSING_TEXTURE_SIZE};
pub use timer::{TimerHandle, TimerQueue};
