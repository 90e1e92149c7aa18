//! Concrete scenes of the onboarding flow and the registry that maps scene
//! table keys to them.

mod achievement;
mod combat;
mod dialogue;
mod ending;
mod exploration;
mod runner;
mod sorting;

use scene_flow::{
    AnimationDesc, InputSnapshot, MovementAction, MovementConfig, MovementState, PhysicsConfig,
    Platform, SceneContent, SceneDescriptor, SceneEntry, SceneKind, SceneWorld, SpriteConfig,
    SpriteEntity, TextureRegistry, Vec2, DEFAULT_RUN_THRESHOLD,
};
use tracing::warn;

use achievement::AchievementScene;
use combat::CombatScene;
use dialogue::DialogueScene;
use ending::EndGameScene;
use exploration::ExplorationScene;
use runner::{RunnerScene, RunnerTuning};
use sorting::SortingScene;

pub(crate) use combat::ENEMY_NAME;
pub(crate) use exploration::CHEST_POSITION;
pub(crate) use runner::{FINISH_LINE_NAME, OBSTACLE_NAME, OBSTACLE_SIZE};
pub(crate) use sorting::SPHERES;

pub(crate) const WORLD_SIZE: Vec2 = Vec2::new(800.0, 600.0);
/// Feet height of anything standing on the ground strip.
pub(crate) const GROUND_TOP: f32 = 536.0;
pub(crate) const PLAYER_NAME: &str = "player";

/// One entry per descriptor in the table. Keys without a dedicated scene
/// play their dialog script, if any. Sprite scenes start each visit from a
/// copy of `textures`.
pub(crate) fn scene_entries(content: &SceneContent, textures: &TextureRegistry) -> Vec<SceneEntry> {
    content
        .table
        .descriptors()
        .iter()
        .map(|descriptor| entry_for(descriptor, content, textures))
        .collect()
}

fn entry_for(
    descriptor: &SceneDescriptor,
    content: &SceneContent,
    textures: &TextureRegistry,
) -> SceneEntry {
    let key = descriptor.key.as_str();
    let textures = textures.clone();
    match key {
        "SortingChallenge" => SceneEntry::new(key, move |_| {
            Box::new(SortingScene::new().with_textures(textures.clone()))
        }),
        "Exploration" => SceneEntry::new(key, move |_| {
            Box::new(ExplorationScene::new().with_textures(textures.clone()))
        }),
        "Combat" => SceneEntry::new(key, move |_| {
            Box::new(CombatScene::new().with_textures(textures.clone()))
        }),
        "Runner" => SceneEntry::new(key, move |_| {
            Box::new(RunnerScene::new(RunnerTuning::default()).with_textures(textures.clone()))
        }),
        "EndGame" => {
            let script = content.dialog(key).cloned();
            SceneEntry::new(key, move |descriptor| {
                Box::new(EndGameScene::new(&descriptor.key, script.as_ref()))
            })
        }
        _ if key.starts_with("Achievement") => {
            SceneEntry::new(key, |descriptor| Box::new(AchievementScene::new(&descriptor.key)))
        }
        _ => {
            if descriptor.kind == SceneKind::Challenge {
                warn!(scene = key, "challenge_without_scene_using_dialogue");
            }
            let script = content.dialog(key).cloned();
            SceneEntry::new(key, move |descriptor| {
                Box::new(DialogueScene::new(&descriptor.key, script.clone()))
            })
        }
    }
}

/// Horizontal gravity, world bounds and the ground strip every platforming
/// scene stands on.
pub(crate) fn setup_platformer(world: &mut SceneWorld) {
    PhysicsConfig::horizontal().apply(world, WORLD_SIZE);
    world.add_platform(Platform::centered(WORLD_SIZE.x * 0.5, GROUND_TOP, WORLD_SIZE.x));
}

pub(crate) fn spawn_character(
    world: &mut SceneWorld,
    textures: &mut TextureRegistry,
    name: &str,
    texture: &str,
    position: Vec2,
    movement: MovementConfig,
) -> SpriteEntity {
    let mut sprite = SpriteEntity::spawn(world, textures, name, position, SpriteConfig::new(texture));
    let idle = sprite.texture_key().to_string();
    sprite.register_animation(AnimationDesc::new("idle", &[idle.as_str()]));
    for (key, frames) in [
        ("walk", [format!("{texture}_walk_1"), format!("{texture}_walk_2")]),
        ("jump", [format!("{texture}_jump"), format!("{texture}_jump_2")]),
    ] {
        let frames: Vec<&str> = frames.iter().map(String::as_str).collect();
        if let Some(desc) = AnimationDesc::from_available(key, &frames, textures) {
            sprite.register_animation(desc);
        }
    }
    sprite.add_action(MovementAction::new(movement));
    sprite
}

/// Runs the sprite's movement action for this tick and picks the matching
/// animation.
pub(crate) fn drive_character(
    sprite: &mut SpriteEntity,
    world: &mut SceneWorld,
    input: &InputSnapshot,
) -> Option<MovementState> {
    let on_ground = sprite.is_on_ground(world);
    let state = sprite
        .actions()
        .movement()
        .map(|movement| movement.execute(world, sprite.id(), input, on_ground))?;
    sprite.update_animation(
        world,
        state.is_moving,
        on_ground,
        state.velocity_x,
        DEFAULT_RUN_THRESHOLD,
    );
    Some(state)
}
