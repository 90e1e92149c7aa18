use std::collections::HashMap;

use tracing::{debug, warn};

use crate::actions::{Action, ActionSet};

use super::scene::{Body, EntityDesc, EntityId, SceneWorld, Vec2};
use super::textures::{TextureRegistry, MISSING_TEXTURE_SIZE};

/// Horizontal speed above which a moving sprite runs instead of walking.
pub const DEFAULT_RUN_THRESHOLD: f32 = 160.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteConfig {
    pub texture_key: String,
    pub scale: f32,
    pub physics: bool,
    pub origin: Vec2,
    /// Explicit hitbox; defaults to 70% x 80% of the scaled texture.
    pub hitbox: Option<Vec2>,
    pub hitbox_offset: Vec2,
    pub bounce: f32,
    pub collide_world_bounds: bool,
}

impl SpriteConfig {
    pub fn new(texture_key: &str) -> Self {
        Self {
            texture_key: texture_key.to_string(),
            scale: 1.0,
            physics: true,
            origin: Vec2::new(0.5, 1.0),
            hitbox: None,
            hitbox_offset: Vec2::ZERO,
            bounce: 0.2,
            collide_world_bounds: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationDesc {
    pub key: String,
    /// Texture keys, one per frame.
    pub frames: Vec<String>,
    pub frame_rate: u32,
    /// `-1` loops forever.
    pub repeat: i32,
}

impl AnimationDesc {
    pub fn new(key: &str, frames: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            frames: frames.iter().map(ToString::to_string).collect(),
            frame_rate: 10,
            repeat: -1,
        }
    }

    /// Keeps only the candidate frames that exist; `None` if none do.
    pub fn from_available(key: &str, candidates: &[&str], textures: &TextureRegistry) -> Option<Self> {
        let frames: Vec<&str> = candidates
            .iter()
            .copied()
            .filter(|frame| textures.exists(frame))
            .collect();
        if frames.is_empty() {
            return None;
        }
        Some(Self::new(key, &frames))
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_repeat(mut self, repeat: i32) -> Self {
        self.repeat = repeat;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationRegistry {
    animations: HashMap<String, AnimationDesc>,
}

impl AnimationRegistry {
    pub fn register(&mut self, desc: AnimationDesc) {
        self.animations.insert(desc.key.clone(), desc);
    }

    pub fn get(&self, key: &str) -> Option<&AnimationDesc> {
        self.animations.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.animations.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn clear(&mut self) {
        self.animations.clear();
    }
}

/// A world entity plus the behaviours and animations attached to it.
#[derive(Debug)]
pub struct SpriteEntity {
    id: EntityId,
    config: SpriteConfig,
    texture_key: String,
    actions: ActionSet,
    animations: AnimationRegistry,
    animation_prefix: String,
    current_animation: Option<String>,
}

impl SpriteEntity {
    /// Spawns the backing entity. A missing texture falls back to the
    /// generated placeholder instead of failing.
    pub fn spawn(
        world: &mut SceneWorld,
        textures: &mut TextureRegistry,
        name: &str,
        position: Vec2,
        config: SpriteConfig,
    ) -> Self {
        let texture_key = textures.resolve_or_placeholder(&config.texture_key);
        let (width, height) = textures
            .dimensions(&texture_key)
            .unwrap_or(MISSING_TEXTURE_SIZE);
        let scaled = Vec2::new(width as f32 * config.scale, height as f32 * config.scale);

        let mut desc = EntityDesc::new(name, position)
            .with_texture(&texture_key)
            .with_scale(config.scale);
        if config.physics {
            let hitbox = config
                .hitbox
                .unwrap_or(Vec2::new(scaled.x * 0.7, scaled.y * 0.8));
            desc = desc.with_body(
                Body::dynamic(hitbox)
                    .with_bounce(config.bounce)
                    .with_world_bounds(config.collide_world_bounds),
            );
        }
        let id = world.spawn(desc);
        debug!(sprite = name, texture = %texture_key, physics = config.physics, "sprite_spawned");

        Self {
            id,
            config,
            texture_key,
            actions: ActionSet::new(),
            animations: AnimationRegistry::default(),
            animation_prefix: String::new(),
            current_animation: None,
        }
    }

    /// Prefix applied by `update_animation`, e.g. `"enemy_"`.
    pub fn with_animation_prefix(mut self, prefix: &str) -> Self {
        self.animation_prefix = prefix.to_string();
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    pub fn texture_key(&self) -> &str {
        &self.texture_key
    }

    pub fn position(&self, world: &SceneWorld) -> Option<Vec2> {
        world.position(self.id)
    }

    pub fn is_on_ground(&self, world: &SceneWorld) -> bool {
        world.body(self.id).is_some_and(Body::on_ground)
    }

    pub fn add_action(&mut self, action: impl Into<Action>) {
        self.actions.insert(action);
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionSet {
        &mut self.actions
    }

    pub fn animations(&self) -> &AnimationRegistry {
        &self.animations
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current_animation.as_deref()
    }

    pub fn register_animation(&mut self, desc: AnimationDesc) {
        self.animations.register(desc);
    }

    /// Plays `key` unless it is already playing. Unknown keys are logged
    /// and ignored.
    pub fn play_animation(&mut self, world: &mut SceneWorld, key: &str) -> bool {
        if !self.animations.contains(key) {
            warn!(animation = key, texture = %self.texture_key, "animation_missing");
            return false;
        }
        if self.current_animation.as_deref() == Some(key) {
            return true;
        }
        self.current_animation = Some(key.to_string());
        if let Some(entity) = world.find_entity_mut(self.id) {
            entity.animation = Some(key.to_string());
        }
        true
    }

    /// Picks jump, run, walk or idle from the movement state. Jump, run and
    /// walk are only chosen when registered.
    pub fn update_animation(
        &mut self,
        world: &mut SceneWorld,
        is_moving: bool,
        is_on_ground: bool,
        velocity_x: f32,
        run_threshold: f32,
    ) -> Option<String> {
        let key = if !is_on_ground {
            Some(self.prefixed("jump")).filter(|key| self.animations.contains(key))
        } else if is_moving {
            let run = self.prefixed("run");
            let walk = self.prefixed("walk");
            if velocity_x.abs() > run_threshold && self.animations.contains(&run) {
                Some(run)
            } else {
                Some(walk).filter(|key| self.animations.contains(key))
            }
        } else {
            Some(self.prefixed("idle"))
        }?;

        self.play_animation(world, &key).then_some(key)
    }

    pub fn set_texture(&mut self, world: &mut SceneWorld, textures: &mut TextureRegistry, key: &str) {
        self.texture_key = textures.resolve_or_placeholder(key);
        if let Some(entity) = world.find_entity_mut(self.id) {
            entity.texture_key = Some(self.texture_key.clone());
        }
    }

    pub fn destroy(mut self, world: &mut SceneWorld) {
        self.actions.clear();
        self.animations.clear();
        world.despawn(self.id);
    }

    fn prefixed(&self, name: &str) -> String {
        format!("{}{name}", self.animation_prefix)
    }
}
