use std::ops::{Add, Mul, Sub};
use std::time::Duration;

use serde_json::Value;

use crate::progress::SceneOutcome;

use super::input::InputSnapshot;
use super::timer::TimerQueue;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    None,
    Transition { outcome: SceneOutcome, data: Value },
    /// Clears saved progress and plays the flow again from the first scene.
    Restart,
}

impl SceneCommand {
    pub fn advance() -> Self {
        Self::advance_with(Value::Null)
    }

    pub fn advance_with(data: Value) -> Self {
        Self::Transition {
            outcome: SceneOutcome::Advance,
            data,
        }
    }

    pub fn complete() -> Self {
        Self::Transition {
            outcome: SceneOutcome::Complete,
            data: Value::Null,
        }
    }

    pub fn fail() -> Self {
        Self::Transition {
            outcome: SceneOutcome::Fail,
            data: Value::Null,
        }
    }
}

/// Key-value progress state scenes may read and write while running.
pub trait GameStateBag {
    fn get_state(&self, key: &str, default: Value) -> Value;
    fn update_state(&mut self, key: &str, value: Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Arcade-style physics body. Positions are bottom-centre (feet), y grows
/// downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub velocity: Vec2,
    pub size: Vec2,
    pub allow_gravity: bool,
    pub immovable: bool,
    pub bounce: f32,
    pub collide_world_bounds: bool,
    on_ground: bool,
}

impl Body {
    pub fn dynamic(size: Vec2) -> Self {
        Self {
            velocity: Vec2::ZERO,
            size,
            allow_gravity: true,
            immovable: false,
            bounce: 0.2,
            collide_world_bounds: true,
            on_ground: false,
        }
    }

    pub fn fixed(size: Vec2) -> Self {
        Self {
            allow_gravity: false,
            immovable: true,
            collide_world_bounds: false,
            ..Self::dynamic(size)
        }
    }

    pub fn with_bounce(mut self, bounce: f32) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn with_world_bounds(mut self, collide: bool) -> Self {
        self.collide_world_bounds = collide;
        self
    }

    /// Standing on a platform or the world floor after the last step.
    pub fn on_ground(&self) -> bool {
        self.on_ground
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: Vec2,
    pub body: Option<Body>,
    pub texture_key: Option<String>,
    pub animation: Option<String>,
    pub label: Option<String>,
    pub tint: Option<u32>,
    pub scale: f32,
    pub flip_x: bool,
    pub visible: bool,
}

/// Everything needed to spawn an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDesc {
    pub name: String,
    pub position: Vec2,
    pub body: Option<Body>,
    pub texture_key: Option<String>,
    pub label: Option<String>,
    pub scale: f32,
}

impl EntityDesc {
    pub fn new(name: &str, position: Vec2) -> Self {
        Self {
            name: name.to_string(),
            position,
            body: None,
            texture_key: None,
            label: None,
            scale: 1.0,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_texture(mut self, texture_key: &str) -> Self {
        self.texture_key = Some(texture_key.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// Horizontal one-way surface: bodies falling onto it from above land,
/// bodies moving up pass through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub left: f32,
    pub right: f32,
    pub top: f32,
}

impl Platform {
    pub fn centered(center_x: f32, top: f32, width: f32) -> Self {
        Self {
            left: center_x - width * 0.5,
            right: center_x + width * 0.5,
            top,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    platforms: Vec<Platform>,
    bounds: Option<WorldBounds>,
    gravity: Vec2,
    tint_timers: TimerQueue<EntityId>,
}

impl SceneWorld {
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            name: desc.name,
            position: desc.position,
            body: desc.body,
            texture_key: desc.texture_key,
            animation: None,
            label: desc.label,
            tint: None,
            scale: desc.scale,
            flip_x: false,
            visible: true,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_spawns
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }

        self.entities.append(&mut self.pending_spawns);
    }

    /// Drops entities, platforms, bounds and pending tint timers.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.platforms.clear();
        self.bounds = None;
        self.gravity = Vec2::ZERO;
        self.tint_timers.cancel_all();
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    /// First entity spawned under `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn entities_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter(move |entity| entity.name == name)
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.find_entity(id).map(|entity| entity.position)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.find_entity(id).and_then(|entity| entity.body.as_ref())
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut Body> {
        self.find_entity_mut(id)
            .and_then(|entity| entity.body.as_mut())
    }

    pub fn set_label(&mut self, id: EntityId, label: Option<String>) {
        if let Some(entity) = self.find_entity_mut(id) {
            entity.label = label;
        }
    }

    pub fn distance_between(&self, a: EntityId, b: EntityId) -> Option<f32> {
        Some(self.position(a)?.distance(self.position(b)?))
    }

    pub fn add_platform(&mut self, platform: Platform) {
        self.platforms.push(platform);
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn set_bounds(&mut self, min: Vec2, max: Vec2) {
        self.bounds = Some(WorldBounds { min, max });
    }

    pub fn bounds(&self) -> Option<WorldBounds> {
        self.bounds
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Tints `id` and clears the tint after `duration` of world time.
    pub fn flash_tint(&mut self, id: EntityId, color: u32, duration: Duration) -> bool {
        let Some(entity) = self.find_entity_mut(id) else {
            return false;
        };
        entity.tint = Some(color);
        self.tint_timers.schedule(duration, id);
        true
    }

    /// Integrates bodies and fires world timers for one fixed tick.
    pub fn step(&mut self, dt: Duration) {
        let dt_seconds = dt.as_secs_f32();
        let gravity = self.gravity;

        for entity in &mut self.entities {
            let Some(body) = entity.body.as_mut() else {
                continue;
            };
            if body.immovable {
                continue;
            }

            if body.allow_gravity {
                body.velocity = body.velocity + gravity * dt_seconds;
            }
            let previous_y = entity.position.y;
            entity.position = entity.position + body.velocity * dt_seconds;
            body.on_ground = false;

            let half_width = body.size.x * 0.5;
            if body.velocity.y >= 0.0 {
                for platform in &self.platforms {
                    let overlaps = entity.position.x + half_width > platform.left
                        && entity.position.x - half_width < platform.right;
                    if overlaps
                        && previous_y <= platform.top
                        && entity.position.y >= platform.top
                    {
                        entity.position.y = platform.top;
                        body.velocity.y = 0.0;
                        body.on_ground = true;
                        break;
                    }
                }
            }

            if let (true, Some(bounds)) = (body.collide_world_bounds, self.bounds) {
                let min_x = bounds.min.x + half_width;
                let max_x = bounds.max.x - half_width;
                if entity.position.x < min_x {
                    entity.position.x = min_x;
                    body.velocity.x = -body.velocity.x * body.bounce;
                } else if entity.position.x > max_x {
                    entity.position.x = max_x;
                    body.velocity.x = -body.velocity.x * body.bounce;
                }
                if entity.position.y - body.size.y < bounds.min.y {
                    entity.position.y = bounds.min.y + body.size.y;
                    body.velocity.y = body.velocity.y.max(0.0);
                }
                if entity.position.y >= bounds.max.y {
                    entity.position.y = bounds.max.y;
                    body.velocity.y = 0.0;
                    body.on_ground = true;
                }
            }
        }

        for id in self.tint_timers.advance(dt) {
            if let Some(entity) = self.find_entity_mut(id) {
                entity.tint = None;
            }
        }
    }
}

/// A running scene. Instances are created fresh for every visit, so
/// `load` always starts from a clean slate.
pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag);
    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        state: &mut dyn GameStateBag,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self) -> Option<String> {
        None
    }
}
