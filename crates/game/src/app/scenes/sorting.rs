use std::time::Duration;

use scene_flow::{
    Body, EntityDesc, EntityId, GameStateBag, InputSnapshot, Key, MovementConfig, Objective,
    ObjectiveEvent, ObjectiveTracked, ObjectiveTracker, Platform, Scene, SceneCommand, SceneWorld,
    SpriteEntity, TextureRegistry, Vec2,
};
use serde_json::json;
use tracing::{debug, info};

use super::{drive_character, setup_platformer, spawn_character, GROUND_TOP, PLAYER_NAME};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SphereDef {
    pub(crate) key: &'static str,
    pub(crate) name: &'static str,
    /// Centre of the floor and its slots.
    pub(crate) x: f32,
    pub(crate) y: f32,
    /// `(id, name)` in the expected order.
    pub(crate) items: [(&'static str, &'static str); 4],
}

impl SphereDef {
    pub(crate) fn floor_top(&self) -> f32 {
        self.y - FLOOR_OFFSET
    }

    pub(crate) fn slot_x(&self, slot: usize) -> f32 {
        self.x - SLOT_SPACING * 1.5 + SLOT_SPACING * slot as f32
    }
}

pub(crate) const SPHERES: [SphereDef; 3] = [
    SphereDef {
        key: "dev",
        name: "DEV SPHERE",
        x: 500.0,
        y: 150.0,
        items: [
            ("dev_1", "Arquitectura"),
            ("dev_2", "Desarrollo"),
            ("dev_3", "QA"),
            ("dev_4", "Deploy"),
        ],
    },
    SphereDef {
        key: "design",
        name: "DESIGN SPHERE",
        x: 450.0,
        y: 300.0,
        items: [
            ("design_1", "Investigación"),
            ("design_2", "Wireframes"),
            ("design_3", "Diseño"),
            ("design_4", "Entregables"),
        ],
    },
    SphereDef {
        key: "pm",
        name: "PM SPHERE",
        x: 400.0,
        y: 450.0,
        items: [
            ("pm_1", "Validación scope"),
            ("pm_2", "Armado de roadmap"),
            ("pm_3", "Coordinación"),
            ("pm_4", "Comunicación cliente"),
        ],
    },
];

const FLOOR_OFFSET: f32 = 40.0;
const FLOOR_WIDTH: f32 = 400.0;
const SLOT_SPACING: f32 = 100.0;
/// Half extents of the area around a slot where a carried item can be
/// placed.
const SLOT_REACH: Vec2 = Vec2::new(55.0, 40.0);
const PICKUP_RANGE: f32 = 80.0;
const ITEM_SIZE: Vec2 = Vec2::new(100.0, 40.0);
const ITEMS_START_X: f32 = 150.0;
const ITEMS_END_X: f32 = 700.0;
const CARRY_OFFSET_Y: f32 = -50.0;
const DROP_OFFSET: Vec2 = Vec2::new(30.0, -20.0);
const PLAYER_SPAWN: Vec2 = Vec2::new(100.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Ground,
    Carried,
    Placed { sphere: usize, slot: usize },
}

#[derive(Debug, Clone)]
struct SortItem {
    id: &'static str,
    name: &'static str,
    sphere: usize,
    order: usize,
    entity: EntityId,
    state: ItemState,
}

impl SortItem {
    fn is_correctly_placed(&self) -> bool {
        self.state
            == ItemState::Placed {
                sphere: self.sphere,
                slot: self.order,
            }
    }
}

#[derive(Debug, Default)]
struct SortingProgress {
    all_completed: bool,
}

/// Carry the twelve work items up to their sphere floors and put each one
/// in its slot, in order. Correct placements lock in place.
pub(crate) struct SortingScene {
    textures: TextureRegistry,
    player: Option<SpriteEntity>,
    hint_entity: Option<EntityId>,
    items: Vec<SortItem>,
    slots: [[Option<usize>; 4]; 3],
    completed_spheres: [bool; 3],
    carried: Option<usize>,
    interact_was_down: bool,
    progress: SortingProgress,
    tracker: ObjectiveTracker<SortingProgress>,
}

impl SortingScene {
    pub(crate) fn new() -> Self {
        let mut tracker = ObjectiveTracker::new();
        tracker.add_objective(Objective::manual(
            "complete_all_spheres",
            "Ordena todos los items correctamente en cada sphere",
        ));
        Self {
            textures: TextureRegistry::new(),
            player: None,
            hint_entity: None,
            items: Vec::new(),
            slots: [[None; 4]; 3],
            completed_spheres: [false; 3],
            carried: None,
            interact_was_down: false,
            progress: SortingProgress::default(),
            tracker,
        }
    }

    pub(crate) fn with_textures(mut self, textures: TextureRegistry) -> Self {
        self.textures = textures;
        self
    }

    fn nearest_pickable(&self, from: Vec2, world: &SceneWorld) -> Option<usize> {
        let mut nearest: Option<(usize, f32)> = None;
        for (index, item) in self.items.iter().enumerate() {
            if item.state == ItemState::Carried || item.is_correctly_placed() {
                continue;
            }
            let Some(position) = world.position(item.entity) else {
                continue;
            };
            let distance = from.distance(position);
            if distance < nearest.map_or(PICKUP_RANGE, |(_, best)| best) {
                nearest = Some((index, distance));
            }
        }
        nearest.map(|(index, _)| index)
    }

    /// Empty slot of the carried item's sphere the player is standing at.
    fn target_slot(&self, from: Vec2, sphere: usize) -> Option<usize> {
        let def = &SPHERES[sphere];
        (0..4).find(|slot| {
            self.slots[sphere][*slot].is_none()
                && (from.x - def.slot_x(*slot)).abs() <= SLOT_REACH.x
                && (from.y - def.floor_top()).abs() <= SLOT_REACH.y
        })
    }

    fn pick_up(&mut self, index: usize, world: &mut SceneWorld) {
        if let ItemState::Placed { sphere, slot } = self.items[index].state {
            self.slots[sphere][slot] = None;
            self.completed_spheres[sphere] = false;
        }
        let item = &mut self.items[index];
        item.state = ItemState::Carried;
        if let Some(body) = world.body_mut(item.entity) {
            body.allow_gravity = false;
            body.immovable = false;
            body.velocity = Vec2::ZERO;
        }
        self.carried = Some(index);
        debug!(item = item.id, "item_picked_up");
    }

    fn drop_carried(&mut self, from: Vec2, facing_left: bool, world: &mut SceneWorld) {
        let Some(index) = self.carried.take() else {
            return;
        };
        let item = &mut self.items[index];
        item.state = ItemState::Ground;
        let offset_x = if facing_left { -DROP_OFFSET.x } else { DROP_OFFSET.x };
        world.set_position(item.entity, Vec2::new(from.x + offset_x, from.y + DROP_OFFSET.y));
        if let Some(body) = world.body_mut(item.entity) {
            body.allow_gravity = true;
            body.velocity = Vec2::ZERO;
        }
        debug!(item = item.id, "item_dropped");
    }

    fn place_carried(&mut self, sphere: usize, slot: usize, world: &mut SceneWorld) {
        let Some(index) = self.carried.take() else {
            return;
        };
        let def = &SPHERES[sphere];
        let item = &mut self.items[index];
        item.state = ItemState::Placed { sphere, slot };
        world.set_position(item.entity, Vec2::new(def.slot_x(slot), def.floor_top()));
        if let Some(body) = world.body_mut(item.entity) {
            body.allow_gravity = false;
            body.immovable = true;
            body.velocity = Vec2::ZERO;
        }
        self.slots[sphere][slot] = Some(index);
        info!(
            item = item.id,
            sphere = def.key,
            slot,
            correct = item.is_correctly_placed(),
            "item_placed"
        );
    }

    /// Refreshes per-sphere completion; `true` once every sphere is sorted.
    fn check_spheres(&mut self) -> bool {
        for (sphere, slots) in self.slots.iter().enumerate() {
            let correct = slots.iter().enumerate().all(|(slot, occupant)| {
                occupant.is_some_and(|index| {
                    let item = &self.items[index];
                    item.sphere == sphere && item.order == slot
                })
            });
            if correct && !self.completed_spheres[sphere] {
                info!(sphere = SPHERES[sphere].key, "sphere_completed");
            }
            self.completed_spheres[sphere] = correct;
        }
        self.completed_spheres.iter().all(|done| *done)
    }

    fn hint_text(&self, from: Vec2, world: &SceneWorld) -> Option<String> {
        match self.carried {
            Some(index) => {
                let item = &self.items[index];
                Some(match self.target_slot(from, item.sphere) {
                    Some(_) => format!("[E] Colocar: {}", item.name),
                    None => format!("[E] Soltar: {}", item.name),
                })
            }
            None => self
                .nearest_pickable(from, world)
                .map(|index| self.items[index].name.to_string()),
        }
    }
}

impl Scene for SortingScene {
    fn load(&mut self, world: &mut SceneWorld, _state: &mut dyn GameStateBag) {
        setup_platformer(world);
        for def in &SPHERES {
            world.add_platform(Platform::centered(def.x, def.floor_top(), FLOOR_WIDTH));
            world.spawn(
                EntityDesc::new("sphere_label", Vec2::new(def.x, def.y - 35.0))
                    .with_label(def.name),
            );
            for slot in 0..4 {
                world.spawn(EntityDesc::new(
                    "slot",
                    Vec2::new(def.slot_x(slot), def.floor_top()),
                ));
            }
        }

        let total = SPHERES.iter().map(|def| def.items.len()).sum::<usize>();
        let spacing = (ITEMS_END_X - ITEMS_START_X) / (total - 1) as f32;
        for (sphere, def) in SPHERES.iter().enumerate() {
            for (order, (id, name)) in def.items.iter().copied().enumerate() {
                let x = ITEMS_START_X + spacing * self.items.len() as f32;
                let entity = world.spawn(
                    EntityDesc::new(id, Vec2::new(x, GROUND_TOP))
                        .with_texture(&format!("item_{id}"))
                        .with_label(name)
                        .with_body(Body::dynamic(ITEM_SIZE)),
                );
                self.items.push(SortItem {
                    id,
                    name,
                    sphere,
                    order,
                    entity,
                    state: ItemState::Ground,
                });
            }
        }

        self.player = Some(spawn_character(
            world,
            &mut self.textures,
            PLAYER_NAME,
            "player",
            PLAYER_SPAWN,
            MovementConfig {
                jump_speed: -550.0,
                ..MovementConfig::default()
            },
        ));
        self.hint_entity = Some(world.spawn(EntityDesc::new("hint", PLAYER_SPAWN)));
        info!(items = self.items.len(), spheres = SPHERES.len(), "sorting_ready");
    }

    fn update(
        &mut self,
        _fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        if self.progress.all_completed {
            return SceneCommand::None;
        }
        let Some(player) = self.player.as_mut() else {
            return SceneCommand::None;
        };
        drive_character(player, world, input);
        let player_id = player.id();
        let Some(from) = world.position(player_id) else {
            return SceneCommand::None;
        };
        let facing_left = world.find_entity(player_id).is_some_and(|entity| entity.flip_x);

        let interact_down = input.is_down(Key::Interact);
        let pressed = interact_down && !self.interact_was_down;
        self.interact_was_down = interact_down;

        if pressed {
            match self.carried {
                Some(index) => match self.target_slot(from, self.items[index].sphere) {
                    Some(slot) => self.place_carried(self.items[index].sphere, slot, world),
                    None => self.drop_carried(from, facing_left, world),
                },
                None => {
                    if let Some(index) = self.nearest_pickable(from, world) {
                        self.pick_up(index, world);
                    }
                }
            }
        }

        if let Some(index) = self.carried {
            let carried_at = Vec2::new(from.x, from.y + CARRY_OFFSET_Y);
            world.set_position(self.items[index].entity, carried_at);
        }
        if let Some(hint_id) = self.hint_entity {
            let text = self.hint_text(from, world);
            world.set_label(hint_id, text);
            world.set_position(hint_id, Vec2::new(from.x, from.y - 60.0));
        }

        if pressed && self.check_spheres() {
            self.progress.all_completed = true;
            state.update_state("sorting.completed", json!(true));
            let events = self
                .tracker
                .complete_objective("complete_all_spheres", &mut self.progress);
            if events.contains(&ObjectiveEvent::ChallengeCompleted) {
                return SceneCommand::complete();
            }
        }
        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.carried = None;
    }

    fn debug_title(&self) -> Option<String> {
        let sorted = self.completed_spheres.iter().filter(|done| **done).count();
        Some(format!("SortingChallenge [{sorted}/{}]", SPHERES.len()))
    }
}
