use std::time::Duration;

use scene_flow::{Entity, EntityId, InputSnapshot, InputSource, Key, KeyEdgeTracker, SceneWorld};

use super::scenes::{
    CHEST_POSITION, ENEMY_NAME, FINISH_LINE_NAME, GROUND_TOP, OBSTACLE_NAME, OBSTACLE_SIZE,
    PLAYER_NAME, SPHERES,
};

/// Horizontal distance treated as "arrived".
const ARRIVE_TOLERANCE: f32 = 4.0;
const INTERACT_RANGE: f32 = 80.0;
const CLIMB_COLUMN_X: f32 = 450.0;
const DESCEND_X: f32 = 740.0;
const CARRY_OFFSET_Y: f32 = 50.0;
const COMBAT_STRIKE_DISTANCE: f32 = 90.0;
const PRESENTATION_TAP_TICKS: u64 = 30;
const RUNNER_TAP_TICKS: u64 = 6;
/// Half the rise time of a jump at 500 px/s against 800 px/s² gravity.
const RUNNER_APEX_SECONDS: f32 = 0.625;
const RUNNER_MIN_LEAD_SECONDS: f32 = 0.18;

/// Scripted input that plays the onboarding flow end to end, one strategy
/// per scene key. Reads only what a player could see: entity positions.
#[derive(Debug)]
pub(crate) struct DemoPilot {
    tick_seconds: f32,
    edges: KeyEdgeTracker,
    held: Vec<Key>,
    visit: Option<(String, Option<EntityId>)>,
    ticks_in_visit: u64,
    platform_target: Option<(f32, f32)>,
    previous_finish_x: Option<f32>,
}

impl DemoPilot {
    pub(crate) fn new(fixed_dt: Duration) -> Self {
        Self {
            tick_seconds: fixed_dt.as_secs_f32().max(f32::EPSILON),
            edges: KeyEdgeTracker::new(),
            held: Vec::new(),
            visit: None,
            ticks_in_visit: 0,
            platform_target: None,
            previous_finish_x: None,
        }
    }

    /// A restarted scene spawns a new player, so a new id means a new visit
    /// even when the key is unchanged.
    fn track_visit(&mut self, scene_key: &str, player: Option<EntityId>) {
        let same = self
            .visit
            .as_ref()
            .is_some_and(|(key, id)| key == scene_key && *id == player);
        if same {
            self.ticks_in_visit += 1;
            return;
        }
        self.visit = Some((scene_key.to_string(), player));
        self.ticks_in_visit = 0;
        self.platform_target = None;
        self.previous_finish_x = None;
    }

    /// `true` when `key` can produce a fresh press this tick.
    fn can_tap(&self, key: Key) -> bool {
        !self.held.contains(&key)
    }

    fn presentation(&self) -> Vec<Key> {
        if self.ticks_in_visit % PRESENTATION_TAP_TICKS == PRESENTATION_TAP_TICKS - 1 {
            vec![Key::Space]
        } else {
            Vec::new()
        }
    }

    fn exploration(&mut self, world: &SceneWorld, player: &Entity) -> Vec<Key> {
        let at = player.position;
        let grounded = on_ground(player);
        if grounded {
            self.platform_target = world
                .platforms()
                .iter()
                .filter(|platform| platform.top < at.y - 1.0)
                .max_by(|a, b| a.top.total_cmp(&b.top))
                .map(|platform| ((platform.left + platform.right) * 0.5, platform.top));
        }

        let Some((target_x, _)) = self.platform_target else {
            if !grounded {
                return Vec::new();
            }
            let chest = world
                .find_by_name("chest")
                .map_or(CHEST_POSITION, |chest| chest.position);
            let mut keys = steer(at.x, chest.x);
            if at.distance(chest) <= INTERACT_RANGE && self.can_tap(Key::Interact) {
                keys.push(Key::Interact);
            }
            return keys;
        };

        if grounded && (target_x - at.x).abs() > 150.0 {
            return steer(at.x, target_x);
        }
        let mut keys = steer(at.x, target_x);
        if grounded {
            keys.push(Key::Up);
        }
        keys
    }

    fn sorting(&self, world: &SceneWorld, player: &Entity) -> Vec<Key> {
        let at = player.position;
        let grounded = on_ground(player);
        let mut next = None;
        'spheres: for sphere in SPHERES.iter().rev() {
            for (slot, (id, _)) in sphere.items.iter().enumerate() {
                let Some(item) = world.find_by_name(id) else {
                    continue;
                };
                let placed = (item.position.x - sphere.slot_x(slot)).abs() < 1.0
                    && (item.position.y - sphere.floor_top()).abs() < 1.0;
                if !placed {
                    next = Some((sphere, slot, item));
                    break 'spheres;
                }
            }
        }
        let Some((sphere, slot, item)) = next else {
            return Vec::new();
        };
        if !grounded {
            return Vec::new();
        }

        let carried = (item.position.x - at.x).abs() < 8.0
            && (item.position.y - (at.y - CARRY_OFFSET_Y)).abs() < 15.0;
        if carried {
            let floor_top = sphere.floor_top();
            if (at.y - floor_top).abs() < 2.0 {
                let slot_x = sphere.slot_x(slot);
                if (slot_x - at.x).abs() <= ARRIVE_TOLERANCE {
                    return self.tap(Key::Interact);
                }
                return steer(at.x, slot_x);
            }
            if at.y < floor_top {
                return steer(at.x, DESCEND_X);
            }
            if (CLIMB_COLUMN_X - at.x).abs() > ARRIVE_TOLERANCE {
                return steer(at.x, CLIMB_COLUMN_X);
            }
            return vec![Key::Up];
        }

        if at.y < GROUND_TOP - 2.0 {
            return steer(at.x, DESCEND_X);
        }
        if (item.position.x - at.x).abs() <= ARRIVE_TOLERANCE {
            return self.tap(Key::Interact);
        }
        steer(at.x, item.position.x)
    }

    fn combat(&self, world: &SceneWorld, player: &Entity) -> Vec<Key> {
        let Some(enemy) = world.find_by_name(ENEMY_NAME) else {
            return Vec::new();
        };
        let gap = enemy.position.x - player.position.x;
        if gap.abs() > COMBAT_STRIKE_DISTANCE {
            steer(player.position.x, enemy.position.x)
        } else {
            vec![Key::Interact]
        }
    }

    fn runner(&mut self, world: &SceneWorld, player: &Entity) -> Vec<Key> {
        let mut keys = Vec::new();
        if self.ticks_in_visit % RUNNER_TAP_TICKS == 0 {
            keys.push(Key::Space);
        }

        let finish_x = world.find_by_name(FINISH_LINE_NAME).map(|finish| finish.position.x);
        let speed = match (self.previous_finish_x, finish_x) {
            (Some(previous), Some(current)) => (previous - current) / self.tick_seconds,
            _ => 0.0,
        };
        self.previous_finish_x = finish_x;

        let Some(size) = player.body.map(|body| body.size) else {
            return keys;
        };
        if speed <= 1.0 || !on_ground(player) || !self.can_tap(Key::Up) {
            return keys;
        }
        let width = OBSTACLE_SIZE.x + size.x;
        let lead = (RUNNER_APEX_SECONDS - width / (2.0 * speed)).max(RUNNER_MIN_LEAD_SECONDS);
        let standing_top = GROUND_TOP - size.y;
        let must_jump = world.entities_named(OBSTACLE_NAME).any(|obstacle| {
            let bottom = obstacle.position.y;
            let blocking = bottom - OBSTACLE_SIZE.y < GROUND_TOP && bottom > standing_top;
            let time_to_reach = (obstacle.position.x - player.position.x) / speed;
            blocking && time_to_reach > -width / (2.0 * speed) && time_to_reach <= lead
        });
        if must_jump {
            keys.push(Key::Up);
        }
        keys
    }

    fn tap(&self, key: Key) -> Vec<Key> {
        if self.can_tap(key) {
            vec![key]
        } else {
            Vec::new()
        }
    }
}

impl InputSource for DemoPilot {
    fn snapshot_for_tick(&mut self, scene_key: &str, world: &SceneWorld) -> InputSnapshot {
        let player = world.find_by_name(PLAYER_NAME);
        self.track_visit(scene_key, player.map(|player| player.id));

        let keys = match (scene_key, player) {
            ("Exploration", Some(player)) => self.exploration(world, player),
            ("SortingChallenge", Some(player)) => self.sorting(world, player),
            ("Combat", Some(player)) => self.combat(world, player),
            ("Runner", Some(player)) => self.runner(world, player),
            _ => self.presentation(),
        };
        self.held = keys;
        self.edges.snapshot(&self.held)
    }
}

fn on_ground(entity: &Entity) -> bool {
    entity.body.is_some_and(|body| body.on_ground())
}

fn steer(from_x: f32, to_x: f32) -> Vec<Key> {
    let delta = to_x - from_x;
    if delta > ARRIVE_TOLERANCE {
        vec![Key::Right]
    } else if delta < -ARRIVE_TOLERANCE {
        vec![Key::Left]
    } else {
        Vec::new()
    }
}
