use crate::app::{EntityId, InputSnapshot, Key, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementConfig {
    pub speed: f32,
    /// Negative is up.
    pub jump_speed: f32,
    pub allow_jump: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 200.0,
            jump_speed: -500.0,
            allow_jump: true,
        }
    }
}

/// What a movement step did. `direction` is -1 (left), 0 or 1 (right).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub is_moving: bool,
    pub direction: i8,
    pub is_on_ground: bool,
}

impl MovementState {
    fn idle() -> Self {
        Self {
            velocity_x: 0.0,
            velocity_y: 0.0,
            is_moving: false,
            direction: 0,
            is_on_ground: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovementAction {
    config: MovementConfig,
}

impl MovementAction {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed;
    }

    pub fn set_jump_speed(&mut self, jump_speed: f32) {
        self.config.jump_speed = jump_speed;
    }

    /// Sets horizontal velocity from left/right (left wins when both are
    /// held) and starts a jump from up or space when grounded. An entity
    /// without a body is left alone and reported idle.
    pub fn execute(
        &self,
        world: &mut SceneWorld,
        entity: EntityId,
        input: &InputSnapshot,
        is_on_ground: bool,
    ) -> MovementState {
        let Some(target) = world.find_entity_mut(entity) else {
            return MovementState::idle();
        };
        let Some(body) = target.body.as_mut() else {
            return MovementState::idle();
        };

        let (velocity_x, direction) = if input.is_down(Key::Left) {
            target.flip_x = true;
            (-self.config.speed, -1)
        } else if input.is_down(Key::Right) {
            target.flip_x = false;
            (self.config.speed, 1)
        } else {
            (0.0, 0)
        };

        let jump_pressed = input.is_down(Key::Up) || input.is_down(Key::Space);
        let velocity_y = if self.config.allow_jump && jump_pressed && is_on_ground {
            self.config.jump_speed
        } else {
            0.0
        };

        body.velocity.x = velocity_x;
        if velocity_y != 0.0 {
            body.velocity.y = velocity_y;
        }

        MovementState {
            velocity_x,
            velocity_y,
            is_moving: direction != 0,
            direction,
            is_on_ground,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Body, EntityDesc, Vec2};

    fn world_with_player() -> (SceneWorld, EntityId) {
        let mut world = SceneWorld::default();
        let id = world.spawn(
            EntityDesc::new("player", Vec2::new(100.0, 400.0))
                .with_body(Body::dynamic(Vec2::new(22.0, 38.0))),
        );
        world.apply_pending();
        (world, id)
    }

    #[test]
    fn left_wins_when_both_directions_held() {
        let (mut world, id) = world_with_player();
        let input = InputSnapshot::empty()
            .with_key_down(Key::Left, true)
            .with_key_down(Key::Right, true);

        let state = MovementAction::default().execute(&mut world, id, &input, true);

        assert_eq!(state.direction, -1);
        assert_eq!(state.velocity_x, -200.0);
        assert!(state.is_moving);
        let entity = world.find_entity(id).expect("player");
        assert!(entity.flip_x);
        assert_eq!(entity.body.map(|b| b.velocity.x), Some(-200.0));
    }

    #[test]
    fn right_clears_flip() {
        let (mut world, id) = world_with_player();
        let action = MovementAction::default();
        action.execute(
            &mut world,
            id,
            &InputSnapshot::empty().with_key_down(Key::Left, true),
            true,
        );
        let state = action.execute(
            &mut world,
            id,
            &InputSnapshot::empty().with_key_down(Key::Right, true),
            true,
        );

        assert_eq!(state.direction, 1);
        assert!(!world.find_entity(id).expect("player").flip_x);
    }

    #[test]
    fn jump_requires_ground_and_permission() {
        let (mut world, id) = world_with_player();
        let jump = InputSnapshot::empty().with_key_down(Key::Space, true);

        let airborne = MovementAction::default().execute(&mut world, id, &jump, false);
        assert_eq!(airborne.velocity_y, 0.0);

        let grounded = MovementAction::default().execute(&mut world, id, &jump, true);
        assert_eq!(grounded.velocity_y, -500.0);
        assert_eq!(world.body(id).map(|b| b.velocity.y), Some(-500.0));

        let no_jump = MovementAction::new(MovementConfig {
            allow_jump: false,
            ..MovementConfig::default()
        });
        let state = no_jump.execute(
            &mut world,
            id,
            &InputSnapshot::empty().with_key_down(Key::Up, true),
            true,
        );
        assert_eq!(state.velocity_y, 0.0);
    }

    #[test]
    fn no_input_stops_horizontal_motion_but_keeps_vertical() {
        let (mut world, id) = world_with_player();
        if let Some(body) = world.body_mut(id) {
            body.velocity = Vec2::new(150.0, 75.0);
        }

        let state = MovementAction::default().execute(&mut world, id, &InputSnapshot::empty(), false);

        assert!(!state.is_moving);
        assert_eq!(world.body(id).map(|b| b.velocity), Some(Vec2::new(0.0, 75.0)));
    }

    #[test]
    fn missing_body_reports_idle() {
        let mut world = SceneWorld::default();
        let id = world.spawn(EntityDesc::new("decor", Vec2::ZERO));
        world.apply_pending();
        let input = InputSnapshot::empty().with_key_down(Key::Right, true);

        let state = MovementAction::default().execute(&mut world, id, &input, false);

        assert_eq!(state.velocity_x, 0.0);
        assert_eq!(state.direction, 0);
        assert!(state.is_on_ground);
        assert!(!world.find_entity(id).expect("decor").flip_x);

        let unknown = MovementAction::default().execute(&mut world, EntityId(99), &input, false);
        assert!(!unknown.is_moving);
    }

    #[test]
    fn speed_setters_apply_to_next_execute() {
        let (mut world, id) = world_with_player();
        let mut action = MovementAction::default();
        action.set_speed(320.0);
        action.set_jump_speed(-650.0);

        let input = InputSnapshot::empty()
            .with_key_down(Key::Right, true)
            .with_key_down(Key::Up, true);
        let state = action.execute(&mut world, id, &input, true);

        assert_eq!(state.velocity_x, 320.0);
        assert_eq!(state.velocity_y, -650.0);
    }
}
