use super::scene::{SceneWorld, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsLayout {
    Horizontal,
    TopDown,
    Isometric,
    Custom,
}

/// World physics presets per camera layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    pub layout: PhysicsLayout,
    pub gravity: Vec2,
    pub world_bounds: bool,
    pub debug: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::horizontal()
    }
}

impl PhysicsConfig {
    /// Side-scrolling platformer.
    pub fn horizontal() -> Self {
        Self {
            layout: PhysicsLayout::Horizontal,
            gravity: Vec2::new(0.0, 800.0),
            world_bounds: true,
            debug: false,
        }
    }

    pub fn top_down() -> Self {
        Self {
            layout: PhysicsLayout::TopDown,
            gravity: Vec2::ZERO,
            ..Self::horizontal()
        }
    }

    pub fn isometric() -> Self {
        Self {
            layout: PhysicsLayout::Isometric,
            gravity: Vec2::ZERO,
            ..Self::horizontal()
        }
    }

    pub fn custom(gravity: Vec2) -> Self {
        Self {
            layout: PhysicsLayout::Custom,
            gravity,
            ..Self::horizontal()
        }
    }

    pub fn with_world_bounds(mut self, world_bounds: bool) -> Self {
        self.world_bounds = world_bounds;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Applies gravity and, when enabled, world bounds of `size` anchored
    /// at the origin.
    pub fn apply(&self, world: &mut SceneWorld, size: Vec2) {
        world.set_gravity(self.gravity);
        if self.world_bounds {
            world.set_bounds(Vec2::ZERO, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_layouts() {
        assert_eq!(PhysicsConfig::horizontal().gravity, Vec2::new(0.0, 800.0));
        assert_eq!(PhysicsConfig::top_down().gravity, Vec2::ZERO);
        assert_eq!(PhysicsConfig::isometric().layout, PhysicsLayout::Isometric);
        assert!(PhysicsConfig::isometric().world_bounds);
        assert!(!PhysicsConfig::default().debug);
    }

    #[test]
    fn custom_keeps_gravity_and_overrides() {
        let config = PhysicsConfig::custom(Vec2::new(0.0, 1200.0))
            .with_world_bounds(false)
            .with_debug(true);
        assert_eq!(config.gravity.y, 1200.0);
        assert!(!config.world_bounds);
        assert!(config.debug);
    }

    #[test]
    fn apply_sets_world_gravity_and_bounds() {
        let mut world = SceneWorld::default();
        PhysicsConfig::horizontal().apply(&mut world, Vec2::new(800.0, 600.0));
        assert_eq!(world.gravity().y, 800.0);
        assert_eq!(world.bounds().map(|b| b.max), Some(Vec2::new(800.0, 600.0)));

        let mut unbounded = SceneWorld::default();
        PhysicsConfig::top_down()
            .with_world_bounds(false)
            .apply(&mut unbounded, Vec2::new(800.0, 600.0));
        assert!(unbounded.bounds().is_none());
    }
}
