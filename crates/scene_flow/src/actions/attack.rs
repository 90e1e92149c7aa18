use std::fmt;
use std::time::Duration;

use crate::app::{EntityId, InputSnapshot, Key, SceneWorld};

pub const HIT_TINT: u32 = 0xff0000;
pub const HIT_TINT_DURATION: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    Melee,
    Ranged,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackConfig {
    pub damage: f32,
    /// Ticks between successful hits.
    pub cooldown: u32,
    pub attack_key: Key,
    pub kind: AttackKind,
    pub range: f32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            damage: 10.0,
            cooldown: 30,
            attack_key: Key::Space,
            kind: AttackKind::Melee,
            range: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTarget {
    pub target: EntityId,
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    pub attacker: EntityId,
    pub hits: Vec<HitTarget>,
}

impl AttackOutcome {
    pub fn total_damage(&self) -> f32 {
        self.hits.iter().map(|hit| hit.damage).sum()
    }
}

type DamageFn = Box<dyn Fn(&SceneWorld, EntityId, EntityId) -> f32>;
type HitHandler = Box<dyn FnMut(&mut SceneWorld, EntityId, &[HitTarget])>;

/// Cooldown-gated strike against every target within range.
///
/// After a successful hit the next `cooldown - 1` calls to `execute`,
/// `strike` or `update` are refused; the `cooldown`-th call may hit again.
pub struct AttackAction {
    config: AttackConfig,
    current_cooldown: u32,
    can_attack: bool,
    damage_fn: Option<DamageFn>,
    on_hit: Option<HitHandler>,
}

impl fmt::Debug for AttackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttackAction")
            .field("config", &self.config)
            .field("current_cooldown", &self.current_cooldown)
            .field("can_attack", &self.can_attack)
            .finish_non_exhaustive()
    }
}

impl Default for AttackAction {
    fn default() -> Self {
        Self::new(AttackConfig::default())
    }
}

impl AttackAction {
    pub fn new(config: AttackConfig) -> Self {
        Self {
            config,
            current_cooldown: 0,
            can_attack: true,
            damage_fn: None,
            on_hit: None,
        }
    }

    /// Replaces the flat `config.damage` with a per-target computation.
    pub fn with_damage_fn(
        mut self,
        damage_fn: impl Fn(&SceneWorld, EntityId, EntityId) -> f32 + 'static,
    ) -> Self {
        self.damage_fn = Some(Box::new(damage_fn));
        self
    }

    /// Replaces the default red hit flash.
    pub fn with_on_hit(
        mut self,
        on_hit: impl FnMut(&mut SceneWorld, EntityId, &[HitTarget]) + 'static,
    ) -> Self {
        self.on_hit = Some(Box::new(on_hit));
        self
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    pub fn set_damage(&mut self, damage: f32) {
        self.config.damage = damage;
    }

    pub fn set_cooldown(&mut self, cooldown: u32) {
        self.config.cooldown = cooldown;
    }

    pub fn current_cooldown(&self) -> u32 {
        self.current_cooldown
    }

    pub fn can_attack(&self) -> bool {
        self.can_attack
    }

    /// Player-driven attack: requires the attack key to be held.
    pub fn execute(
        &mut self,
        world: &mut SceneWorld,
        attacker: EntityId,
        targets: &[EntityId],
        input: &InputSnapshot,
    ) -> Option<AttackOutcome> {
        if !self.tick_cooldown() {
            return None;
        }
        if !input.is_down(self.config.attack_key) {
            return None;
        }
        self.hit_in_range(world, attacker, targets)
    }

    /// Attack without a key check, for scripted or AI attackers.
    pub fn strike(
        &mut self,
        world: &mut SceneWorld,
        attacker: EntityId,
        targets: &[EntityId],
    ) -> Option<AttackOutcome> {
        if !self.tick_cooldown() {
            return None;
        }
        self.hit_in_range(world, attacker, targets)
    }

    /// Advances the cooldown on ticks where no attack is attempted.
    pub fn update(&mut self) {
        self.tick_cooldown();
    }

    pub fn reset_cooldown(&mut self) {
        self.current_cooldown = 0;
        self.can_attack = true;
    }

    pub fn is_in_range(&self, world: &SceneWorld, attacker: EntityId, target: EntityId) -> bool {
        world
            .distance_between(attacker, target)
            .is_some_and(|distance| distance <= self.config.range)
    }

    fn tick_cooldown(&mut self) -> bool {
        if self.current_cooldown > 0 {
            self.current_cooldown -= 1;
        }
        self.can_attack = self.current_cooldown == 0;
        self.can_attack
    }

    fn hit_in_range(
        &mut self,
        world: &mut SceneWorld,
        attacker: EntityId,
        targets: &[EntityId],
    ) -> Option<AttackOutcome> {
        let hits: Vec<HitTarget> = targets
            .iter()
            .filter(|target| self.is_in_range(world, attacker, **target))
            .map(|target| HitTarget {
                target: *target,
                damage: self.damage_for(world, attacker, *target),
            })
            .collect();
        if hits.is_empty() {
            return None;
        }

        self.current_cooldown = self.config.cooldown;
        self.can_attack = self.current_cooldown == 0;
        match self.on_hit.as_mut() {
            Some(on_hit) => on_hit(world, attacker, &hits),
            None => {
                for hit in &hits {
                    world.flash_tint(hit.target, HIT_TINT, HIT_TINT_DURATION);
                }
            }
        }

        Some(AttackOutcome { attacker, hits })
    }

    fn damage_for(&self, world: &SceneWorld, attacker: EntityId, target: EntityId) -> f32 {
        match &self.damage_fn {
            Some(damage_fn) => damage_fn(world, attacker, target),
            None => self.config.damage,
        }
    }
}
