use std::time::Duration;

use scene_flow::{
    AttackAction, AttackConfig, AttackKind, EntityDesc, EntityId, GameStateBag, InputSnapshot,
    Key, MovementConfig, Objective, ObjectiveEvent, ObjectiveTracked, ObjectiveTracker, Scene,
    SceneCommand, SceneWorld, SpriteEntity, TextureRegistry, TimerQueue, Vec2,
};
use serde_json::json;
use tracing::{debug, info};

use super::{drive_character, setup_platformer, spawn_character, GROUND_TOP, PLAYER_NAME};

pub(crate) const ENEMY_NAME: &str = "guardian";
pub(crate) const ATTEMPT_KEY: &str = "combat.attempt";
const ATTEMPTS_NEEDED_KEY: &str = "combat.attempts_needed";
const PLAYER_SPAWN: Vec2 = Vec2::new(150.0, GROUND_TOP);
const ENEMY_SPAWN: Vec2 = Vec2::new(650.0, GROUND_TOP);
const PLAYER_ATTACK_RANGE: f32 = 100.0;
const ENEMY_ATTACK_RANGE: f32 = 80.0;
const DEFEAT_DELAY: Duration = Duration::from_millis(1500);
const VICTORY_DELAY: Duration = Duration::from_millis(2000);

/// Stats for one attempt. The first attempt is tuned to be lost; every
/// retry gets the empowered set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CombatTuning {
    pub(crate) player_hp: f32,
    pub(crate) enemy_hp: f32,
    pub(crate) player_damage: f32,
    /// Player attack cooldown in ticks.
    pub(crate) player_cooldown: u32,
    pub(crate) player_speed: f32,
    pub(crate) player_armed: bool,
    pub(crate) enemy_damage: f32,
    pub(crate) enemy_damage_multiplier: f32,
    pub(crate) enemy_cooldown: u32,
    pub(crate) enemy_speed: f32,
    /// Distance at which the guardian stops closing in.
    pub(crate) enemy_reach: f32,
    pub(crate) intro: Duration,
    pub(crate) intro_text: &'static str,
}

impl CombatTuning {
    pub(crate) fn for_attempt(attempt: u64) -> Self {
        if attempt <= 1 {
            Self {
                player_hp: 100.0,
                enemy_hp: 150.0,
                player_damage: 15.0,
                player_cooldown: 60,
                player_speed: 180.0,
                player_armed: false,
                enemy_damage: 50.0,
                enemy_damage_multiplier: 2.0,
                enemy_cooldown: 30,
                enemy_speed: 160.0 * 1.5,
                enemy_reach: ENEMY_ATTACK_RANGE,
                intro: Duration::from_millis(3000),
                intro_text: "¡El guardián del templo te bloquea el paso!",
            }
        } else {
            Self {
                player_hp: 150.0,
                enemy_hp: 80.0,
                player_damage: 35.0,
                player_cooldown: 40,
                player_speed: 250.0,
                player_armed: true,
                enemy_damage: 15.0,
                enemy_damage_multiplier: 1.0,
                enemy_cooldown: 90,
                enemy_speed: 100.0 * 0.8,
                enemy_reach: 60.0,
                intro: Duration::from_millis(2500),
                intro_text: "Encontraste un arma. ¡Inténtalo de nuevo! (E para atacar)",
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CombatPhase {
    Intro,
    Fighting,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CombatTimer {
    IntroOver,
    Finish,
}

#[derive(Debug, Default)]
struct CombatContext {
    attempt: u64,
    enemy_defeated: bool,
}

/// Scripted guardian fight. Losing routes back here through the failure
/// link with the attempt counter bumped in the state bag.
pub(crate) struct CombatScene {
    textures: TextureRegistry,
    tuning: CombatTuning,
    phase: CombatPhase,
    player: Option<SpriteEntity>,
    enemy: Option<SpriteEntity>,
    enemy_attack: AttackAction,
    player_hp: f32,
    enemy_hp: f32,
    labels: Option<CombatLabels>,
    context: CombatContext,
    tracker: ObjectiveTracker<CombatContext>,
    timers: TimerQueue<CombatTimer>,
}

#[derive(Debug, Clone, Copy)]
struct CombatLabels {
    banner: EntityId,
    player_hp: EntityId,
    enemy_hp: EntityId,
}

impl CombatScene {
    pub(crate) fn new() -> Self {
        let mut tracker =
            ObjectiveTracker::new().on_failed(|context: &mut CombatContext| context.attempt += 1);
        tracker.add_objective(
            Objective::manual("defeat_enemy", "Derrota al guardián")
                .when(|context: &CombatContext| context.enemy_defeated),
        );
        let tuning = CombatTuning::for_attempt(1);
        Self {
            textures: TextureRegistry::new(),
            tuning,
            phase: CombatPhase::Intro,
            player: None,
            enemy: None,
            enemy_attack: AttackAction::default(),
            player_hp: tuning.player_hp,
            enemy_hp: tuning.enemy_hp,
            labels: None,
            context: CombatContext::default(),
            tracker,
            timers: TimerQueue::new(),
        }
    }

    pub(crate) fn with_textures(mut self, textures: TextureRegistry) -> Self {
        self.textures = textures;
        self
    }

    fn refresh_labels(&self, world: &mut SceneWorld) {
        let Some(labels) = self.labels else {
            return;
        };
        world.set_label(
            labels.player_hp,
            Some(format!("HP: {}/{}", self.player_hp.max(0.0), self.tuning.player_hp)),
        );
        world.set_label(
            labels.enemy_hp,
            Some(format!("HP: {}/{}", self.enemy_hp.max(0.0), self.tuning.enemy_hp)),
        );
    }

    fn set_banner(&self, world: &mut SceneWorld, text: Option<&str>) {
        if let Some(labels) = self.labels {
            world.set_label(labels.banner, text.map(ToString::to_string));
        }
    }

    fn fight(&mut self, input: &InputSnapshot, world: &mut SceneWorld) {
        let (Some(player), Some(enemy)) = (self.player.as_mut(), self.enemy.as_mut()) else {
            return;
        };
        let (player_id, enemy_id) = (player.id(), enemy.id());

        drive_character(player, world, input);
        if let Some(attack) = player.actions_mut().attack_mut() {
            if let Some(outcome) = attack.execute(world, player_id, &[enemy_id], input) {
                self.enemy_hp -= outcome.total_damage();
                debug!(damage = outcome.total_damage(), enemy_hp = self.enemy_hp, "player_hit");
            }
        }

        let (Some(player_at), Some(enemy_at)) = (world.position(player_id), world.position(enemy_id))
        else {
            return;
        };
        let gap = player_at.x - enemy_at.x;
        let steer = if gap.abs() <= self.tuning.enemy_reach {
            InputSnapshot::empty()
        } else if gap < 0.0 {
            InputSnapshot::empty().with_key_down(Key::Left, true)
        } else {
            InputSnapshot::empty().with_key_down(Key::Right, true)
        };
        drive_character(enemy, world, &steer);

        if self.enemy_attack.is_in_range(world, enemy_id, player_id) {
            if let Some(outcome) = self.enemy_attack.strike(world, enemy_id, &[player_id]) {
                self.player_hp -= outcome.total_damage();
                debug!(damage = outcome.total_damage(), player_hp = self.player_hp, "enemy_hit");
            }
        } else {
            self.enemy_attack.update();
        }
    }

    fn halt(&self, world: &mut SceneWorld) {
        for sprite in [self.player.as_ref(), self.enemy.as_ref()].into_iter().flatten() {
            if let Some(body) = world.body_mut(sprite.id()) {
                body.velocity.x = 0.0;
            }
        }
    }

    fn lose(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
        self.phase = CombatPhase::Defeat;
        self.halt(world);
        self.set_banner(world, Some("GAME OVER"));
        if self.tracker.fail_challenge(&mut self.context).is_some() {
            state.update_state(ATTEMPT_KEY, json!(self.context.attempt));
        }
        self.timers.schedule(DEFEAT_DELAY, CombatTimer::Finish);
        info!(next_attempt = self.context.attempt, "combat_lost");
    }

    fn win(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
        self.phase = CombatPhase::Victory;
        self.halt(world);
        self.set_banner(world, Some("¡VICTORIA!"));
        self.context.enemy_defeated = true;
        let events = self.tracker.evaluate(&mut self.context);
        if events.contains(&ObjectiveEvent::ChallengeCompleted) {
            state.update_state(ATTEMPTS_NEEDED_KEY, json!(self.context.attempt));
            state.update_state(ATTEMPT_KEY, json!(1));
        }
        self.timers.schedule(VICTORY_DELAY, CombatTimer::Finish);
        info!(attempt = self.context.attempt, player_hp = self.player_hp, "combat_won");
    }
}

impl Scene for CombatScene {
    fn load(&mut self, world: &mut SceneWorld, state: &mut dyn GameStateBag) {
        let attempt = state.get_state(ATTEMPT_KEY, json!(1)).as_u64().unwrap_or(1).max(1);
        self.context.attempt = attempt;
        self.tuning = CombatTuning::for_attempt(attempt);
        self.player_hp = self.tuning.player_hp;
        self.enemy_hp = self.tuning.enemy_hp;

        setup_platformer(world);
        let mut player = spawn_character(
            world,
            &mut self.textures,
            PLAYER_NAME,
            "player",
            PLAYER_SPAWN,
            MovementConfig {
                speed: self.tuning.player_speed,
                ..MovementConfig::default()
            },
        );
        if self.tuning.player_armed {
            player.add_action(AttackAction::new(AttackConfig {
                damage: self.tuning.player_damage,
                cooldown: self.tuning.player_cooldown,
                attack_key: Key::Interact,
                kind: AttackKind::Melee,
                range: PLAYER_ATTACK_RANGE,
            }));
        }
        self.player = Some(player);
        self.enemy = Some(spawn_character(
            world,
            &mut self.textures,
            ENEMY_NAME,
            "enemy",
            ENEMY_SPAWN,
            MovementConfig {
                speed: self.tuning.enemy_speed,
                allow_jump: false,
                ..MovementConfig::default()
            },
        ));

        let base = self.tuning.enemy_damage;
        let multiplier = self.tuning.enemy_damage_multiplier;
        self.enemy_attack = AttackAction::new(AttackConfig {
            damage: base,
            cooldown: self.tuning.enemy_cooldown,
            range: ENEMY_ATTACK_RANGE,
            ..AttackConfig::default()
        })
        .with_damage_fn(move |_, _, _| base * multiplier);

        self.labels = Some(CombatLabels {
            banner: world.spawn(
                EntityDesc::new("combat_banner", Vec2::new(400.0, 300.0))
                    .with_label(self.tuning.intro_text),
            ),
            player_hp: world.spawn(EntityDesc::new("player_hp", Vec2::new(150.0, 30.0))),
            enemy_hp: world.spawn(EntityDesc::new("enemy_hp", Vec2::new(650.0, 30.0))),
        });
        self.timers.schedule(self.tuning.intro, CombatTimer::IntroOver);
        info!(
            attempt,
            player_hp = self.tuning.player_hp,
            enemy_hp = self.tuning.enemy_hp,
            armed = self.tuning.player_armed,
            "combat_started"
        );
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        state: &mut dyn GameStateBag,
    ) -> SceneCommand {
        for timer in self.timers.advance(fixed_dt) {
            match (timer, self.phase) {
                (CombatTimer::IntroOver, CombatPhase::Intro) => {
                    self.phase = CombatPhase::Fighting;
                    self.set_banner(world, None);
                }
                (CombatTimer::Finish, CombatPhase::Victory) => return SceneCommand::complete(),
                (CombatTimer::Finish, CombatPhase::Defeat) => return SceneCommand::fail(),
                _ => {}
            }
        }

        match self.phase {
            CombatPhase::Intro => {
                if input.just_pressed(Key::Space) || input.just_pressed(Key::Enter) {
                    self.phase = CombatPhase::Fighting;
                    self.set_banner(world, None);
                }
            }
            CombatPhase::Fighting => {
                self.fight(input, world);
                if self.player_hp <= 0.0 {
                    self.lose(world, state);
                } else if self.enemy_hp <= 0.0 {
                    self.win(world, state);
                }
            }
            CombatPhase::Victory | CombatPhase::Defeat => {}
        }
        self.refresh_labels(world);

        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.timers.cancel_all();
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!(
            "Combat attempt {} [{:?}] {}/{}",
            self.context.attempt,
            self.phase,
            self.player_hp.max(0.0),
            self.enemy_hp.max(0.0)
        ))
    }
}
