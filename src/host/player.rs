// Platformer character: built-in movement states, terrain checks and an effect outbox.
use std::sync::Arc;

use bevy::prelude::*;
use rand::Rng;

use super::input::PlayerInput;
use super::level::LevelGeometry;
use super::state_machine::{StateMachine, StateMachineOwner};
use crate::dashless::{
    DashInput, DashlessDream, DreamDashHost, Facing, RumbleLength, RumbleStrength,
};
use crate::session::PlayerInventory;
use crate::state_table::{CoroutineStep, StateCoroutine};

pub const NORMAL: usize = 0;
pub const CLIMB: usize = 1;
pub const DASH: usize = 2;
pub const SWIM: usize = 3;
pub const STAR_FLY: usize = 4;
pub const DREAM_DASH: usize = 5;
/// Number of states the character ships with.
pub const HOST_STATES: usize = 6;
/// Room left in the state table for states added after construction.
pub const STATE_CAPACITY: usize = 16;

const HITBOX: Vec2 = Vec2::new(8.0, 11.0);
const DUCK_HITBOX: Vec2 = Vec2::new(8.0, 6.0);

const RUN_SPEED: f32 = 90.0;
const RUN_ACCEL: f32 = 1000.0;
const GRAVITY: f32 = 900.0;
const MAX_FALL: f32 = 160.0;
const CLIMB_SPEED: f32 = 45.0;
const SWIM_SPEED: f32 = 60.0;
const SWIM_ACCEL: f32 = 600.0;
const STAR_FLY_SPEED: f32 = 91.0;
const STAR_FLY_TIME: f32 = 2.0;

const DASH_SPEED: f32 = 240.0;
const DASH_TIME: f32 = 0.15;
const DASH_ATTACK_TIME: f32 = 0.3;
const DASH_FREEZE: f32 = 0.05;
const DREAM_DASH_SPEED: f32 = 240.0;
const BOOST_PARTICLE_COUNT: usize = 12;
const DASH_SFX: &str = "event:/char/madeline/dash_red_right";
const DREAM_DASH_EXIT_SFX: &str = "event:/char/madeline/dreamblock_exit";

/// Something the world outside the simulation should do on the character's behalf.
#[derive(Message, Clone, Debug, PartialEq)]
pub enum HostEffect {
    Freeze(f32),
    Rumble {
        strength: RumbleStrength,
        length: RumbleLength,
    },
    Particles {
        positions: Vec<Vec2>,
        direction: f32,
    },
    Trail {
        at: Vec2,
        facing: Facing,
    },
    Sound(&'static str),
}

/// Facts about the surroundings, refreshed by the host every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Environment {
    pub time_rate: f32,
    pub dash_assist: bool,
    pub override_enabled: bool,
    pub feature_flag: bool,
    pub talk_focus: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            time_rate: 1.0,
            dash_assist: false,
            override_enabled: false,
            feature_flag: false,
            talk_focus: false,
        }
    }
}

#[derive(Component)]
pub struct Player {
    /// Bottom centre of the hitbox.
    pub position: Vec2,
    pub speed: Vec2,
    pub facing: Facing,
    pub on_ground: bool,
    pub dashes: u32,
    pub inventory: PlayerInventory,
    pub override_dash_direction: Option<Vec2>,
    pub input: PlayerInput,
    pub environment: Environment,
    pub(crate) dash_attack_timer: f32,
    dash_dir: Vec2,
    ducking: bool,
    last_aim: Vec2,
    demo_dashed: bool,
    dash_timer: f32,
    star_fly_timer: f32,
    /// State that requested dash assist; aiming is assisted while it lasts.
    dash_assist: Option<usize>,
    assist_angle: Option<f32>,
    dt: f32,
    level: Arc<LevelGeometry>,
    state_machine: StateMachine<Player>,
    dashless: DashlessDream,
    validity_overrides: Vec<fn(&Player) -> bool>,
    assist_angle_hooks: Vec<fn(&mut Player, f32) -> f32>,
    effects: Vec<HostEffect>,
}

impl Player {
    pub fn new(position: Vec2, level: Arc<LevelGeometry>) -> Self {
        Self::with_capacity(position, level, STATE_CAPACITY)
    }

    pub fn with_capacity(position: Vec2, level: Arc<LevelGeometry>, capacity: usize) -> Self {
        let mut state_machine = StateMachine::new(HOST_STATES, capacity);
        let table = state_machine.table_mut();
        table.set_callbacks(NORMAL, Some(normal_update), None, None, None);
        table.set_callbacks(CLIMB, Some(climb_update), None, None, None);
        table.set_callbacks(DASH, Some(dash_update), Some(dash_coroutine), Some(dash_begin), None);
        table.set_callbacks(SWIM, Some(swim_update), None, None, None);
        table.set_callbacks(STAR_FLY, Some(star_fly_update), None, Some(star_fly_begin), None);
        table.set_callbacks(
            DREAM_DASH,
            Some(dream_dash_update),
            None,
            Some(dream_dash_begin),
            Some(dream_dash_end),
        );

        let inventory = PlayerInventory::default();
        let on_ground = position.y >= level.floor_y;
        Self {
            position,
            speed: Vec2::ZERO,
            facing: Facing::Right,
            on_ground,
            dashes: inventory.dashes,
            inventory,
            override_dash_direction: None,
            input: PlayerInput::default(),
            environment: Environment::default(),
            dash_attack_timer: 0.0,
            dash_dir: Vec2::ZERO,
            ducking: false,
            last_aim: Vec2::X,
            demo_dashed: false,
            dash_timer: 0.0,
            star_fly_timer: 0.0,
            dash_assist: None,
            assist_angle: None,
            dt: 0.0,
            level,
            state_machine,
            dashless: DashlessDream::default(),
            validity_overrides: Vec::new(),
            assist_angle_hooks: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn level(&self) -> &Arc<LevelGeometry> {
        &self.level
    }

    pub fn hitbox(&self) -> Rect {
        self.hitbox_at(self.position, self.ducking)
    }

    fn hitbox_at(&self, position: Vec2, ducking: bool) -> Rect {
        let size = if ducking { DUCK_HITBOX } else { HITBOX };
        Rect::new(
            position.x - size.x / 2.0,
            position.y - size.y,
            position.x + size.x / 2.0,
            position.y,
        )
    }

    /// Latest aim, or straight ahead when the stick is idle.
    pub fn refresh_aim(&mut self) {
        self.last_aim = if self.input.aim == Vec2::ZERO {
            Vec2::new(self.facing.sign(), 0.0)
        } else {
            self.input.aim
        };
    }

    /// Replace the inventory, clamping charges to what it allows.
    pub fn apply_inventory(&mut self, inventory: PlayerInventory) {
        self.inventory = inventory;
        self.dashes = self.dashes.min(inventory.dashes);
    }

    pub fn effects(&self) -> &[HostEffect] {
        &self.effects
    }

    pub fn drain_effects(&mut self) -> std::vec::Drain<'_, HostEffect> {
        self.effects.drain(..)
    }

    pub fn step(&mut self, dt: f32) {
        self.dt = dt;
        self.refresh_aim();
        self.dash_attack_timer = (self.dash_attack_timer - dt).max(0.0);
        if self.dash_assist.is_some() {
            self.update_dash_assist();
        }

        self.tick_state_machine();

        let state = self.state_machine.state();
        if self.dash_assist.is_some_and(|requested| requested != state) {
            self.dash_assist = None;
            self.assist_angle = None;
        }
        if state != DREAM_DASH {
            self.move_by(self.speed * dt);
        }
    }

    fn update_dash_assist(&mut self) {
        let mut angle = self.last_aim.to_angle();
        for hook in self.assist_angle_hooks.clone() {
            angle = hook(self, angle);
        }
        self.assist_angle = Some(angle);
    }

    fn move_by(&mut self, delta: Vec2) {
        let next = self.position + Vec2::new(delta.x, 0.0);
        if self.level.solid_at(self.hitbox_at(next, self.ducking)) {
            self.speed.x = 0.0;
        } else {
            self.position = next;
        }

        let mut next = self.position + Vec2::new(0.0, delta.y);
        if next.y > self.level.floor_y {
            next.y = self.level.floor_y;
            self.speed.y = 0.0;
        }
        if self.level.solid_at(self.hitbox_at(next, self.ducking)) {
            self.speed.y = 0.0;
        } else {
            self.position = next;
        }
        self.on_ground = self.position.y >= self.level.floor_y;
    }

    fn refill_dashes(&mut self) {
        if !self.inventory.no_refills && self.dashes < self.inventory.dashes {
            self.dashes = self.inventory.dashes;
        }
    }

    fn can_dash(&self) -> bool {
        (self.input.dash.pressed() || self.input.crouch_dash.pressed()) && self.dashes > 0
    }

    fn start_dash(&mut self) -> usize {
        self.demo_dashed = self.input.crouch_dash.pressed();
        self.input.dash.consume_buffer();
        self.input.crouch_dash.consume_buffer();
        self.dashes -= 1;
        DASH
    }

    /// Launch direction from the assisted angle if there is one, else the aim.
    fn dash_direction(&self) -> Vec2 {
        let dir = self.assist_angle.map(Vec2::from_angle).unwrap_or(self.last_aim);
        self.correct_dash_precision(self.override_dash_direction.unwrap_or(dir))
    }
}

fn sign0(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn approach(value: f32, target: f32, max_delta: f32) -> f32 {
    if value < target {
        (value + max_delta).min(target)
    } else {
        (value - max_delta).max(target)
    }
}

fn normal_update(p: &mut Player) -> usize {
    if p.on_ground {
        p.refill_dashes();
    }
    if p.can_dash() {
        return p.start_dash();
    }
    let hitbox = p.hitbox();
    if p.level.water_at(hitbox) {
        return SWIM;
    }
    if p.level.feather_at(hitbox) {
        return STAR_FLY;
    }
    if p.input.grab.check() && !p.on_ground {
        let wall = p.hitbox_at(p.position + Vec2::new(p.facing.sign(), 0.0), p.ducking);
        if p.level.solid_at(wall) {
            return CLIMB;
        }
    }

    let move_x = p.input.move_x as f32;
    if move_x != 0.0 {
        p.facing = if move_x < 0.0 { Facing::Left } else { Facing::Right };
    }
    p.speed.x = approach(p.speed.x, move_x * RUN_SPEED, RUN_ACCEL * p.dt);
    if !p.on_ground {
        p.speed.y = (p.speed.y + GRAVITY * p.dt).min(MAX_FALL);
    }
    NORMAL
}

fn climb_update(p: &mut Player) -> usize {
    if p.can_dash() {
        return p.start_dash();
    }
    if !p.input.grab.check() {
        return NORMAL;
    }
    p.speed = Vec2::new(0.0, p.input.move_y as f32 * CLIMB_SPEED);
    CLIMB
}

fn dash_begin(p: &mut Player) {
    p.freeze(DASH_FREEZE);
    p.speed = Vec2::ZERO;
    p.dash_dir = Vec2::ZERO;
    p.dash_attack_timer = DASH_ATTACK_TIME;
    p.dash_assist_init();
}

fn dash_update(p: &mut Player) -> usize {
    if p.dash_dir == Vec2::ZERO {
        return DASH;
    }
    let horizontal = Vec2::new(sign0(p.speed.x), 0.0);
    let vertical = Vec2::new(0.0, sign0(p.speed.y));
    for dir in [horizontal, vertical] {
        if dir != Vec2::ZERO && p.dream_dash_check(dir) {
            return DREAM_DASH;
        }
    }
    p.dash_timer -= p.dt;
    if p.dash_timer <= 0.0 { NORMAL } else { DASH }
}

fn dash_coroutine(_: &mut Player) -> Box<dyn StateCoroutine<Player>> {
    Box::new(DashRoutine { launched: false })
}

/// Waits out the freeze tick, then launches.
struct DashRoutine {
    launched: bool,
}

impl StateCoroutine<Player> for DashRoutine {
    fn resume(&mut self, p: &mut Player) -> CoroutineStep {
        if !self.launched {
            self.launched = true;
            return CoroutineStep::Yield;
        }
        let dir = p.dash_direction();
        p.speed = dir * DASH_SPEED;
        p.dash_dir = dir;
        p.dash_timer = DASH_TIME;
        if dir.x != 0.0 {
            p.facing = if dir.x < 0.0 { Facing::Left } else { Facing::Right };
        }
        p.create_trail();
        p.play_sound(DASH_SFX);
        CoroutineStep::Done
    }
}

fn swim_update(p: &mut Player) -> usize {
    if !p.level.water_at(p.hitbox()) {
        return NORMAL;
    }
    if p.can_dash() {
        return p.start_dash();
    }
    let target = p.input.aim * SWIM_SPEED;
    let step = SWIM_ACCEL * p.dt;
    p.speed = Vec2::new(
        approach(p.speed.x, target.x, step),
        approach(p.speed.y, target.y, step),
    );
    SWIM
}

fn star_fly_begin(p: &mut Player) {
    p.star_fly_timer = STAR_FLY_TIME;
    p.speed = Vec2::ZERO;
}

fn star_fly_update(p: &mut Player) -> usize {
    p.star_fly_timer -= p.dt;
    if p.star_fly_timer <= 0.0 {
        return NORMAL;
    }
    p.speed = p.last_aim.normalize_or_zero() * STAR_FLY_SPEED;
    STAR_FLY
}

fn dream_dash_begin(p: &mut Player) {
    p.speed = p.dash_dir * DREAM_DASH_SPEED;
}

fn dream_dash_update(p: &mut Player) -> usize {
    p.position += p.speed * p.dt;
    if p.level.dream_block_at(p.hitbox()) {
        DREAM_DASH
    } else {
        NORMAL
    }
}

fn dream_dash_end(p: &mut Player) {
    p.dash_attack_timer = 0.0;
    p.refill_dashes();
    p.play_sound(DREAM_DASH_EXIT_SFX);
}

impl StateMachineOwner for Player {
    fn state_machine(&self) -> &StateMachine<Self> {
        &self.state_machine
    }

    fn state_machine_mut(&mut self) -> &mut StateMachine<Self> {
        &mut self.state_machine
    }
}

impl DreamDashHost for Player {
    const STAR_FLY: usize = STAR_FLY;
    const DREAM_DASH: usize = DREAM_DASH;
    const SOURCE_STATES: &'static [usize] = &[NORMAL, CLIMB, SWIM, STAR_FLY];

    fn dashless(&self) -> &DashlessDream {
        &self.dashless
    }

    fn dashless_mut(&mut self) -> &mut DashlessDream {
        &mut self.dashless
    }

    fn override_enabled(&self) -> bool {
        self.environment.override_enabled
    }

    fn feature_flag(&self) -> bool {
        self.environment.feature_flag
    }

    fn dashes(&self) -> u32 {
        self.dashes
    }

    fn dash_input(&self) -> DashInput {
        DashInput {
            dash_pressed: self.input.dash.pressed(),
            crouch_dash_pressed: self.input.crouch_dash.pressed(),
            talk_pressed: self.input.talk.pressed(),
            talk_focus: self.environment.talk_focus,
            move_y: self.input.move_y,
        }
    }

    fn consume_dash_buffers(&mut self) {
        self.input.dash.consume_buffer();
        self.input.crouch_dash.consume_buffer();
    }

    fn last_aim(&self) -> Vec2 {
        self.last_aim
    }

    fn demo_dashed(&self) -> bool {
        self.demo_dashed
    }

    fn set_demo_dashed(&mut self, demo_dashed: bool) {
        self.demo_dashed = demo_dashed;
    }

    fn dash_dir(&self) -> Vec2 {
        self.dash_dir
    }

    fn set_dash_dir(&mut self, dir: Vec2) {
        self.dash_dir = dir;
    }

    fn dream_dash_check(&mut self, dir: Vec2) -> bool {
        if !self.inventory.dream_dash {
            return false;
        }
        let attacking =
            self.dash_attack_timer > 0.0 || self.validity_overrides.iter().any(|check| check(self));
        if !attacking {
            return false;
        }
        if dir.x != sign0(self.dash_dir.x) && dir.y != sign0(self.dash_dir.y) {
            return false;
        }
        self.level
            .dream_block_at(self.hitbox_at(self.position + dir, self.ducking))
    }

    fn add_validity_override(&mut self, check: fn(&Self) -> bool) {
        self.validity_overrides.push(check);
    }

    fn add_assist_angle_hook(&mut self, hook: fn(&mut Self, f32) -> f32) {
        self.assist_angle_hooks.push(hook);
    }

    fn set_speed(&mut self, speed: Vec2) {
        self.speed = speed;
    }

    fn on_ground(&self) -> bool {
        self.on_ground
    }

    fn ducking(&self) -> bool {
        self.ducking
    }

    fn set_ducking(&mut self, ducking: bool) {
        self.ducking = ducking;
    }

    fn can_unduck(&self) -> bool {
        !self.level.solid_at(self.hitbox_at(self.position, false))
    }

    fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    fn override_dash_direction(&self) -> Option<Vec2> {
        self.override_dash_direction
    }

    fn correct_dash_precision(&self, dir: Vec2) -> Vec2 {
        if dir.x != 0.0 && dir.x.abs() < 0.001 {
            Vec2::new(0.0, sign0(dir.y))
        } else if dir.y != 0.0 && dir.y.abs() < 0.001 {
            Vec2::new(sign0(dir.x), 0.0)
        } else {
            dir
        }
    }

    fn center(&self) -> Vec2 {
        self.hitbox().center()
    }

    fn time_rate(&self) -> f32 {
        self.environment.time_rate
    }

    fn dash_assist_enabled(&self) -> bool {
        self.environment.dash_assist
    }

    fn freeze(&mut self, seconds: f32) {
        self.effects.push(HostEffect::Freeze(seconds));
    }

    fn rumble(&mut self, strength: RumbleStrength, length: RumbleLength) {
        self.effects.push(HostEffect::Rumble { strength, length });
    }

    /// Crouch dashes are never assisted.
    fn dash_assist_init(&mut self) {
        if self.environment.dash_assist && !self.demo_dashed {
            self.dash_assist = Some(self.state_machine.state());
            self.assist_angle = None;
        }
    }

    fn emit_boost_particles(&mut self, at: Vec2, range: Vec2, direction: f32) {
        let mut rng = rand::rng();
        let positions = (0..BOOST_PARTICLE_COUNT)
            .map(|_| {
                at + Vec2::new(
                    rng.random_range(-range.x..=range.x),
                    rng.random_range(-range.y..=range.y),
                )
            })
            .collect();
        self.effects.push(HostEffect::Particles {
            positions,
            direction,
        });
    }

    fn create_trail(&mut self) {
        let at = self.center();
        self.effects.push(HostEffect::Trail {
            at,
            facing: self.facing,
        });
    }

    fn play_sound(&mut self, event: &'static str) {
        self.effects.push(HostEffect::Sound(event));
    }
}
