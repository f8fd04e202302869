// Host simulation: players stepped on the fixed clock, their effects published as messages.
pub mod input;
pub mod level;
pub mod player;
pub mod state_machine;
#[cfg(test)]
pub mod test_support;

use bevy::prelude::*;

use crate::dashless::{self, DreamDashHost};
use crate::session::Session;
use crate::settings::ManeuverSettings;
use input::InputFrame;
use level::overlaps;
use player::{HostEffect, Player};

pub const TICK_RATE: f64 = 60.0;

pub struct HostPlugin;

impl Plugin for HostPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(TICK_RATE))
            .init_resource::<InputFrame>()
            .init_resource::<Assists>()
            .init_resource::<ManeuverSettings>()
            .init_resource::<FreezeTimer>()
            .add_message::<HostEffect>()
            .add_message::<TriggerEntered>()
            .add_systems(PreUpdate, install_dashless)
            .add_systems(FixedPreUpdate, (feed_input, sync_environment).chain())
            .add_systems(FixedUpdate, (step_players, detect_triggers).chain())
            .add_systems(FixedPostUpdate, publish_effects)
            .add_systems(Update, apply_freeze);
    }
}

/// Accessibility options that change how dashes are aimed.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Assists {
    pub dash_assist: bool,
}

/// Region that reports players walking into it.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct TriggerZone {
    pub area: Rect,
    occupied: bool,
}

impl TriggerZone {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            occupied: false,
        }
    }
}

#[derive(Message, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEntered {
    pub trigger: Entity,
    pub player: Entity,
}

/// Real time left before virtual time resumes.
#[derive(Resource, Clone, Copy, Debug, Default)]
struct FreezeTimer(f32);

/// A full state table cannot be recovered from, so it ends the app.
fn install_dashless(
    mut players: Query<(Entity, &mut Player), Added<Player>>,
    mut exit: MessageWriter<AppExit>,
) {
    for (entity, mut player) in &mut players {
        if let Err(e) = dashless::install(&mut *player) {
            error!(%entity, error = %e, "could not install dashless dream dash");
            exit.write(AppExit::error());
        }
    }
}

pub fn feed_input(frame: Res<InputFrame>, time: Res<Time>, mut players: Query<&mut Player>) {
    let dt = time.delta_secs();
    for mut player in &mut players {
        player.input.feed(&frame, dt);
    }
}

fn sync_environment(
    settings: Res<ManeuverSettings>,
    assists: Res<Assists>,
    session: Option<Res<Session>>,
    time: Res<Time<Virtual>>,
    mut players: Query<&mut Player>,
) {
    let feature_flag = session.is_some_and(|s| s.feature_flag());
    for mut player in &mut players {
        let talk_focus = player.level().talker_at(player.hitbox());
        let env = &mut player.environment;
        env.override_enabled = settings.enabled;
        env.feature_flag = feature_flag;
        env.dash_assist = assists.dash_assist;
        env.time_rate = time.relative_speed();
        env.talk_focus = talk_focus;
    }
}

fn step_players(time: Res<Time>, mut players: Query<&mut Player>) {
    let dt = time.delta_secs();
    for mut player in &mut players {
        player.step(dt);
    }
}

pub fn detect_triggers(
    mut zones: Query<(Entity, &mut TriggerZone)>,
    players: Query<(Entity, &Player)>,
    mut entered: MessageWriter<TriggerEntered>,
) {
    for (trigger, mut zone) in &mut zones {
        let inside = players
            .iter()
            .find(|(_, p)| overlaps(zone.area, p.hitbox()))
            .map(|(e, _)| e);
        match (zone.occupied, inside) {
            (false, Some(player)) => {
                debug!(%trigger, %player, "trigger entered");
                entered.write(TriggerEntered { trigger, player });
                zone.occupied = true;
            }
            (true, None) => zone.occupied = false,
            _ => {}
        }
    }
}

fn publish_effects(mut players: Query<&mut Player>, mut effects: MessageWriter<HostEffect>) {
    for mut player in &mut players {
        for effect in player.drain_effects() {
            trace!(?effect, "host effect");
            effects.write(effect);
        }
    }
}

/// Freeze frames pause virtual time, which also holds the fixed clock.
fn apply_freeze(
    mut effects: MessageReader<HostEffect>,
    mut timer: ResMut<FreezeTimer>,
    mut virtual_time: ResMut<Time<Virtual>>,
    real_time: Res<Time<Real>>,
) {
    if timer.0 > 0.0 {
        timer.0 -= real_time.delta_secs();
        if timer.0 <= 0.0 {
            timer.0 = 0.0;
            virtual_time.unpause();
        }
    }
    for effect in effects.read() {
        if let HostEffect::Freeze(seconds) = *effect {
            timer.0 = timer.0.max(seconds);
            virtual_time.pause();
        }
    }
}
