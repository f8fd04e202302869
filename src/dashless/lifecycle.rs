// Begin, update and coroutine of the injected state.
use bevy::prelude::*;

use super::assist::{QUARTER_CIRCLE, angle_diff, angle_to_vector, vector_angle};
use super::{DreamDashHost, Facing, RumbleLength, RumbleStrength};
use crate::state_table::{CoroutineStep, StateCoroutine};

pub const DASH_SPEED: f32 = 240.0;
pub const DREAM_DASH_SFX: &str = "event:/char/madeline/jump_dreamblock";

const FREEZE_TIME: f32 = 0.05;
const FREEZE_MIN_TIME_RATE: f32 = 0.25;
const BOOST_PARTICLE_RANGE: Vec2 = Vec2::splat(4.0);

pub fn dashless_begin<C: DreamDashHost>(owner: &mut C) {
    if owner.time_rate() > FREEZE_MIN_TIME_RATE {
        owner.freeze(FREEZE_TIME);
    }
    if !owner.dash_assist_enabled() {
        owner.rumble(RumbleStrength::Strong, RumbleLength::Medium);
    }

    owner.set_speed(Vec2::ZERO);
    owner.set_dash_dir(Vec2::ZERO);

    if !owner.on_ground() && owner.ducking() && owner.can_unduck() {
        owner.set_ducking(false);
    } else if !owner.ducking() && (owner.demo_dashed() || owner.dash_input().move_y == 1) {
        owner.set_ducking(true);
    }

    owner.dashless_mut().assist_override = None;
    owner.dash_assist_init();
}

/// The state never runs logic of its own; the coroutine does the work.
pub fn dashless_update<C: DreamDashHost>(owner: &mut C) -> usize {
    owner.dashless().state.unwrap_or(owner.state_machine().state())
}

pub fn dashless_coroutine<C: DreamDashHost>(_owner: &mut C) -> Box<dyn StateCoroutine<C>> {
    Box::new(DashlessLaunch::default())
}

/// Keep the assisted or raw direction only while it stays within 90° of what the probe validated.
pub fn apply_lenience(probed: Option<Vec2>, candidate: Vec2) -> Vec2 {
    let Some(probed) = probed else {
        return candidate;
    };
    if angle_diff(vector_angle(probed), vector_angle(candidate)).abs() < QUARTER_CIRCLE {
        candidate
    } else {
        probed
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    /// Let the begin effects land before committing to a direction.
    #[default]
    Settle,
    Launch,
}

#[derive(Debug, Default)]
struct DashlessLaunch {
    phase: Phase,
}

impl<C: DreamDashHost> StateCoroutine<C> for DashlessLaunch {
    fn resume(&mut self, owner: &mut C) -> CoroutineStep {
        match self.phase {
            Phase::Settle => {
                self.phase = Phase::Launch;
                CoroutineStep::Yield
            }
            Phase::Launch => {
                launch(owner);
                CoroutineStep::Done
            }
        }
    }
}

fn launch<C: DreamDashHost>(owner: &mut C) {
    if owner.dash_assist_enabled() {
        owner.rumble(RumbleStrength::Strong, RumbleLength::Medium);
    }

    let dashless = owner.dashless();
    let candidate = dashless
        .assist_override
        .map(|angle| angle_to_vector(angle, 1.0))
        .unwrap_or_else(|| owner.last_aim());
    let mut dir = apply_lenience(dashless.probed_direction, candidate);
    if let Some(forced) = owner.override_dash_direction() {
        dir = forced;
    }
    let dir = owner.correct_dash_precision(dir);

    owner.set_speed(dir * DASH_SPEED);
    owner.set_dash_dir(dir);
    if dir.x != 0.0 {
        owner.set_facing(if dir.x < 0.0 { Facing::Left } else { Facing::Right });
    }

    if owner.state_machine().previous_state() == C::STAR_FLY {
        let center = owner.center();
        owner.emit_boost_particles(center, BOOST_PARTICLE_RANGE, vector_angle(-dir));
    }

    owner.create_trail();
    owner.play_sound(DREAM_DASH_SFX);
    debug!(?dir, "dashless dream dash launched");
    owner.set_state(C::DREAM_DASH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::input::InputFrame;
    use crate::host::player::{DREAM_DASH, HostEffect, NORMAL, Player, STAR_FLY};
    use crate::host::state_machine::StateMachineOwner;
    use crate::host::test_support::{block_above, block_right, player_at, press, tick};

    fn up() -> InputFrame {
        InputFrame {
            dash: true,
            aim: Vec2::new(0.0, -1.0),
            ..default()
        }
    }

    fn rumbles(p: &Player) -> usize {
        p.effects()
            .iter()
            .filter(|e| matches!(e, HostEffect::Rumble { .. }))
            .count()
    }

    #[test]
    fn lenience_keeps_close_candidates() {
        let candidate = Vec2::new(1.0, -1.0).normalize();
        assert_eq!(apply_lenience(Some(Vec2::X), candidate), candidate);
    }

    #[test]
    fn lenience_boundary_at_exactly_ninety_degrees_picks_the_probe() {
        assert_eq!(apply_lenience(Some(Vec2::X), Vec2::Y), Vec2::X);
        assert_eq!(apply_lenience(Some(Vec2::X), Vec2::NEG_Y), Vec2::X);
        assert_eq!(apply_lenience(Some(Vec2::X), Vec2::NEG_X), Vec2::X);
    }

    #[test]
    fn lenience_without_a_probe_keeps_the_candidate() {
        assert_eq!(apply_lenience(None, Vec2::NEG_Y), Vec2::NEG_Y);
    }

    #[test]
    fn begin_resets_motion_and_clears_the_assist_angle() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.speed = Vec2::new(50.0, 20.0);
        p.set_dash_dir(Vec2::X);
        p.dashless_mut().assist_override = Some(1.0);

        dashless_begin(&mut p);

        assert_eq!(p.speed, Vec2::ZERO);
        assert_eq!(p.dash_dir(), Vec2::ZERO);
        assert_eq!(p.dashless().assist_override(), None);
        assert!(p.effects().contains(&HostEffect::Freeze(0.05)));
        assert_eq!(rumbles(&p), 1);
    }

    #[test]
    fn crouch_activation_is_not_assisted() {
        let mut p = player_at(Vec2::ZERO, block_right());
        p.environment.feature_flag = true;
        p.environment.dash_assist = true;
        let aim = Vec2::new(30f32.to_radians().cos(), -30f32.to_radians().sin());
        tick(
            &mut p,
            InputFrame {
                crouch_dash: true,
                aim,
                ..default()
            },
        );
        assert_eq!(Some(p.state_machine().state()), p.dashless().state());
        assert!(p.demo_dashed());

        tick(
            &mut p,
            InputFrame {
                aim: angle_to_vector(-50f32.to_radians(), 1.0),
                ..default()
            },
        );
        assert_eq!(p.dashless().assist_override(), None);
    }

    #[test]
    fn begin_skips_the_freeze_in_slow_motion() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.environment.time_rate = 0.25;
        dashless_begin(&mut p);
        assert!(!p.effects().iter().any(|e| matches!(e, HostEffect::Freeze(_))));
    }

    #[test]
    fn begin_ducks_for_crouch_activations_and_unducks_in_the_air() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.set_demo_dashed(true);
        dashless_begin(&mut p);
        assert!(p.ducking());

        let mut p = player_at(Vec2::new(0.0, -40.0), block_right());
        p.on_ground = false;
        p.set_ducking(true);
        dashless_begin(&mut p);
        assert!(!p.ducking());
    }

    #[test]
    fn scenario_b_straight_up_launches_one_tick_later() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.environment.feature_flag = true;
        let state = p.dashless().state().unwrap();

        tick(&mut p, up());
        assert_eq!(p.state_machine().state(), state);
        assert_eq!(p.speed, Vec2::ZERO);

        tick(&mut p, up());
        assert_eq!(p.speed, Vec2::new(0.0, -1.0) * DASH_SPEED);
        assert_eq!(p.dash_dir(), Vec2::new(0.0, -1.0));
        assert_eq!(p.state_machine().state(), DREAM_DASH);
        assert_eq!(p.state_machine().previous_state(), state);
        assert_eq!(p.dashes(), 0);
        assert!(p.effects().contains(&HostEffect::Sound(DREAM_DASH_SFX)));
        assert_eq!(rumbles(&p), 1, "only the begin rumble fires without dash assist");
    }

    #[test]
    fn scenario_c_assisted_angle_inside_the_cone_is_used() {
        let mut p = player_at(Vec2::ZERO, block_right());
        p.environment.feature_flag = true;
        p.environment.dash_assist = true;
        let aim = Vec2::new(30f32.to_radians().cos(), -30f32.to_radians().sin());

        tick(
            &mut p,
            InputFrame {
                dash: true,
                aim,
                ..default()
            },
        );
        assert_eq!(p.dashless().probed_direction(), Some(Vec2::new(aim.x, 0.0)));
        assert_eq!(rumbles(&p), 0, "dash assist moves the rumble to the launch");

        let assisted = -50f32.to_radians();
        tick(
            &mut p,
            InputFrame {
                aim: angle_to_vector(assisted, 1.0),
                ..default()
            },
        );
        let recorded = p.dashless().assist_override().unwrap();
        assert!((recorded - assisted).abs() < 1e-5);
        let expected = angle_to_vector(assisted, 1.0);
        assert!(p.dash_dir().abs_diff_eq(expected, 1e-5));
        assert!(p.speed.abs_diff_eq(expected * DASH_SPEED, 1e-3));
        assert_eq!(p.facing, Facing::Right);
        assert_eq!(p.state_machine().state(), DREAM_DASH);
        assert_eq!(rumbles(&p), 1);
    }

    #[test]
    fn assisted_angle_past_the_cone_is_snapped() {
        let mut p = player_at(Vec2::ZERO, block_right());
        p.environment.feature_flag = true;
        p.environment.dash_assist = true;
        tick(
            &mut p,
            InputFrame {
                dash: true,
                aim: Vec2::X,
                ..default()
            },
        );
        tick(
            &mut p,
            InputFrame {
                aim: angle_to_vector(-120f32.to_radians(), 1.0),
                ..default()
            },
        );
        let expected = angle_to_vector(-std::f32::consts::FRAC_PI_4, 1.0);
        assert!(p.dash_dir().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn raw_aim_that_turned_away_falls_back_to_the_probe() {
        let mut p = player_at(Vec2::ZERO, block_right());
        p.environment.feature_flag = true;
        tick(
            &mut p,
            InputFrame {
                dash: true,
                aim: Vec2::X,
                ..default()
            },
        );
        tick(
            &mut p,
            InputFrame {
                aim: Vec2::NEG_X,
                ..default()
            },
        );
        assert_eq!(p.dash_dir(), Vec2::X);
        assert_eq!(p.facing, Facing::Right);
    }

    #[test]
    fn forced_direction_wins() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.environment.feature_flag = true;
        p.override_dash_direction = Some(Vec2::new(-1.0, 0.0));
        tick(&mut p, up());
        tick(&mut p, up());
        assert_eq!(p.dash_dir(), Vec2::new(-1.0, 0.0));
        assert_eq!(p.facing, Facing::Left);
    }

    #[test]
    fn leaving_star_fly_emits_boost_particles() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.environment.feature_flag = true;
        p.set_state(STAR_FLY);
        tick(&mut p, up());
        tick(&mut p, up());

        let burst = p.effects().iter().find_map(|e| match e {
            HostEffect::Particles {
                positions,
                direction,
                ..
            } => Some((positions.len(), *direction)),
            _ => None,
        });
        let (count, direction) = burst.expect("boost particles");
        assert_eq!(count, 12);
        assert!((direction - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn no_particles_from_the_ground() {
        let mut p = player_at(Vec2::ZERO, block_above());
        p.environment.feature_flag = true;
        assert_eq!(p.state_machine().state(), NORMAL);
        tick(&mut p, up());
        tick(&mut p, up());
        assert!(
            !p.effects()
                .iter()
                .any(|e| matches!(e, HostEffect::Particles { .. }))
        );
    }

    #[test]
    fn update_only_reports_the_state() {
        let mut p = player_at(Vec2::ZERO, block_above());
        press(&mut p, up());
        let state = p.dashless().state().unwrap();
        assert_eq!(dashless_update(&mut p), state);
    }
}
