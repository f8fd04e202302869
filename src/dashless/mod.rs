// Resourceless dream dash: an extra movement state injected into a host character's
// state machine, available with zero dashes when the session or settings allow it.
mod assist;
mod gate;
mod lifecycle;
mod probe;

use bevy::prelude::*;
use strum::Display;

use crate::host::state_machine::StateMachineOwner;
use crate::state_table::StateTableError;

use assist::correct_assist_angle;
use gate::dashless_state_update;
use lifecycle::{dashless_begin, dashless_coroutine, dashless_update};

/// Per-character scratch state for the maneuver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashlessDream {
    state: Option<usize>,
    probe_active: bool,
    probed_direction: Option<Vec2>,
    assist_override: Option<f32>,
}

impl DashlessDream {
    /// Index of the injected state once installed.
    pub fn state(&self) -> Option<usize> {
        self.state
    }

    pub fn probe_active(&self) -> bool {
        self.probe_active
    }

    /// Direction accepted by the last successful probe of the current activation.
    pub fn probed_direction(&self) -> Option<Vec2> {
        self.probed_direction
    }

    pub fn assist_override(&self) -> Option<f32> {
        self.assist_override
    }
}

/// Buffered input edges the activation gate reads in one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DashInput {
    pub dash_pressed: bool,
    pub crouch_dash_pressed: bool,
    pub talk_pressed: bool,
    /// Something the player can talk to currently has focus.
    pub talk_focus: bool,
    pub move_y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RumbleStrength {
    Strong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RumbleLength {
    Medium,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// What the maneuver needs from the character it is installed on.
///
/// Directions use screen coordinates: negative `y` is up.
pub trait DreamDashHost: StateMachineOwner + 'static {
    /// Host state that flies freely (boost particles are emitted when leaving it).
    const STAR_FLY: usize;
    /// Host state the maneuver hands off into.
    const DREAM_DASH: usize;
    /// States whose update is intercepted by the activation gate.
    const SOURCE_STATES: &'static [usize];

    fn dashless(&self) -> &DashlessDream;
    fn dashless_mut(&mut self) -> &mut DashlessDream;

    fn override_enabled(&self) -> bool;
    fn feature_flag(&self) -> bool;

    fn dashes(&self) -> u32;
    fn dash_input(&self) -> DashInput;
    fn consume_dash_buffers(&mut self);
    fn last_aim(&self) -> Vec2;
    fn demo_dashed(&self) -> bool;
    fn set_demo_dashed(&mut self, demo_dashed: bool);

    fn dash_dir(&self) -> Vec2;
    fn set_dash_dir(&mut self, dir: Vec2);
    /// Terrain validity of dream dashing in `dir` from the current position and dash direction.
    fn dream_dash_check(&mut self, dir: Vec2) -> bool;
    fn add_validity_override(&mut self, check: fn(&Self) -> bool);
    fn add_assist_angle_hook(&mut self, hook: fn(&mut Self, f32) -> f32);

    fn set_speed(&mut self, speed: Vec2);
    fn on_ground(&self) -> bool;
    fn ducking(&self) -> bool;
    fn set_ducking(&mut self, ducking: bool);
    fn can_unduck(&self) -> bool;
    fn set_facing(&mut self, facing: Facing);
    fn override_dash_direction(&self) -> Option<Vec2>;
    fn correct_dash_precision(&self, dir: Vec2) -> Vec2;
    fn center(&self) -> Vec2;

    fn time_rate(&self) -> f32;
    fn dash_assist_enabled(&self) -> bool;
    fn freeze(&mut self, seconds: f32);
    fn rumble(&mut self, strength: RumbleStrength, length: RumbleLength);
    fn dash_assist_init(&mut self);
    fn emit_boost_particles(&mut self, at: Vec2, range: Vec2, direction: f32);
    fn create_trail(&mut self);
    fn play_sound(&mut self, event: &'static str);
}

/// Inject the maneuver into `owner`: extend its state table, intercept the source
/// states and register the validity and assist-angle extensions.
///
/// Must run once per character, right after construction.
pub fn install<C: DreamDashHost>(owner: &mut C) -> Result<usize, StateTableError> {
    let index = owner.state_machine_mut().table_mut().extend(
        dashless_update::<C>,
        Some(dashless_coroutine::<C>),
        Some(dashless_begin::<C>),
        None,
    )?;
    owner.dashless_mut().state = Some(index);

    for &source in C::SOURCE_STATES {
        owner
            .state_machine_mut()
            .hook_update(source, dashless_state_update::<C>);
    }
    owner.add_validity_override(probe_in_progress::<C>);
    owner.add_assist_angle_hook(correct_assist_angle::<C>);

    debug!(state = index, "installed dashless dream dash");
    Ok(index)
}

/// Lets the host's dash-attacking precondition pass while a probe is running.
fn probe_in_progress<C: DreamDashHost>(owner: &C) -> bool {
    owner.dashless().probe_active
}

/// Whether the maneuver may be used at all right now.
pub fn permitted<C: DreamDashHost>(owner: &C) -> bool {
    owner.override_enabled() || owner.feature_flag()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::player::{self, Player};
    use crate::host::input::InputFrame;
    use crate::host::test_support::{block_above, open_level, player_at, tick};
    use crate::state_table::UpdateFn;

    fn up() -> InputFrame {
        InputFrame {
            dash: true,
            aim: Vec2::new(0.0, -1.0),
            ..default()
        }
    }

    #[test]
    fn install_appends_a_state_after_the_host_states() {
        let mut p = Player::new(Vec2::ZERO, open_level());
        let before = p.state_machine().table().len();
        let index = install(&mut p).unwrap();
        assert_eq!(index, before);
        assert_eq!(p.state_machine().table().len(), before + 1);
        assert_eq!(p.dashless().state(), Some(index));
    }

    #[test]
    fn install_hooks_exactly_the_source_states() {
        fn passthrough(p: &mut Player, orig: UpdateFn<Player>) -> usize {
            orig(p)
        }
        let mut p = player_at(Vec2::ZERO, open_level());
        let machine = p.state_machine_mut();
        for &source in Player::SOURCE_STATES {
            assert!(machine.hook_update(source, passthrough).is_some(), "state {source}");
        }
        for state in [player::DASH, player::DREAM_DASH] {
            assert!(machine.hook_update(state, passthrough).is_none(), "state {state}");
        }
    }

    #[test]
    fn every_source_state_can_enter_the_maneuver() {
        for source in [player::NORMAL, player::CLIMB, player::SWIM, player::STAR_FLY] {
            let mut p = player_at(Vec2::ZERO, block_above());
            p.environment.feature_flag = true;
            p.set_state(source);
            tick(&mut p, up());
            assert_eq!(
                Some(p.state_machine().state()),
                p.dashless().state(),
                "from state {source}"
            );
            assert_eq!(p.state_machine().previous_state(), source);
        }
    }

    #[test]
    fn dash_states_never_enter_the_maneuver() {
        for source in [player::DASH, player::DREAM_DASH] {
            let mut p = player_at(Vec2::ZERO, block_above());
            p.environment.feature_flag = true;
            p.set_state(source);
            tick(&mut p, up());
            assert_ne!(
                Some(p.state_machine().state()),
                p.dashless().state(),
                "from state {source}"
            );
        }
    }

    #[test]
    fn installed_state_update_returns_itself() {
        let mut p = player_at(Vec2::ZERO, open_level());
        let index = p.dashless().state().unwrap();
        let update = p.state_machine().table().update(index).unwrap();
        assert_eq!(update(&mut p), index);
    }

    #[test]
    fn full_host_table_is_reported() {
        let mut p = Player::with_capacity(Vec2::ZERO, open_level(), player::HOST_STATES);
        assert_eq!(
            install(&mut p),
            Err(StateTableError::CapacityExhausted {
                capacity: player::HOST_STATES
            })
        );
        assert_eq!(p.dashless().state(), None);
    }

    #[test]
    fn permission_needs_override_or_flag() {
        let mut p = player_at(Vec2::ZERO, open_level());
        assert!(!permitted(&p));
        p.environment.feature_flag = true;
        assert!(permitted(&p));
        p.environment.feature_flag = false;
        p.environment.override_enabled = true;
        assert!(permitted(&p));
    }
}
