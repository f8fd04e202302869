// Per-tick activation check, run in place of the source states' updates.
use bevy::prelude::*;

use super::probe::probe;
use super::{DreamDashHost, permitted};
use crate::state_table::UpdateFn;

/// Update hook for every source state: enter the maneuver if it is legal, else run `orig`.
pub fn dashless_state_update<C: DreamDashHost>(owner: &mut C, orig: UpdateFn<C>) -> usize {
    match try_activate(owner) {
        Some(state) => state,
        None => orig(owner),
    }
}

/// Returns the maneuver state when the player may and wants to enter it this tick.
/// Leaves the owner untouched otherwise, apart from clearing a stale probed direction.
pub fn try_activate<C: DreamDashHost>(owner: &mut C) -> Option<usize> {
    let state = owner.dashless().state?;
    if !permitted(owner) || owner.dashes() > 0 {
        return None;
    }

    let input = owner.dash_input();
    if !(input.dash_pressed || input.crouch_dash_pressed) {
        return None;
    }

    owner.dashless_mut().probed_direction = None;
    let aim = owner.last_aim();
    let vertical = probe(owner, Vec2::new(0.0, aim.y)).accepted;
    let talking = input.talk_focus && input.talk_pressed;
    if !vertical && (talking || !probe(owner, Vec2::new(aim.x, 0.0)).accepted) {
        return None;
    }

    owner.set_demo_dashed(input.crouch_dash_pressed);
    owner.consume_dash_buffers();
    owner.set_dash_dir(aim);
    debug!(?aim, crouch = input.crouch_dash_pressed, "dashless dream dash activated");
    Some(state)
}
