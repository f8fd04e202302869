// Keeps dash-assist aiming inside a cone around the probed direction.
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use bevy::prelude::*;

use super::DreamDashHost;

pub(super) const QUARTER_CIRCLE: f32 = FRAC_PI_2;
const EIGHTH_CIRCLE: f32 = FRAC_PI_4;

/// Signed difference `to - from`, wrapped into (-π, π].
pub fn angle_diff(from: f32, to: f32) -> f32 {
    let diff = (to - from).rem_euclid(TAU);
    if diff > PI { diff - TAU } else { diff }
}

pub fn vector_angle(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

pub fn angle_to_vector(angle: f32, length: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin()) * length
}

/// Inside 90° of `initial` the angle passes through, up to 135° it snaps to
/// 45° either side of `initial`, beyond that it is replaced by `initial`.
pub fn clamp_to_cone(initial: f32, angle: f32) -> f32 {
    let diff = angle_diff(initial, angle);
    if diff.abs() < QUARTER_CIRCLE {
        return angle;
    }
    if diff.abs() > EIGHTH_CIRCLE * 3.0 {
        return initial;
    }
    initial + EIGHTH_CIRCLE * diff.signum()
}

/// Assist-angle hook. Only corrects while the owner is in the maneuver state;
/// the result is always remembered for the maneuver's launch.
pub fn correct_assist_angle<C: DreamDashHost>(owner: &mut C, angle: f32) -> f32 {
    let dashless = owner.dashless();
    let in_maneuver = dashless.state == Some(owner.state_machine().state());
    let corrected = match dashless.probed_direction {
        Some(probed) if in_maneuver => clamp_to_cone(vector_angle(probed), angle),
        _ => angle,
    };
    owner.dashless_mut().assist_override = Some(corrected);
    corrected
}
