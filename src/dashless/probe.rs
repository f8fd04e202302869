// Speculative terrain check: borrow the host's own dream dash check with a candidate direction.
use std::ops::{Deref, DerefMut};

use bevy::prelude::*;

use super::DreamDashHost;

/// Upward probes are checked three times as far so slightly-off upward aims still resolve.
const UPWARD_BIAS: f32 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeResult {
    pub direction: Vec2,
    pub accepted: bool,
}

/// Holds the host with a substituted dash direction and the probe flag raised.
/// Dropping it puts both back, on every exit path.
struct ProbeScope<'a, C: DreamDashHost> {
    owner: &'a mut C,
    saved_dash_dir: Vec2,
}

impl<'a, C: DreamDashHost> ProbeScope<'a, C> {
    fn enter(owner: &'a mut C, direction: Vec2) -> Self {
        let saved_dash_dir = owner.dash_dir();
        owner.dashless_mut().probe_active = true;
        owner.set_dash_dir(direction);
        Self {
            owner,
            saved_dash_dir,
        }
    }
}

impl<C: DreamDashHost> Deref for ProbeScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.owner
    }
}

impl<C: DreamDashHost> DerefMut for ProbeScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.owner
    }
}

impl<C: DreamDashHost> Drop for ProbeScope<'_, C> {
    fn drop(&mut self) {
        self.owner.set_dash_dir(self.saved_dash_dir);
        self.owner.dashless_mut().probe_active = false;
    }
}

pub fn probe<C: DreamDashHost>(owner: &mut C, candidate: Vec2) -> ProbeResult {
    let mut direction = candidate;
    if direction.y < 0.0 {
        direction.y *= UPWARD_BIAS;
    }

    let mut scope = ProbeScope::enter(owner, direction);
    let accepted = scope.dream_dash_check(direction);
    if accepted {
        scope.dashless_mut().probed_direction =
            Some(direction.clamp(Vec2::NEG_ONE, Vec2::ONE));
    }
    drop(scope);

    ProbeResult {
        direction,
        accepted,
    }
}
