// Level fixtures and input helpers shared by unit tests.
use std::sync::Arc;

use bevy::prelude::*;

use super::input::InputFrame;
use super::level::LevelGeometry;
use super::player::Player;
use crate::dashless;
use crate::session::PlayerInventory;

pub const DT: f32 = 1.0 / 60.0;

/// Flat floor at `y = 0`, nothing else.
pub fn open_level() -> Arc<LevelGeometry> {
    Arc::new(LevelGeometry::default())
}

/// Dream block a one-unit gap above the head of a standing player at the origin.
pub fn block_above() -> Arc<LevelGeometry> {
    Arc::new(LevelGeometry {
        dream_blocks: vec![Rect::new(-20.0, -40.0, 20.0, -12.0)],
        ..default()
    })
}

/// Dream block half a unit to the right of a player at the origin.
pub fn block_right() -> Arc<LevelGeometry> {
    Arc::new(LevelGeometry {
        dream_blocks: vec![Rect::new(4.5, -30.0, 40.0, -0.5)],
        ..default()
    })
}

/// Dashless player with the maneuver installed and the feature flag off.
pub fn player_at(position: Vec2, level: Arc<LevelGeometry>) -> Player {
    let mut p = Player::new(position, level);
    p.apply_inventory(PlayerInventory::DASHLESS);
    dashless::install(&mut p).expect("install");
    p
}

/// Feed one frame of input without stepping the simulation.
pub fn press(p: &mut Player, frame: InputFrame) {
    p.input.feed(&frame, DT);
    p.refresh_aim();
}

/// Feed one frame of input and step once.
pub fn tick(p: &mut Player, frame: InputFrame) {
    p.input.feed(&frame, DT);
    p.step(DT);
}
