// Scripted headless room: walk into a marker trigger, then dream dash upwards without a charge.
use std::sync::Arc;

use bevy::prelude::*;

use crate::dashless::DreamDashHost;
use crate::host::input::InputFrame;
use crate::host::level::LevelGeometry;
use crate::host::player::{DREAM_DASH, HostEffect, Player};
use crate::host::state_machine::StateMachineOwner;
use crate::host::{TriggerZone, feed_input};
use crate::session::{InventoryTrigger, MapData, MapMeta, SessionRequest};

pub struct DemoPlugin;

impl Plugin for DemoPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(DemoScript::default())
            .add_systems(Startup, setup_room)
            .add_systems(FixedPreUpdate, play_script.before(feed_input))
            .add_systems(FixedPostUpdate, (report_states, report_effects));
    }
}

const START: Vec2 = Vec2::new(-30.0, 0.0);
/// Ticks after which the demo exits.
const RUN_TICKS: u32 = 120;
/// The room starts on the ordinary inventory; the trigger opts it in.
const ROOM_META: &str = "Modes:\n  - Inventory: Default\n";

/// Input held from a given tick until the next entry.
#[derive(Resource)]
struct DemoScript {
    tick: u32,
    steps: Vec<(u32, InputFrame)>,
}

impl Default for DemoScript {
    fn default() -> Self {
        let up = InputFrame {
            dash: true,
            aim: Vec2::new(0.0, -1.0),
            ..default()
        };
        Self {
            tick: 0,
            steps: vec![
                (
                    0,
                    InputFrame {
                        aim: Vec2::X,
                        ..default()
                    },
                ),
                (20, InputFrame::default()),
                (45, up),
                (50, InputFrame::default()),
            ],
        }
    }
}

impl DemoScript {
    fn frame(&self) -> InputFrame {
        self.steps
            .iter()
            .take_while(|(start, _)| *start <= self.tick)
            .last()
            .map(|(_, frame)| *frame)
            .unwrap_or_default()
    }
}

fn setup_room(mut commands: Commands, mut requests: MessageWriter<SessionRequest>) {
    let geometry = Arc::new(LevelGeometry {
        dream_blocks: vec![Rect::new(-20.0, -48.0, 20.0, -12.0)],
        solids: vec![Rect::new(-80.0, -200.0, -60.0, 0.0)],
        ..default()
    });
    commands.spawn(Player::new(START, geometry));
    commands.spawn((
        TriggerZone::new(Rect::new(-8.0, -30.0, 8.0, 0.0)),
        InventoryTrigger::from_config("DashlessDreaming (No Backpack)"),
    ));

    let meta = MapMeta::from_yaml(ROOM_META).unwrap_or_else(|e| {
        warn!(error = %e, "bad room metadata, using defaults");
        MapMeta::default()
    });
    requests.write(SessionRequest::Start {
        map: Arc::new(MapData::new("demo", meta)),
        mode: 0,
        level: "a-00".into(),
    });
    info!("demo room ready");
}

fn play_script(
    mut script: ResMut<DemoScript>,
    mut frame: ResMut<InputFrame>,
    mut exit: MessageWriter<AppExit>,
) {
    *frame = script.frame();
    script.tick += 1;
    if script.tick > RUN_TICKS {
        info!("demo finished");
        exit.write(AppExit::Success);
    }
}

fn report_states(players: Query<&Player, Changed<Player>>, mut last: Local<Option<usize>>) {
    let Ok(player) = players.single() else {
        return;
    };
    let state = player.state_machine().state();
    if *last == Some(state) {
        return;
    }
    *last = Some(state);

    let dashless = player.dashless().state() == Some(state);
    info!(
        state,
        dashless,
        dream_dash = state == DREAM_DASH,
        dashes = player.dashes,
        position = ?player.position,
        "player state changed"
    );
}

fn report_effects(mut effects: MessageReader<HostEffect>) {
    for effect in effects.read() {
        debug!(?effect, "effect");
    }
}
