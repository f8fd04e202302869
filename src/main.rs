// Main
mod dashless;
mod demo;
mod host;
mod session;
mod settings;
mod state_table;

use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use demo::DemoPlugin;
use host::HostPlugin;
use session::SessionPlugin;
use settings::SettingsPlugin;

fn main() {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / host::TICK_RATE,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins((
            SettingsPlugin::default(),
            HostPlugin,
            SessionPlugin,
            DemoPlugin,
        ))
        .run();
}
