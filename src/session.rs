// Sessions, map metadata and inventory presets: the source of the dashless feature flag.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;
use serde::Deserialize;
use strum::{Display, EnumIter, EnumString};

use crate::host::player::Player;
use crate::host::{TriggerEntered, detect_triggers};

/// Session flag and map property enabling the maneuver.
pub const PROPERTY_KEY: &str = "DASHLESSDREAMBLOCKS_INVENTORY";
/// Inventory metadata values starting with this opt the level in.
pub const INVENTORY_PREFIX: &str = "DashlessDreaming";
pub const INVENTORY_NO_BACKPACK: &str = "(No Backpack)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerInventory {
    pub dashes: u32,
    pub dream_dash: bool,
    pub backpack: bool,
    pub no_refills: bool,
}

impl PlayerInventory {
    pub const fn new(dashes: u32, dream_dash: bool, backpack: bool, no_refills: bool) -> Self {
        Self {
            dashes,
            dream_dash,
            backpack,
            no_refills,
        }
    }

    pub const DASHLESS: Self = Self::new(0, true, true, false);

    pub const PROLOGUE: Self = Self::new(0, false, true, false);
    pub const DEFAULT: Self = Self::new(1, true, true, false);
    pub const OLD_SITE: Self = Self::new(1, false, true, false);
    pub const CH6_END: Self = Self::new(2, true, true, false);
    pub const THE_SUMMIT: Self = Self::new(2, true, false, false);
    pub const CORE: Self = Self::new(2, true, true, true);
    pub const FAREWELL: Self = Self::new(1, true, false, false);
}

impl Default for PlayerInventory {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Named inventories a level can ask for in its metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum InventoryPreset {
    Prologue,
    Default,
    OldSite,
    CH6End,
    TheSummit,
    Core,
    Farewell,
}

impl InventoryPreset {
    pub fn inventory(self) -> PlayerInventory {
        match self {
            InventoryPreset::Prologue => PlayerInventory::PROLOGUE,
            InventoryPreset::Default => PlayerInventory::DEFAULT,
            InventoryPreset::OldSite => PlayerInventory::OLD_SITE,
            InventoryPreset::CH6End => PlayerInventory::CH6_END,
            InventoryPreset::TheSummit => PlayerInventory::THE_SUMMIT,
            InventoryPreset::Core => PlayerInventory::CORE,
            InventoryPreset::Farewell => PlayerInventory::FAREWELL,
        }
    }
}

pub fn is_dashless_marker(meta: &str) -> bool {
    meta.starts_with(INVENTORY_PREFIX)
}

/// Inventory named by a metadata string, if it names one.
pub fn resolve_inventory(meta: &str) -> Option<PlayerInventory> {
    if is_dashless_marker(meta) {
        let mut inventory = PlayerInventory::DASHLESS;
        if meta.contains(INVENTORY_NO_BACKPACK) {
            inventory.backpack = false;
        }
        return Some(inventory);
    }
    meta.parse::<InventoryPreset>()
        .ok()
        .map(InventoryPreset::inventory)
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ModeMeta {
    #[serde(rename = "Inventory", default)]
    pub inventory: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MapMeta {
    #[serde(rename = "Modes", default)]
    pub modes: Vec<ModeMeta>,
}

impl MapMeta {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// A loaded map: its metadata plus properties derived while loading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapData {
    pub name: String,
    pub meta: MapMeta,
    properties: HashMap<String, bool>,
}

impl MapData {
    pub fn new(name: impl Into<String>, meta: MapMeta) -> Self {
        let mut map = Self {
            name: name.into(),
            meta,
            properties: HashMap::new(),
        };
        process_map(&mut map);
        map
    }

    pub fn property(&self, key: &str) -> Option<bool> {
        self.properties.get(key).copied()
    }
}

/// Scan every mode's inventory metadata; the last dashless marker found marks the map.
/// Returns that marker.
pub fn process_map(map: &mut MapData) -> Option<String> {
    let marker = map
        .meta
        .modes
        .iter()
        .filter_map(|mode| mode.inventory.as_deref())
        .filter(|inventory| is_dashless_marker(inventory))
        .last()
        .map(str::to_owned)?;
    debug!(map = %map.name, %marker, "map opts into dashless dream dashing");
    map.properties.insert(PROPERTY_KEY.to_owned(), true);
    Some(marker)
}

#[derive(Resource, Clone, Debug)]
pub struct Session {
    pub map: Arc<MapData>,
    pub mode: usize,
    pub level: String,
    pub inventory: PlayerInventory,
    flags: HashSet<String>,
}

impl Session {
    pub fn new(map: Arc<MapData>, mode: usize, level: impl Into<String>) -> Self {
        let inventory = map
            .meta
            .modes
            .get(mode)
            .and_then(|m| m.inventory.as_deref())
            .and_then(resolve_inventory)
            .unwrap_or_default();
        let mut session = Self {
            map,
            mode,
            level: level.into(),
            inventory,
            flags: HashSet::new(),
        };
        on_session_created_or_restarted(&mut session);
        session
    }

    /// Fresh session on the same map, starting from `into_level` or the current level.
    pub fn restart(&self, into_level: Option<&str>) -> Self {
        let level = into_level.unwrap_or(&self.level);
        Self::new(Arc::clone(&self.map), self.mode, level)
    }

    pub fn get_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: &str, value: bool) {
        if value {
            self.flags.insert(flag.to_owned());
        } else {
            self.flags.remove(flag);
        }
    }

    pub fn feature_flag(&self) -> bool {
        self.get_flag(PROPERTY_KEY)
    }
}

/// Copy the map's dashless property into the session flags.
pub fn on_session_created_or_restarted(session: &mut Session) {
    if let Some(value) = session.map.property(PROPERTY_KEY) {
        info!(map = %session.map.name, "Loading level with DashlessDreaming inventory");
        session.set_flag(PROPERTY_KEY, value);
    }
}

/// A trigger carrying the marker sets the flag; other triggers leave it alone.
pub fn on_trigger_entered(session: &mut Session, configured_flag: Option<bool>) {
    if let Some(value) = configured_flag {
        debug!(value, "inventory trigger sets the dashless flag");
        session.set_flag(PROPERTY_KEY, value);
    }
}

/// Swaps the player's inventory on entry.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct InventoryTrigger {
    pub inventory: PlayerInventory,
    /// Present only for triggers configured with the dashless marker.
    pub dashless_flag: Option<bool>,
}

impl InventoryTrigger {
    pub fn from_config(configured: &str) -> Self {
        if is_dashless_marker(configured) {
            return Self {
                inventory: resolve_inventory(configured).unwrap_or(PlayerInventory::DASHLESS),
                dashless_flag: Some(true),
            };
        }
        Self {
            inventory: resolve_inventory(configured).unwrap_or_default(),
            dashless_flag: None,
        }
    }
}

#[derive(Message, Clone, Debug)]
pub enum SessionRequest {
    Start {
        map: Arc<MapData>,
        mode: usize,
        level: String,
    },
    Restart {
        into_level: Option<String>,
    },
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<SessionRequest>()
            .add_systems(FixedFirst, handle_session_requests)
            .add_systems(FixedUpdate, apply_inventory_triggers.after(detect_triggers));
    }
}

fn handle_session_requests(
    mut commands: Commands,
    mut requests: MessageReader<SessionRequest>,
    current: Option<Res<Session>>,
    mut players: Query<&mut Player>,
) {
    let mut latest = current.map(|s| Session::clone(&s));
    let mut started = false;
    for request in requests.read() {
        let next = match request {
            SessionRequest::Start { map, mode, level } => {
                Session::new(Arc::clone(map), *mode, level.clone())
            }
            SessionRequest::Restart { into_level } => {
                let Some(session) = &latest else {
                    warn!("restart requested without a session");
                    continue;
                };
                session.restart(into_level.as_deref())
            }
        };
        latest = Some(next);
        started = true;
    }
    if !started {
        return;
    }
    let Some(session) = latest else {
        return;
    };

    info!(
        map = %session.map.name,
        level = %session.level,
        dashless = session.feature_flag(),
        "session started"
    );
    for mut player in &mut players {
        player.inventory = session.inventory;
        player.dashes = session.inventory.dashes;
    }
    commands.insert_resource(session);
}

fn apply_inventory_triggers(
    mut entered: MessageReader<TriggerEntered>,
    triggers: Query<&InventoryTrigger>,
    mut players: Query<&mut Player>,
    mut session: Option<ResMut<Session>>,
) {
    for TriggerEntered { trigger, player } in entered.read() {
        let Ok(config) = triggers.get(*trigger) else {
            continue;
        };
        if let Ok(mut player) = players.get_mut(*player) {
            player.apply_inventory(config.inventory);
        }
        if let Some(session) = session.as_deref_mut() {
            on_trigger_entered(session, config.dashless_flag);
        }
    }
}
