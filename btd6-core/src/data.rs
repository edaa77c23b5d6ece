//! Static game tables: maps, gamemodes, keybinds, tower prices and screen areas.
//!
//! Everything here is loaded once through a [`DataLoader`] into an immutable
//! [`GameData`] snapshot and then passed by reference to the parser, catalog
//! and replay driver.

use crate::DataLoader;
use crate::constants::{
    BASE_RESOLUTION, GAMEMODES_FILE, IMAGE_AREAS_FILE, KEYBINDS_FILE, MAPS_FILE,
    TEST_POSITIONS_FILE, TOWERS_FILE, VERSION_FILE,
};
use crate::gamemode::{CashGroup, Difficulty, Gamemode, MapCategory};
use crate::geometry::{Point, Rect, Resolution};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or resolving the static tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid game version {0:?}")]
    Version(String),
    #[error(
        "{table} has no entry for {resolution} and no {base} entry to scale from",
        base = BASE_RESOLUTION
    )]
    MissingResolution {
        table: &'static str,
        resolution: Resolution,
    },
}

/// Reads JSON tables and text files from a directory on disk.
#[derive(Debug, Clone)]
pub struct JsonDirLoader {
    root: PathBuf,
}

impl JsonDirLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataLoader for JsonDirLoader {
    type Error = DataError;

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        let text = self.load_text(config_name)?;
        serde_json::from_str(&text).map_err(|source| DataError::Parse {
            name: config_name.to_string(),
            source,
        })
    }

    fn load_text(&self, name: &str) -> Result<String, Self::Error> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|source| DataError::Io { path, source })
    }
}

// Maps ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub category: MapCategory,
    pub name: String,
    pub page: u32,
    pub pos: usize,
}

// Gamemodes ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamemodeInfo {
    pub group: Difficulty,
    pub cash_group: CashGroup,
    pub name: String,
    /// Ranking used when picking the most valuable playthrough for a map.
    pub value: u32,
}

// Keybinds -----------------------------------------------------------------

/// A key as the input backend understands it: a named key or a raw scan code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyCode {
    ScanCode(u32),
    Named(String),
}

impl KeyCode {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::Named(name.to_string())
    }

    #[must_use]
    pub fn escape() -> Self {
        Self::named("{Esc}")
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanCode(code) => write!(f, "sc{code:03x}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybinds {
    pub monkeys: BTreeMap<String, KeyCode>,
    pub path: BTreeMap<String, KeyCode>,
    pub others: BTreeMap<String, KeyCode>,
    #[serde(default)]
    pub recording: BTreeMap<String, KeyCode>,
}

impl Keybinds {
    #[must_use]
    pub fn monkey(&self, tower: &str) -> Option<&KeyCode> {
        self.monkeys.get(tower)
    }

    #[must_use]
    pub fn path(&self, path: u8) -> Option<&KeyCode> {
        self.path.get(&path.to_string())
    }

    #[must_use]
    pub fn other(&self, action: &str) -> Option<&KeyCode> {
        self.others.get(action)
    }
}

// Towers -------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonkeyGroup {
    Primary,
    Military,
    Magic,
    Support,
}

/// Terrain a tower can be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementClass {
    Land,
    Water,
    Any,
}

pub type UpgradeTable<T> = [[T; 5]; 3];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonkeyCosts {
    pub base: i64,
    #[serde(rename = "type")]
    pub group: MonkeyGroup,
    #[serde(rename = "class")]
    pub class: PlacementClass,
    pub upgrades: UpgradeTable<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_confirmation: Option<UpgradeTable<bool>>,
}

impl MonkeyCosts {
    /// Whether buying tier `tier` (1-based) on `path` opens a confirmation dialog.
    #[must_use]
    pub fn requires_confirmation(&self, path: u8, tier: u8) -> bool {
        let Some(table) = &self.upgrade_confirmation else {
            return false;
        };
        if tier == 0 {
            return false;
        }
        let index = usize::from(tier - 1);
        if index >= 5 {
            return true;
        }
        table
            .get(usize::from(path))
            .and_then(|row| row.get(index))
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroCosts {
    pub base: i64,
    #[serde(rename = "class")]
    pub class: PlacementClass,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Towers {
    pub monkeys: BTreeMap<String, MonkeyCosts>,
    pub heroes: BTreeMap<String, HeroCosts>,
}

// Screen areas -------------------------------------------------------------

/// Types whose coordinates can be rescaled between resolutions.
pub trait Rescale {
    #[must_use]
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self;
}

impl Rescale for Point {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        self.scaled(from, to)
    }
}

impl Rescale for Rect {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        self.scaled(from, to)
    }
}

impl<T: Rescale> Rescale for Option<T> {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        self.as_ref().map(|v| v.rescaled(from, to))
    }
}

impl<T: Rescale> Rescale for Vec<T> {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        self.iter().map(|v| v.rescaled(from, to)).collect()
    }
}

impl<K: Ord + Clone, T: Rescale> Rescale for BTreeMap<K, T> {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        self.iter()
            .map(|(k, v)| (k.clone(), v.rescaled(from, to)))
            .collect()
    }
}

/// Screen regions fed to digit recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSegments {
    pub lives: Rect,
    pub mana_lives: Rect,
    pub money: Rect,
    pub round: Rect,
    pub round_ge100_rounds: Rect,
}

impl OcrSegments {
    /// Gamemodes lasting past round 99 render a wider round counter.
    #[must_use]
    pub const fn round_for(&self, gamemode: Gamemode) -> Rect {
        match gamemode {
            Gamemode::Impoppable | Gamemode::Chimps => self.round_ge100_rounds,
            _ => self.round,
        }
    }
}

impl Rescale for OcrSegments {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        Self {
            lives: self.lives.rescaled(from, to),
            mana_lives: self.mana_lives.rescaled(from, to),
            money: self.money.rescaled(from, to),
            round: self.round.rescaled(from, to),
            round_ge100_rounds: self.round_ge100_rounds.rescaled(from, to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareAreas {
    pub screens: BTreeMap<String, Rect>,
    pub game_state: Rect,
}

impl Rescale for CompareAreas {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        Self {
            screens: self.screens.rescaled(from, to),
            game_state: self.game_state.rescaled(from, to),
        }
    }
}

/// A gamemode button, or the name of a gamemode sharing its button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GamemodePosition {
    At(Point),
    SameAs(Gamemode),
}

impl Rescale for GamemodePosition {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        match self {
            Self::At(point) => Self::At(point.rescaled(from, to)),
            Self::SameAs(other) => Self::SameAs(*other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickAreas {
    pub map_categories: BTreeMap<MapCategory, Point>,
    pub map_positions: Vec<Point>,
    pub gamedifficulty_positions: BTreeMap<Difficulty, Point>,
    pub gamemode_positions: BTreeMap<Gamemode, GamemodePosition>,
    pub hero_positions: BTreeMap<String, Point>,
    pub screen_startmenu_button_play: Point,
    pub screen_startmenu_button_hero_selection: Point,
    pub screen_hero_selection_select_hero: Point,
    pub screen_ingame_paused_button_home: Point,
    pub screen_victory_summary_button_next: Point,
    pub screen_victory_button_home: Point,
    pub screen_overwrite_save_button_ok: Point,
    pub gamemode_deflation_message_confirmation: Point,
    pub gamemode_apopalypse_message_confirmation: Point,
    pub paragon_message_confirmation: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_claim_chest: Option<Point>,
}

impl ClickAreas {
    /// Follows gamemode aliases until a concrete button position is found.
    #[must_use]
    pub fn gamemode_position(&self, gamemode: Gamemode) -> Option<Point> {
        let mut current = gamemode;
        for _ in 0..self.gamemode_positions.len() {
            match self.gamemode_positions.get(&current)? {
                GamemodePosition::At(point) => return Some(*point),
                GamemodePosition::SameAs(next) => current = *next,
            }
        }
        None
    }
}

impl Rescale for ClickAreas {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        Self {
            map_categories: self.map_categories.rescaled(from, to),
            map_positions: self.map_positions.rescaled(from, to),
            gamedifficulty_positions: self.gamedifficulty_positions.rescaled(from, to),
            gamemode_positions: self.gamemode_positions.rescaled(from, to),
            hero_positions: self.hero_positions.rescaled(from, to),
            screen_startmenu_button_play: self.screen_startmenu_button_play.rescaled(from, to),
            screen_startmenu_button_hero_selection: self
                .screen_startmenu_button_hero_selection
                .rescaled(from, to),
            screen_hero_selection_select_hero: self
                .screen_hero_selection_select_hero
                .rescaled(from, to),
            screen_ingame_paused_button_home: self
                .screen_ingame_paused_button_home
                .rescaled(from, to),
            screen_victory_summary_button_next: self
                .screen_victory_summary_button_next
                .rescaled(from, to),
            screen_victory_button_home: self.screen_victory_button_home.rescaled(from, to),
            screen_overwrite_save_button_ok: self.screen_overwrite_save_button_ok.rescaled(from, to),
            gamemode_deflation_message_confirmation: self
                .gamemode_deflation_message_confirmation
                .rescaled(from, to),
            gamemode_apopalypse_message_confirmation: self
                .gamemode_apopalypse_message_confirmation
                .rescaled(from, to),
            paragon_message_confirmation: self.paragon_message_confirmation.rescaled(from, to),
            collection_claim_chest: self.collection_claim_chest.rescaled(from, to),
        }
    }
}

/// All screen regions and click targets for one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAreas {
    pub ocr_segments: OcrSegments,
    pub compare: CompareAreas,
    pub click: ClickAreas,
}

impl Rescale for ResolutionAreas {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        Self {
            ocr_segments: self.ocr_segments.rescaled(from, to),
            compare: self.compare.rescaled(from, to),
            click: self.click.rescaled(from, to),
        }
    }
}

/// Placement spots used when probing tower prices on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPosition {
    pub land: Point,
    pub water: Point,
}

impl TestPosition {
    #[must_use]
    pub const fn for_class(&self, class: PlacementClass) -> Point {
        match class {
            PlacementClass::Water => self.water,
            PlacementClass::Land | PlacementClass::Any => self.land,
        }
    }
}

impl Rescale for TestPosition {
    fn rescaled(&self, from: Resolution, to: Resolution) -> Self {
        Self {
            land: self.land.rescaled(from, to),
            water: self.water.rescaled(from, to),
        }
    }
}

/// Looks up `resolution` in a per-resolution table, scaling the base entry when absent.
fn for_resolution<T: Rescale + Clone>(
    table: &BTreeMap<String, T>,
    name: &'static str,
    resolution: Resolution,
) -> Result<T, DataError> {
    if let Some(entry) = table.get(&resolution.to_string()) {
        return Ok(entry.clone());
    }
    table
        .get(&BASE_RESOLUTION.to_string())
        .map(|entry| entry.rescaled(BASE_RESOLUTION, resolution))
        .ok_or(DataError::MissingResolution {
            table: name,
            resolution,
        })
}

// Snapshot -----------------------------------------------------------------

/// Immutable snapshot of every static table.
#[derive(Debug, Clone)]
pub struct GameData {
    pub maps: BTreeMap<String, MapInfo>,
    pub gamemodes: BTreeMap<Gamemode, GamemodeInfo>,
    pub keybinds: Keybinds,
    pub towers: Towers,
    pub image_areas: BTreeMap<String, ResolutionAreas>,
    pub test_positions: BTreeMap<String, BTreeMap<String, TestPosition>>,
    pub version: f64,
}

impl GameData {
    /// Load all tables through `loader`.
    ///
    /// # Errors
    ///
    /// Returns an error if any table is missing or malformed, or the version file
    /// does not contain a number.
    pub fn load<L>(loader: &L) -> Result<Self, DataError>
    where
        L: DataLoader,
        L::Error: Into<DataError>,
    {
        let version_text = loader.load_text(VERSION_FILE).map_err(Into::into)?;
        let version = version_text
            .trim()
            .parse::<f64>()
            .map_err(|_| DataError::Version(version_text.trim().to_string()))?;
        let test_positions = match loader.load_config(TEST_POSITIONS_FILE) {
            Ok(table) => table,
            Err(err) => {
                log::debug!("no test positions loaded: {err}");
                BTreeMap::new()
            }
        };
        Ok(Self {
            maps: loader.load_config(MAPS_FILE).map_err(Into::into)?,
            gamemodes: loader.load_config(GAMEMODES_FILE).map_err(Into::into)?,
            keybinds: loader.load_config(KEYBINDS_FILE).map_err(Into::into)?,
            towers: loader.load_config(TOWERS_FILE).map_err(Into::into)?,
            image_areas: loader.load_config(IMAGE_AREAS_FILE).map_err(Into::into)?,
            test_positions,
            version,
        })
    }

    /// Screen areas for `resolution`, scaled from the base resolution when needed.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingResolution`] when neither entry exists.
    pub fn areas_for(&self, resolution: Resolution) -> Result<ResolutionAreas, DataError> {
        for_resolution(&self.image_areas, IMAGE_AREAS_FILE, resolution)
    }

    /// Cost probing positions for `resolution`, keyed by map.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingResolution`] when neither entry exists.
    pub fn test_positions_for(
        &self,
        resolution: Resolution,
    ) -> Result<BTreeMap<String, TestPosition>, DataError> {
        for_resolution(&self.test_positions, TEST_POSITIONS_FILE, resolution)
    }

    #[must_use]
    pub fn map(&self, key: &str) -> Option<&MapInfo> {
        self.maps.get(key)
    }

    /// Difficulty tier a gamemode is played on; sandboxes use their parent tier.
    #[must_use]
    pub fn difficulty_of(&self, gamemode: Gamemode) -> Option<Difficulty> {
        gamemode
            .sandbox_difficulty()
            .or_else(|| self.gamemodes.get(&gamemode).map(|info| info.group))
    }

    #[must_use]
    pub fn gamemode_value(&self, gamemode: Gamemode) -> u32 {
        self.gamemodes.get(&gamemode).map_or(0, |info| info.value)
    }

    /// Map keys in `category`, in table order.
    #[must_use]
    pub fn maps_in(&self, category: MapCategory) -> Vec<&str> {
        self.maps
            .iter()
            .filter(|(_, info)| info.category == category)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Categories that contain at least one map, easiest first.
    #[must_use]
    pub fn categories(&self) -> Vec<MapCategory> {
        MapCategory::ALL
            .iter()
            .copied()
            .filter(|category| self.maps.values().any(|info| info.category == *category))
            .collect()
    }

    /// Number of selection pages in `category`.
    #[must_use]
    pub fn category_pages(&self, category: MapCategory) -> u32 {
        self.maps
            .values()
            .filter(|info| info.category == category)
            .map(|info| info.page + 1)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn map_at(&self, category: MapCategory, page: u32, pos: usize) -> Option<&str> {
        self.maps
            .iter()
            .find(|(_, info)| info.category == category && info.page == page && info.pos == pos)
            .map(|(key, _)| key.as_str())
    }

    #[must_use]
    pub fn is_known_tower(&self, tower: &str) -> bool {
        self.towers.monkeys.contains_key(tower) || self.towers.heroes.contains_key(tower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_data;

    #[test]
    fn fixture_tables_load() {
        let data = fixture_data();
        assert!(data.maps.contains_key("logs"));
        assert_eq!(data.gamemodes[&Gamemode::Chimps].value, 12);
        assert_eq!(data.keybinds.monkey("dart"), Some(&KeyCode::named("q")));
        assert!(data.towers.monkeys["super"].upgrade_confirmation.is_some());
        assert!(data.version > 0.0);
    }

    #[test]
    fn keycodes_accept_names_and_scan_codes() {
        let keys: Vec<KeyCode> = serde_json::from_str(r#"["{Esc}", 21]"#).unwrap();
        assert_eq!(keys, vec![KeyCode::escape(), KeyCode::ScanCode(21)]);
    }

    #[test]
    fn difficulty_of_sandbox_follows_parent() {
        let data = fixture_data();
        assert_eq!(
            data.difficulty_of(Gamemode::MediumSandbox),
            Some(Difficulty::Medium)
        );
        assert_eq!(data.difficulty_of(Gamemode::Chimps), Some(Difficulty::Hard));
        assert_eq!(data.difficulty_of(Gamemode::Deflation), Some(Difficulty::Easy));
    }

    #[test]
    fn areas_scale_from_base_resolution() {
        let data = fixture_data();
        let native = data.areas_for(Resolution::new(2560, 1440)).unwrap();
        let half = data.areas_for(Resolution::new(1280, 720)).unwrap();
        let play = native.click.screen_startmenu_button_play;
        assert_eq!(
            half.click.screen_startmenu_button_play,
            Point::new(play.x / 2, play.y / 2)
        );
        assert_eq!(half.click.map_positions.len(), native.click.map_positions.len());
    }

    #[test]
    fn gamemode_aliases_resolve_to_points() {
        let data = fixture_data();
        let areas = data.areas_for(Resolution::new(2560, 1440)).unwrap();
        let hard = areas.click.gamemode_position(Gamemode::Hard).unwrap();
        let hard_sandbox = areas.click.gamemode_position(Gamemode::HardSandbox).unwrap();
        assert_eq!(
            areas.click.gamemode_positions[&Gamemode::Hard],
            GamemodePosition::SameAs(Gamemode::Easy)
        );
        assert_eq!(hard, areas.click.gamemode_position(Gamemode::Easy).unwrap());
        assert_ne!(hard, hard_sandbox);
    }

    #[test]
    fn category_pagination_and_slots() {
        let data = fixture_data();
        assert_eq!(data.category_pages(MapCategory::Beginner), 2);
        assert_eq!(data.map_at(MapCategory::Beginner, 0, 0), Some("monkey_meadow"));
        assert!(data.map_at(MapCategory::Expert, 9, 0).is_none());
    }

    #[test]
    fn confirmation_rules() {
        let data = fixture_data();
        let super_monkey = &data.towers.monkeys["super"];
        assert!(!super_monkey.requires_confirmation(0, 0));
        assert!(super_monkey.requires_confirmation(0, 5));
        assert!(!super_monkey.requires_confirmation(0, 1));
        assert!(!data.towers.monkeys["dart"].requires_confirmation(0, 5));
    }
}
