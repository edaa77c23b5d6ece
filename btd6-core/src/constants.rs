//! Centralized economy rules, recognition thresholds and pacing constants.
//!
//! The economy values mirror the game's own arithmetic and must not drift;
//! recorded playthroughs are validated against observed in-game balances.

use crate::geometry::{Point, Resolution};
use std::time::Duration;

// Economy ------------------------------------------------------------------
pub(crate) const PRICE_ROUNDING_STEP: f64 = 5.0;
pub(crate) const DIFFICULTY_FACTOR_EASY: f64 = 0.85;
pub(crate) const DIFFICULTY_FACTOR_MEDIUM: f64 = 1.0;
pub(crate) const DIFFICULTY_FACTOR_HARD: f64 = 1.08;
pub(crate) const IMPOPPABLE_FACTOR: f64 = 1.2;
pub(crate) const HERO_FAVORS_FACTOR: f64 = 0.9;
pub(crate) const FIRST_SPIKE_REDUCTION: i64 = 150;
pub(crate) const FIRST_SPIKE_NAME: &str = "spike0";
pub(crate) const SPIKE_TYPE: &str = "spike";
pub(crate) const MORTAR_TYPE: &str = "mortar";
pub(crate) const SELL_RATIO: f64 = 0.7;
pub(crate) const MAX_UPGRADE_TIER: u8 = 5;
pub(crate) const CROSSPATH_TIER_LIMIT: u8 = 2;
pub(crate) const MAX_ACTIVE_PATHS: usize = 2;

// Knowledge ----------------------------------------------------------------
pub(crate) const KNOWLEDGE_HERO_FAVORS: &str = "hero_favors";
pub(crate) const KNOWLEDGE_FIRST_LAST_LINE: &str = "first_last_line_of_defense";

// Recognition --------------------------------------------------------------
pub(crate) const SCREEN_MATCH_THRESHOLD: f64 = 0.05;
pub(crate) const COLLECTION_MATCH_THRESHOLD: f64 = 0.05;
pub(crate) const INSTA_MATCH_THRESHOLD: f64 = 0.01;
pub(crate) const UNREADABLE: i64 = -1;
pub const TARGET_WINDOW_TITLES: [&str; 2] = ["BloonsTD6", "BloonsTD6-Epic"];

// Pacing -------------------------------------------------------------------
pub(crate) const SMALL_ACTION_DELAY: Duration = Duration::from_millis(50);
pub(crate) const ACTION_DELAY: Duration = Duration::from_millis(200);
pub(crate) const MENU_CHANGE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const TRANSIENT_SCREEN_WAIT: Duration = Duration::from_secs(2);
pub(crate) const GOLDEN_BLOON_PAGE_WAIT: Duration = Duration::from_secs(4);
pub(crate) const INGAME_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub(crate) const MENU_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const DISMISS_CLICK: Point = Point::new(100, 100);
pub(crate) const GOLDEN_BLOON_EVENT: &str = "golden_bloon";

// Data files ---------------------------------------------------------------
pub const BASE_RESOLUTION: Resolution = Resolution::new(2560, 1440);
pub const MAPS_FILE: &str = "maps.json";
pub const GAMEMODES_FILE: &str = "gamemodes.json";
pub const KEYBINDS_FILE: &str = "keybinds.json";
pub const TOWERS_FILE: &str = "towers.json";
pub const TOWERS_BACKUP_FILE: &str = "towers_backup.json";
pub const IMAGE_AREAS_FILE: &str = "image_areas.json";
pub const TEST_POSITIONS_FILE: &str = "test_positions.json";
pub const VERSION_FILE: &str = "version.txt";
pub const STATS_FILE: &str = "playthrough_stats.json";
pub const PROFILE_FILE: &str = "userconfig.json";
pub const PLAYTHROUGH_EXTENSION: &str = "btd6";
pub const DEFAULT_PLAYTHROUGH_DIRS: [&str; 2] = ["own_playthroughs", "playthroughs"];
pub const UNVALIDATED_PLAYTHROUGH_DIR: &str = "unvalidated_playthroughs";
