//! BTD6 Replay Core
//!
//! Platform-agnostic playthrough logic for the BTD6 replay bot: the instruction
//! language, the pricing model, playthrough discovery and ranking, stats and the
//! replay state machine. Screen capture, recognition and input injection are
//! reached only through the traits in [`capabilities`].

pub mod capabilities;
pub mod catalog;
pub mod constants;
pub mod data;
pub mod descriptor;
pub mod gamemode;
pub mod geometry;
pub mod instructions;
pub mod pricing;
pub mod profile;
pub mod replay;
pub mod session;
pub mod stats;
pub mod status;
pub mod storage;

// Re-export commonly used types
pub use capabilities::{Clock, DeviceError, Host, Input, ReferenceInventory, Template, Vision};
pub use catalog::{Catalog, CatalogEntry, CatalogFilter, RankedEntry, ValidationFilter, discover};
pub use data::{DataError, GameData, JsonDirLoader, KeyCode, ResolutionAreas, Towers};
pub use descriptor::{Flag, PlaythroughDescriptor};
pub use gamemode::{Difficulty, Gamemode, MapCategory};
pub use geometry::{Point, Rect, Resolution};
pub use instructions::{Instruction, Playthrough, PlaythroughError, PlaythroughParser};
pub use pricing::{KnowledgeModifiers, PricingModel};
pub use profile::UserProfile;
pub use replay::{
    ModeKind, PlanOptions, Planner, ReplayDriver, ReplayError, ReplayState, Resume, ResumeFrom,
    RunPlan, RunSummary, Screen, TickOutcome,
};
pub use session::Session;
pub use stats::{Outcome, PlaythroughLog, PlaythroughStats};
pub use storage::{JsonFileStore, StorageError};

/// Trait for abstracting static data loading
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load and deserialize a JSON table by file name
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;

    /// Load a plain text file by name
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn load_text(&self, name: &str) -> Result<String, Self::Error>;
}

/// Trait for abstracting persisted state
/// Stats, the user profile and the tower price table
pub trait Persistence {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load playthrough stats; a missing store yields empty stats
    ///
    /// # Errors
    ///
    /// Returns an error if the stored stats cannot be read or decoded.
    fn load_stats(&self) -> Result<PlaythroughStats, Self::Error>;

    /// Replace the stored stats
    ///
    /// # Errors
    ///
    /// Returns an error if the stats cannot be written.
    fn save_stats(&self, stats: &PlaythroughStats) -> Result<(), Self::Error>;

    /// Load the user profile; a missing profile yields the default
    ///
    /// # Errors
    ///
    /// Returns an error if the stored profile cannot be read or decoded.
    fn load_profile(&self) -> Result<UserProfile, Self::Error>;

    /// Replace the stored profile
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be written.
    fn save_profile(&self, profile: &UserProfile) -> Result<(), Self::Error>;

    /// Write an updated tower table, keeping `previous` as a backup
    ///
    /// # Errors
    ///
    /// Returns an error if either table cannot be written.
    fn save_towers(&self, towers: &Towers, previous: &Towers) -> Result<(), Self::Error>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MemoryStore {
        stats: Rc<RefCell<PlaythroughStats>>,
        profile: Rc<RefCell<UserProfile>>,
        towers: Rc<RefCell<Option<(Towers, Towers)>>>,
    }

    impl Persistence for MemoryStore {
        type Error = Infallible;

        fn load_stats(&self) -> Result<PlaythroughStats, Self::Error> {
            Ok(self.stats.borrow().clone())
        }

        fn save_stats(&self, stats: &PlaythroughStats) -> Result<(), Self::Error> {
            *self.stats.borrow_mut() = stats.clone();
            Ok(())
        }

        fn load_profile(&self) -> Result<UserProfile, Self::Error> {
            Ok(self.profile.borrow().clone())
        }

        fn save_profile(&self, profile: &UserProfile) -> Result<(), Self::Error> {
            *self.profile.borrow_mut() = profile.clone();
            Ok(())
        }

        fn save_towers(&self, towers: &Towers, previous: &Towers) -> Result<(), Self::Error> {
            *self.towers.borrow_mut() = Some((towers.clone(), previous.clone()));
            Ok(())
        }
    }

    #[test]
    fn recorder_persists_every_update() {
        let store = MemoryStore::default();
        let resolution = Resolution::new(2560, 1440);
        let mut recorder = stats::StatsRecorder::new(store.load_stats().unwrap(), resolution, 36.3);
        recorder
            .record_attempt(
                &store,
                "playthroughs/logs#easy#2560x1440.btd6",
                Gamemode::Easy,
                Outcome::Win,
                Duration::from_secs(300),
            )
            .unwrap();
        recorder
            .set_validation(&store, "playthroughs/logs#easy#2560x1440.btd6", true)
            .unwrap();

        let stored = store.load_stats().unwrap();
        assert_eq!(&stored, recorder.stats());
        assert_eq!(
            stored.validation_result("playthroughs/logs#easy#2560x1440.btd6", resolution),
            Some(true)
        );
        assert_eq!(
            stored.average_win_time("playthroughs/logs#easy#2560x1440.btd6", Gamemode::Easy),
            Some(300.0)
        );
    }

    #[test]
    fn data_tables_load_together() {
        let data = test_support::fixture_data();
        assert!(data.version > 0.0);
        assert!(data.map("logs").is_some());
        assert!(data.towers.monkeys.contains_key("dart"));
        let areas = test_support::fixture_areas(&data);
        assert!(!areas.click.map_positions.is_empty());
    }
}
