//! The replay state machine.
//!
//! A single cooperative loop observes the screen once per tick and acts on
//! the `(state, screen)` pair. Work is organised as a stack of objectives;
//! `ManageObjectives` refills it for the next attempt and `Undefined`
//! arbitrates between finished, failed and retried objectives.

pub mod costs;
pub mod driver;
mod ingame;
mod navigation;
pub mod plan;
pub mod screens;

use crate::capabilities::DeviceError;
use crate::catalog::{Catalog, CatalogEntry, RankedEntry};
use crate::data::DataError;
use crate::gamemode::MapCategory;
use crate::instructions::{Playthrough, PlaythroughError};
use crate::stats::PlaythroughLog;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

pub use driver::{ReplayDriver, TickOutcome};
pub use ingame::{GameRun, dispatch_ready, next_costing_cost, next_spending_cost, sell_bundle_refund};
pub use plan::{Planner, PlanOptions, Resume, ResumeFrom};
pub use screens::{GameStateKind, Screen};

/// What the driver is trying to achieve right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplayState {
    Undefined,
    Idle,
    Ingame,
    GotoHome,
    GotoIngame,
    SelectHero,
    FindHardestIncreasedRewardsMap,
    ManageObjectives,
    Exit,
}

impl ReplayState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Idle => "idle",
            Self::Ingame => "ingame",
            Self::GotoHome => "goto_home",
            Self::GotoIngame => "goto_ingame",
            Self::SelectHero => "select_hero",
            Self::FindHardestIncreasedRewardsMap => "find_hardest_increased_rewards_map",
            Self::ManageObjectives => "manage_objectives",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of run requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Single,
    Random,
    Chase,
    Xp,
    MonkeyMoney,
    Validate,
    Costs,
}

impl ModeKind {
    pub const ALL: [Self; 7] = [
        Self::Single,
        Self::Random,
        Self::Chase,
        Self::Xp,
        Self::MonkeyMoney,
        Self::Validate,
        Self::Costs,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "file",
            Self::Random => "random",
            Self::Chase => "chase",
            Self::Xp => "xp",
            Self::MonkeyMoney => "mm",
            Self::Validate => "validate",
            Self::Costs => "costs",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the objective stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub state: ReplayState,
    pub playthrough: Option<Rc<Playthrough>>,
}

impl Objective {
    #[must_use]
    pub const fn new(state: ReplayState) -> Self {
        Self {
            state,
            playthrough: None,
        }
    }

    #[must_use]
    pub fn with(state: ReplayState, playthrough: &Rc<Playthrough>) -> Self {
        Self {
            state,
            playthrough: Some(Rc::clone(playthrough)),
        }
    }
}

/// Objectives that start a fresh game of `playthrough` and hand back to management.
#[must_use]
pub fn play_objectives(playthrough: &Rc<Playthrough>, select_hero: bool) -> Vec<Objective> {
    let mut objectives = vec![Objective::new(ReplayState::GotoHome)];
    if select_hero && playthrough.hero.is_some() {
        objectives.push(Objective::with(ReplayState::SelectHero, playthrough));
        objectives.push(Objective::new(ReplayState::GotoHome));
    }
    objectives.push(Objective::with(ReplayState::GotoIngame, playthrough));
    objectives.push(Objective::with(ReplayState::Ingame, playthrough));
    objectives.push(Objective::new(ReplayState::ManageObjectives));
    objectives
}

/// Where chase mode looks for a collection event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaseTarget {
    pub event: String,
    pub category: Option<MapCategory>,
    pub catalog: Catalog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// A fixed objective list, replayed as is on every repeat.
    Single { objectives: Vec<Objective> },
    Random { pool: Vec<CatalogEntry> },
    Xp { pool: Vec<RankedEntry> },
    MonkeyMoney { pool: Vec<RankedEntry> },
    Chase(ChaseTarget),
    Validate { queue: VecDeque<CatalogEntry> },
    Costs { objectives: Vec<Objective> },
}

impl RunMode {
    #[must_use]
    pub const fn kind(&self) -> ModeKind {
        match self {
            Self::Single { .. } => ModeKind::Single,
            Self::Random { .. } => ModeKind::Random,
            Self::Xp { .. } => ModeKind::Xp,
            Self::MonkeyMoney { .. } => ModeKind::MonkeyMoney,
            Self::Chase(_) => ModeKind::Chase,
            Self::Validate { .. } => ModeKind::Validate,
            Self::Costs { .. } => ModeKind::Costs,
        }
    }
}

/// Everything the driver needs to know about the requested run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub mode: RunMode,
    pub repeat: bool,
    pub record_stats: bool,
    /// Started mid-playthrough; no stats and no medals.
    pub resuming: bool,
    /// Execute every step before letting the game run.
    pub do_all_before_start: bool,
}

impl RunPlan {
    /// Catalog entries the run draws from, with their ranking value if ranked.
    #[must_use]
    pub fn candidates(&self) -> Vec<(&CatalogEntry, Option<f64>)> {
        match &self.mode {
            RunMode::Random { pool } => pool.iter().map(|entry| (entry, None)).collect(),
            RunMode::Xp { pool } | RunMode::MonkeyMoney { pool } => pool
                .iter()
                .map(|ranked| (&ranked.entry, Some(ranked.value)))
                .collect(),
            RunMode::Chase(target) => target.catalog.entries().map(|entry| (entry, None)).collect(),
            RunMode::Validate { queue } => queue.iter().map(|entry| (entry, None)).collect(),
            RunMode::Single { .. } | RunMode::Costs { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Playthrough(#[from] PlaythroughError),
    #[error("failed to persist state: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("no playthroughs available for {0}")]
    EmptyPool(String),
    #[error("playthrough {0:?} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("mode {0} is not supported with the loaded reference images")]
    UnsupportedMode(ModeKind),
}

impl ReplayError {
    pub(crate) fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    pub file: String,
    pub result: bool,
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub games_played: u32,
    pub wins: u32,
    pub defeats: u32,
    pub validations: Vec<ValidationRecord>,
    pub tower_changes: Vec<String>,
    pub log: PlaythroughLog,
}

/// Result of one state handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Not there yet; handle the same state next tick.
    Pending,
    Done,
    /// Precondition unmet; go home and retry the objective.
    StateFailed,
    ObjectiveFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamemode::{Difficulty, Gamemode};
    use std::collections::BTreeMap;

    fn playthrough(hero: Option<&str>) -> Rc<Playthrough> {
        Rc::new(Playthrough {
            key: "playthroughs/logs#easy#2560x1440.btd6".to_string(),
            path: None,
            descriptor: None,
            map: "logs".to_string(),
            category: MapCategory::Beginner,
            page: 0,
            slot: 1,
            difficulty: Difficulty::Easy,
            gamemode: Gamemode::Easy,
            hero: hero.map(str::to_string),
            steps: Vec::new(),
            monkeys: BTreeMap::new(),
            extra_instructions: 0,
        })
    }

    fn states(objectives: &[Objective]) -> Vec<ReplayState> {
        objectives.iter().map(|o| o.state).collect()
    }

    #[test]
    fn play_objectives_select_hero_only_when_needed() {
        use ReplayState::*;
        let plain = play_objectives(&playthrough(None), true);
        assert_eq!(
            states(&plain),
            vec![GotoHome, GotoIngame, Ingame, ManageObjectives]
        );
        let hero = play_objectives(&playthrough(Some("quincy")), true);
        assert_eq!(
            states(&hero),
            vec![GotoHome, SelectHero, GotoHome, GotoIngame, Ingame, ManageObjectives]
        );
        let same_hero = play_objectives(&playthrough(Some("quincy")), false);
        assert_eq!(states(&same_hero).len(), 4);
    }

    #[test]
    fn mode_names_match_cli_words() {
        assert_eq!(ModeKind::MonkeyMoney.to_string(), "mm");
        assert_eq!(ModeKind::Single.as_str(), "file");
        assert_eq!(
            ReplayState::FindHardestIncreasedRewardsMap.to_string(),
            "find_hardest_increased_rewards_map"
        );
    }
}
