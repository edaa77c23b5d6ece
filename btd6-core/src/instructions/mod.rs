//! Typed playthrough instructions and the parsed playthrough they belong to.

pub mod parser;
pub mod writer;

use crate::data::KeyCode;
use crate::descriptor::PlaythroughDescriptor;
use crate::gamemode::{Difficulty, Gamemode, MapCategory};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub use parser::{LineError, PlaythroughError, PlaythroughParser};
pub use writer::write_instructions;

/// What a placed tower is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TowerKind {
    Monkey(String),
    Hero(String),
}

impl TowerKind {
    #[must_use]
    pub const fn is_hero(&self) -> bool {
        matches!(self, Self::Hero(_))
    }

    /// Tower type, or the hero's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Monkey(name) | Self::Hero(name) => name,
        }
    }

    #[must_use]
    pub fn monkey_type(&self) -> Option<&str> {
        match self {
            Self::Monkey(name) => Some(name),
            Self::Hero(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSpeed {
    Slow,
    Fast,
}

impl GameSpeed {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Fast => "fast",
        }
    }
}

/// Which price table a cost probe fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeGroup {
    Monkeys,
    Heroes,
}

/// Marks a purchase whose observed price should be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CostProbe {
    pub group: ProbeGroup,
    pub tower: String,
    /// `(path, tier)` with a 1-based tier, or `None` for the base price.
    pub upgrade: Option<(u8, u8)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceStep {
    pub name: String,
    pub tower: TowerKind,
    pub key: KeyCode,
    pub position: Point,
    pub cost: i64,
    pub discount: Option<u8>,
    pub probe: Option<CostProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeStep {
    pub name: String,
    pub path: u8,
    pub key: KeyCode,
    pub position: Point,
    pub cost: i64,
    pub discount: Option<u8>,
    pub probe: Option<CostProbe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetStep {
    pub name: String,
    pub key: KeyCode,
    pub position: Point,
    pub to: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialStep {
    pub name: String,
    pub key: KeyCode,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellStep {
    pub name: String,
    pub key: KeyCode,
    pub position: Point,
    /// Negative: the refund.
    pub cost: i64,
}

/// One replayable action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Instruction {
    Place(PlaceStep),
    Upgrade(UpgradeStep),
    Retarget(RetargetStep),
    Special(SpecialStep),
    Sell(SellStep),
    RemoveObstacle { position: Point, cost: i64 },
    AwaitRound { round: u32 },
    Speed { speed: GameSpeed },
    /// Dismisses a dialog; inserted by the parser, never written back.
    Click { name: Option<String>, position: Point },
}

/// Discriminant of [`Instruction`], for logging and dispatch rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Place,
    Upgrade,
    Retarget,
    Special,
    Sell,
    RemoveObstacle,
    AwaitRound,
    Speed,
    Click,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Upgrade => "upgrade",
            Self::Retarget => "retarget",
            Self::Special => "special",
            Self::Sell => "sell",
            Self::RemoveObstacle => "remove",
            Self::AwaitRound => "await_round",
            Self::Speed => "speed",
            Self::Click => "click",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Instruction {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Place(_) => ActionKind::Place,
            Self::Upgrade(_) => ActionKind::Upgrade,
            Self::Retarget(_) => ActionKind::Retarget,
            Self::Special(_) => ActionKind::Special,
            Self::Sell(_) => ActionKind::Sell,
            Self::RemoveObstacle { .. } => ActionKind::RemoveObstacle,
            Self::AwaitRound { .. } => ActionKind::AwaitRound,
            Self::Speed { .. } => ActionKind::Speed,
            Self::Click { .. } => ActionKind::Click,
        }
    }

    /// Positive when money is spent, negative for refunds.
    #[must_use]
    pub const fn cost(&self) -> i64 {
        match self {
            Self::Place(step) => step.cost,
            Self::Upgrade(step) => step.cost,
            Self::Sell(step) => step.cost,
            Self::RemoveObstacle { cost, .. } => *cost,
            Self::Retarget(_)
            | Self::Special(_)
            | Self::AwaitRound { .. }
            | Self::Speed { .. }
            | Self::Click { .. } => 0,
        }
    }

    /// Name of the monkey the instruction acts on.
    #[must_use]
    pub fn monkey_name(&self) -> Option<&str> {
        match self {
            Self::Place(step) => Some(&step.name),
            Self::Upgrade(step) => Some(&step.name),
            Self::Retarget(step) => Some(&step.name),
            Self::Special(step) => Some(&step.name),
            Self::Sell(step) => Some(&step.name),
            Self::Click { name, .. } => name.as_deref(),
            Self::RemoveObstacle { .. } | Self::AwaitRound { .. } | Self::Speed { .. } => None,
        }
    }

    #[must_use]
    pub const fn probe(&self) -> Option<&CostProbe> {
        match self {
            Self::Place(step) => step.probe.as_ref(),
            Self::Upgrade(step) => step.probe.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place(step) => write!(
                f,
                "place {} {} at {} for {}",
                step.tower.name(),
                step.name,
                step.position,
                step.cost
            ),
            Self::Upgrade(step) => write!(
                f,
                "upgrade {} path {} for {}",
                step.name, step.path, step.cost
            ),
            Self::Retarget(step) => match step.to {
                Some(to) => write!(f, "retarget {} to {to}", step.name),
                None => write!(f, "retarget {}", step.name),
            },
            Self::Special(step) => write!(f, "special {}", step.name),
            Self::Sell(step) => write!(f, "sell {} for {}", step.name, -step.cost),
            Self::RemoveObstacle { position, cost } => {
                write!(f, "remove obstacle at {position} for {cost}")
            }
            Self::AwaitRound { round } => write!(f, "round {round}"),
            Self::Speed { speed } => write!(f, "speed {}", speed.as_str()),
            Self::Click { position, .. } => write!(f, "click at {position}"),
        }
    }
}

/// A placed tower as tracked while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonkeyState {
    pub name: String,
    pub tower: TowerKind,
    pub position: Point,
    pub upgrades: [u8; 3],
    /// Sum of every adjusted price paid for this tower.
    pub value: i64,
    pub sold: bool,
}

/// A parsed playthrough ready for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Playthrough {
    /// Stats key: the path the file was loaded from.
    pub key: String,
    pub path: Option<PathBuf>,
    pub descriptor: Option<PlaythroughDescriptor>,
    pub map: String,
    pub category: MapCategory,
    pub page: u32,
    pub slot: usize,
    pub difficulty: Difficulty,
    pub gamemode: Gamemode,
    pub hero: Option<String>,
    pub steps: Vec<Instruction>,
    pub monkeys: BTreeMap<String, MonkeyState>,
    /// Leading synthetic steps not present in the file.
    pub extra_instructions: usize,
}

impl Playthrough {
    #[must_use]
    pub fn monkey(&self, name: &str) -> Option<&MonkeyState> {
        self.monkeys.get(name)
    }

    /// Whether `name` is a mortar, which needs a click to confirm retargeting.
    #[must_use]
    pub fn is_mortar(&self, name: &str) -> bool {
        self.monkey(name)
            .and_then(|m| m.tower.monkey_type())
            .is_some_and(|tower| tower == crate::constants::MORTAR_TYPE)
    }
}
