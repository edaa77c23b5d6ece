//! Line-oriented playthrough parser.
//!
//! A malformed or illegal line is logged and skipped; only problems with the
//! file as a whole (unknown map, unreadable file) fail the parse.

use super::{
    GameSpeed, Instruction, MonkeyState, PlaceStep, Playthrough, RetargetStep, SellStep,
    SpecialStep, TowerKind, UpgradeStep,
};
use crate::constants::{CROSSPATH_TIER_LIMIT, MAX_ACTIVE_PATHS, MAX_UPGRADE_TIER};
use crate::data::{ClickAreas, GameData, KeyCode};
use crate::descriptor::{DescriptorError, PlaythroughDescriptor};
use crate::gamemode::Gamemode;
use crate::geometry::{Point, Resolution, rescale_coordinate_pairs};
use crate::pricing::{KnowledgeModifiers, PricingModel, Purchase, sell_value};
use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

static LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<action>place|upgrade|retarget|special|sell|remove|round|speed)",
        r" ?(?P<type>[a-z_]+)? (?P<name>\w+)",
        r"(?: (?:(?:at|to) (?P<x>\d+), (?P<y>\d+))?(?:path (?P<path>[0-2]))?)?",
        r"(?: for (?P<price>\d+|\?\?\?))?",
        r"(?: with (?P<discount>\d{1,2}|100)% discount)?$",
    ))
    .expect("instruction line regex")
});

/// A problem with a playthrough file as a whole.
#[derive(Debug, Error)]
pub enum PlaythroughError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("unknown map {0:?}")]
    UnknownMap(String),
    #[error("gamemode {0} has no difficulty entry")]
    UnknownGamemode(Gamemode),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single line was skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("unrecognized instruction")]
    Unrecognized,
    #[error("monkey {0} placed twice")]
    DuplicateName(String),
    #[error("monkey/hero {name} has unknown type {tower:?}")]
    UnknownTower { name: String, tower: String },
    #[error("monkey {0} unplaced")]
    Unplaced(String),
    #[error("monkey {0} was already sold")]
    Sold(String),
    #[error("tried to upgrade hero {0}")]
    HeroUpgrade(String),
    #[error("monkey {name} has invalid upgrade path {levels}")]
    IllegalUpgrade { name: String, levels: String },
    #[error("instruction needs a position")]
    MissingPosition,
    #[error("upgrade needs a path")]
    MissingPath,
    #[error("mortar {0} can only be retargeted to a position")]
    MortarWithoutTarget(String),
    #[error("remove obstacle without price specified")]
    MissingObstaclePrice,
    #[error("invalid round {0:?}")]
    InvalidRound(String),
    #[error("invalid speed {0:?}")]
    InvalidSpeed(String),
    #[error("no key bound for {0}")]
    MissingKeybind(String),
}

/// Whether an upgrade vector is reachable in game: at most one path past tier
/// two, at most two paths bought, no path past tier five.
#[must_use]
pub fn is_legal_upgrade(levels: [u8; 3]) -> bool {
    let crosspaths = levels.iter().filter(|l| **l > CROSSPATH_TIER_LIMIT).count();
    let active = levels.iter().filter(|l| **l > 0).count();
    crosspaths <= 1 && active <= MAX_ACTIVE_PATHS && levels.iter().all(|l| *l <= MAX_UPGRADE_TIER)
}

#[must_use]
pub fn format_upgrades(levels: [u8; 3]) -> String {
    format!("{}-{}-{}", levels[0], levels[1], levels[2])
}

/// Parses lines one at a time while tracking every placed tower.
#[derive(Debug)]
pub struct LineParser<'a> {
    data: &'a GameData,
    click: &'a ClickAreas,
    pricing: PricingModel,
    monkeys: BTreeMap<String, MonkeyState>,
    hero: Option<String>,
}

impl<'a> LineParser<'a> {
    #[must_use]
    pub const fn new(data: &'a GameData, click: &'a ClickAreas, pricing: PricingModel) -> Self {
        Self {
            data,
            click,
            pricing,
            monkeys: BTreeMap::new(),
            hero: None,
        }
    }

    #[must_use]
    pub const fn monkeys(&self) -> &BTreeMap<String, MonkeyState> {
        &self.monkeys
    }

    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, MonkeyState>, Option<String>) {
        (self.monkeys, self.hero)
    }

    /// Instructions produced by one line. Blank lines produce none.
    ///
    /// # Errors
    ///
    /// Returns the reason the line must be skipped; the registry is unchanged then.
    pub fn parse_line(&mut self, line: &str) -> Result<Vec<Instruction>, LineError> {
        if line.trim().is_empty() {
            return Ok(Vec::new());
        }
        let caps = LINE.captures(line.trim_end()).ok_or(LineError::Unrecognized)?;
        let name = caps["name"].to_string();
        match &caps["action"] {
            "place" => self.place(&caps, name),
            "upgrade" => self.upgrade(&caps, name),
            "retarget" => self.retarget(&caps, name),
            "special" => self.special(name),
            "sell" => self.sell(name),
            "remove" => remove(&caps),
            "round" => match name.parse::<u32>() {
                Ok(round) if round >= 1 => Ok(vec![Instruction::AwaitRound { round }]),
                _ => Err(LineError::InvalidRound(name)),
            },
            "speed" => match name.as_str() {
                "slow" => Ok(vec![Instruction::Speed {
                    speed: GameSpeed::Slow,
                }]),
                "fast" => Ok(vec![Instruction::Speed {
                    speed: GameSpeed::Fast,
                }]),
                _ => Err(LineError::InvalidSpeed(name)),
            },
            _ => Err(LineError::Unrecognized),
        }
    }

    fn key(&self, group: &str, entry: &str) -> Result<KeyCode, LineError> {
        let binds = &self.data.keybinds;
        let key = match group {
            "monkeys" => binds.monkey(entry),
            "path" => entry.parse().ok().and_then(|p| binds.path(p)),
            _ => binds.other(entry),
        };
        key.cloned()
            .ok_or_else(|| LineError::MissingKeybind(format!("{group}.{entry}")))
    }

    fn placed(&self, name: &str) -> Result<&MonkeyState, LineError> {
        let monkey = self
            .monkeys
            .get(name)
            .ok_or_else(|| LineError::Unplaced(name.to_string()))?;
        if monkey.sold {
            return Err(LineError::Sold(name.to_string()));
        }
        Ok(monkey)
    }

    fn place(&mut self, caps: &Captures<'_>, name: String) -> Result<Vec<Instruction>, LineError> {
        if self.monkeys.contains_key(&name) {
            return Err(LineError::DuplicateName(name));
        }
        let tower = caps.name("type").map_or("", |m| m.as_str());
        let position = position(caps).ok_or(LineError::MissingPosition)?;
        let discount = discount(caps);

        let (kind, key, cost) = if let Some(costs) = self.data.towers.monkeys.get(tower) {
            let purchase = Purchase::PlaceMonkey { tower, name: &name };
            (
                TowerKind::Monkey(tower.to_string()),
                self.key("monkeys", tower)?,
                self.pricing.price(costs.base, purchase, discount),
            )
        } else if let Some(costs) = self.data.towers.heroes.get(tower) {
            (
                TowerKind::Hero(tower.to_string()),
                self.key("monkeys", "hero")?,
                self.pricing.price(costs.base, Purchase::PlaceHero, discount),
            )
        } else {
            return Err(LineError::UnknownTower {
                name,
                tower: tower.to_string(),
            });
        };

        if kind.is_hero() {
            self.hero = Some(tower.to_string());
        }
        self.monkeys.insert(
            name.clone(),
            MonkeyState {
                name: name.clone(),
                tower: kind.clone(),
                position,
                upgrades: [0; 3],
                value: cost,
                sold: false,
            },
        );
        Ok(vec![Instruction::Place(PlaceStep {
            name,
            tower: kind,
            key,
            position,
            cost,
            discount,
            probe: None,
        })])
    }

    fn upgrade(&mut self, caps: &Captures<'_>, name: String) -> Result<Vec<Instruction>, LineError> {
        let path = caps
            .name("path")
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .ok_or(LineError::MissingPath)?;
        let monkey = self.placed(&name)?;
        let Some(tower) = monkey.tower.monkey_type() else {
            return Err(LineError::HeroUpgrade(name));
        };
        let costs = self
            .data
            .towers
            .monkeys
            .get(tower)
            .ok_or_else(|| LineError::UnknownTower {
                name: name.clone(),
                tower: tower.to_string(),
            })?;

        let mut levels = monkey.upgrades;
        levels[usize::from(path)] += 1;
        if !is_legal_upgrade(levels) {
            return Err(LineError::IllegalUpgrade {
                name,
                levels: format_upgrades(levels),
            });
        }
        let tier = levels[usize::from(path)];
        let base = costs.upgrades[usize::from(path)][usize::from(tier - 1)];
        let discount = discount(caps);
        let cost = self.pricing.price(base, Purchase::Upgrade, discount);
        let confirm = costs.requires_confirmation(path, tier);
        let position = monkey.position;
        let key = self.key("path", &path.to_string())?;

        if let Some(monkey) = self.monkeys.get_mut(&name) {
            monkey.upgrades = levels;
            monkey.value += cost;
        }

        let mut steps = vec![Instruction::Upgrade(UpgradeStep {
            name: name.clone(),
            path,
            key,
            position,
            cost,
            discount,
            probe: None,
        })];
        if confirm {
            steps.push(Instruction::Click {
                name: Some(name),
                position: self.click.paragon_message_confirmation,
            });
        }
        Ok(steps)
    }

    fn retarget(&self, caps: &Captures<'_>, name: String) -> Result<Vec<Instruction>, LineError> {
        let monkey = self.placed(&name)?;
        let to = position(caps);
        let is_mortar = monkey
            .tower
            .monkey_type()
            .is_some_and(|t| t == crate::constants::MORTAR_TYPE);
        if to.is_none() && is_mortar {
            return Err(LineError::MortarWithoutTarget(name));
        }
        Ok(vec![Instruction::Retarget(RetargetStep {
            key: self.key("others", "retarget")?,
            position: monkey.position,
            name,
            to,
        })])
    }

    fn special(&self, name: String) -> Result<Vec<Instruction>, LineError> {
        let monkey = self.placed(&name)?;
        Ok(vec![Instruction::Special(SpecialStep {
            key: self.key("others", "special")?,
            position: monkey.position,
            name,
        })])
    }

    fn sell(&mut self, name: String) -> Result<Vec<Instruction>, LineError> {
        let monkey = self.placed(&name)?;
        let step = SellStep {
            key: self.key("others", "sell")?,
            position: monkey.position,
            cost: -sell_value(monkey.value),
            name,
        };
        if let Some(monkey) = self.monkeys.get_mut(&step.name) {
            monkey.sold = true;
        }
        Ok(vec![Instruction::Sell(step)])
    }
}

fn position(caps: &Captures<'_>) -> Option<Point> {
    let x = caps.name("x")?.as_str().parse().ok()?;
    let y = caps.name("y")?.as_str().parse().ok()?;
    Some(Point::new(x, y))
}

fn discount(caps: &Captures<'_>) -> Option<u8> {
    caps.name("discount").and_then(|m| m.as_str().parse().ok())
}

fn remove(caps: &Captures<'_>) -> Result<Vec<Instruction>, LineError> {
    let cost = caps
        .name("price")
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(LineError::MissingObstaclePrice)?;
    let position = position(caps).ok_or(LineError::MissingPosition)?;
    Ok(vec![Instruction::RemoveObstacle { position, cost }])
}

/// Turns playthrough files into [`Playthrough`]s for one resolution and knowledge setting.
#[derive(Debug, Clone, Copy)]
pub struct PlaythroughParser<'a> {
    data: &'a GameData,
    click: &'a ClickAreas,
    resolution: Resolution,
    knowledge: KnowledgeModifiers,
}

impl<'a> PlaythroughParser<'a> {
    #[must_use]
    pub const fn new(
        data: &'a GameData,
        click: &'a ClickAreas,
        resolution: Resolution,
        knowledge: KnowledgeModifiers,
    ) -> Self {
        Self {
            data,
            click,
            resolution,
            knowledge,
        }
    }

    #[must_use]
    pub const fn data(&self) -> &'a GameData {
        self.data
    }

    #[must_use]
    pub const fn click_areas(&self) -> &'a ClickAreas {
        self.click
    }

    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads and parses `path`, played as `gamemode` or its native gamemode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, its name is not a playthrough
    /// name, or it names an unknown map.
    pub fn parse_file(
        &self,
        path: &Path,
        gamemode: Option<Gamemode>,
    ) -> Result<Playthrough, PlaythroughError> {
        let text = fs::read_to_string(path).map_err(|source| PlaythroughError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let key = path.to_string_lossy().replace('\\', "/");
        let mut playthrough = self.parse_text(&key, &text, gamemode)?;
        playthrough.path = Some(path.to_path_buf());
        Ok(playthrough)
    }

    /// Parses file contents; `key` is the file's path and supplies its identity.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a playthrough name or names an unknown map.
    pub fn parse_text(
        &self,
        key: &str,
        text: &str,
        gamemode: Option<Gamemode>,
    ) -> Result<Playthrough, PlaythroughError> {
        let descriptor = PlaythroughDescriptor::parse(key)?;
        let map = self
            .data
            .map(&descriptor.map)
            .ok_or_else(|| PlaythroughError::UnknownMap(descriptor.map.clone()))?;
        let gamemode = gamemode.unwrap_or(descriptor.gamemode);
        let difficulty = self
            .data
            .difficulty_of(gamemode)
            .ok_or(PlaythroughError::UnknownGamemode(gamemode))?;

        let rescaled;
        let body = if descriptor.resolution == self.resolution {
            text
        } else {
            rescaled = rescale_coordinate_pairs(text, descriptor.resolution, self.resolution);
            rescaled.as_str()
        };

        let mut steps = Vec::new();
        let mut extra_instructions = 0;
        if gamemode.has_start_dialog() {
            steps.push(Instruction::Click {
                name: None,
                position: self.click.gamemode_deflation_message_confirmation,
            });
            extra_instructions = 1;
        }

        let pricing = PricingModel::new(difficulty, gamemode, self.knowledge);
        let mut lines = LineParser::new(self.data, self.click, pricing);
        for (index, line) in body.lines().enumerate() {
            match lines.parse_line(line) {
                Ok(parsed) => steps.extend(parsed),
                Err(err) => warn!("{key}:{}: {err}; skipping {line:?}", index + 1),
            }
        }
        let (monkeys, hero) = lines.into_parts();

        Ok(Playthrough {
            key: key.to_string(),
            path: None,
            map: descriptor.map.clone(),
            category: map.category,
            page: map.page,
            slot: map.pos,
            difficulty,
            gamemode,
            hero,
            steps,
            monkeys,
            extra_instructions,
            descriptor: Some(descriptor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamemode::Difficulty;
    use crate::test_support::{fixture_areas, fixture_data};

    fn line_parser<'a>(data: &'a GameData, click: &'a ClickAreas) -> LineParser<'a> {
        LineParser::new(
            data,
            click,
            PricingModel::new(Difficulty::Medium, Gamemode::Medium, KnowledgeModifiers::NONE),
        )
    }

    #[test]
    fn place_and_upgrade_are_priced() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        let place = parser.parse_line("place dart dart0 at 500, 500").unwrap();
        assert_eq!(place.len(), 1);
        assert_eq!(place[0].cost(), data.towers.monkeys["dart"].base);
        let upgrade = parser.parse_line("upgrade dart0 path 1").unwrap();
        assert_eq!(upgrade[0].cost(), data.towers.monkeys["dart"].upgrades[1][0]);
        let monkey = &parser.monkeys()["dart0"];
        assert_eq!(monkey.upgrades, [0, 1, 0]);
        assert_eq!(monkey.value, place[0].cost() + upgrade[0].cost());
    }

    #[test]
    fn crosspath_violations_are_reverted() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        parser.parse_line("place dart dart0 at 10, 10").unwrap();
        for line in [
            "upgrade dart0 path 0",
            "upgrade dart0 path 0",
            "upgrade dart0 path 1",
            "upgrade dart0 path 1",
        ] {
            parser.parse_line(line).unwrap();
        }
        let err = parser.parse_line("upgrade dart0 path 0").unwrap_err();
        assert!(matches!(err, LineError::IllegalUpgrade { .. }));
        assert_eq!(parser.monkeys()["dart0"].upgrades, [2, 2, 0]);
        assert!(parser.parse_line("upgrade dart0 path 2").is_err());
    }

    #[test]
    fn tier_cap_is_five() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        parser.parse_line("place dart dart0 at 10, 10").unwrap();
        for _ in 0..5 {
            parser.parse_line("upgrade dart0 path 0").unwrap();
        }
        assert!(matches!(
            parser.parse_line("upgrade dart0 path 0"),
            Err(LineError::IllegalUpgrade { .. })
        ));
        assert_eq!(parser.monkeys()["dart0"].upgrades, [5, 0, 0]);
    }

    #[test]
    fn legality_rule_table() {
        assert!(is_legal_upgrade([5, 2, 0]));
        assert!(is_legal_upgrade([0, 2, 5]));
        assert!(is_legal_upgrade([3, 2, 0]));
        assert!(!is_legal_upgrade([3, 3, 0]));
        assert!(!is_legal_upgrade([1, 1, 1]));
        assert!(!is_legal_upgrade([6, 0, 0]));
    }

    #[test]
    fn confirmation_click_follows_flagged_upgrades() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        parser.parse_line("place super super0 at 10, 10").unwrap();
        for _ in 0..4 {
            assert_eq!(parser.parse_line("upgrade super0 path 0").unwrap().len(), 1);
        }
        let fifth = parser.parse_line("upgrade super0 path 0").unwrap();
        assert_eq!(fifth.len(), 2);
        assert_eq!(
            fifth[1],
            Instruction::Click {
                name: Some("super0".to_string()),
                position: areas.click.paragon_message_confirmation,
            }
        );
    }

    #[test]
    fn heroes_cannot_be_upgraded() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        let place = parser.parse_line("place quincy hero0 at 20, 20").unwrap();
        assert!(matches!(&place[0], Instruction::Place(step) if step.tower.is_hero()));
        assert_eq!(
            parser.parse_line("upgrade hero0 path 0"),
            Err(LineError::HeroUpgrade("hero0".to_string()))
        );
        let (_, hero) = parser.into_parts();
        assert_eq!(hero.as_deref(), Some("quincy"));
    }

    #[test]
    fn skipped_lines() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        parser.parse_line("place mortar mortar0 at 10, 10").unwrap();
        assert_eq!(
            parser.parse_line("place dart mortar0 at 10, 10"),
            Err(LineError::DuplicateName("mortar0".to_string()))
        );
        assert!(matches!(
            parser.parse_line("place banana x0 at 1, 1"),
            Err(LineError::UnknownTower { .. })
        ));
        assert_eq!(
            parser.parse_line("retarget mortar0"),
            Err(LineError::MortarWithoutTarget("mortar0".to_string()))
        );
        assert!(parser.parse_line("retarget mortar0 to 30, 40").is_ok());
        assert_eq!(
            parser.parse_line("remove obstacle at 1, 2 for ???"),
            Err(LineError::MissingObstaclePrice)
        );
        assert_eq!(
            parser.parse_line("round 0"),
            Err(LineError::InvalidRound("0".to_string()))
        );
        assert_eq!(
            parser.parse_line("special ghost0"),
            Err(LineError::Unplaced("ghost0".to_string()))
        );
        assert_eq!(parser.parse_line("dance"), Err(LineError::Unrecognized));
        assert_eq!(parser.parse_line("   "), Ok(Vec::new()));
    }

    #[test]
    fn sold_monkeys_are_retired() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = line_parser(&data, &areas.click);
        parser.parse_line("place dart dart0 at 10, 10").unwrap();
        let sell = parser.parse_line("sell dart0").unwrap();
        assert_eq!(sell[0].cost(), -sell_value(data.towers.monkeys["dart"].base));
        assert_eq!(
            parser.parse_line("upgrade dart0 path 0"),
            Err(LineError::Sold("dart0".to_string()))
        );
    }

    #[test]
    fn start_dialog_click_is_prepended() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let parser = PlaythroughParser::new(
            &data,
            &areas.click,
            Resolution::new(2560, 1440),
            KnowledgeModifiers::NONE,
        );
        let text = "place dart dart0 at 500, 500\nround 3\n";
        let chimps = parser
            .parse_text("playthroughs/logs#chimps#2560x1440#noMK.btd6", text, None)
            .unwrap();
        assert_eq!(chimps.extra_instructions, 1);
        assert_eq!(chimps.steps.len(), 3);
        assert!(matches!(chimps.steps[0], Instruction::Click { name: None, .. }));
        assert_eq!(chimps.difficulty, Difficulty::Hard);

        let easy = parser
            .parse_text("playthroughs/logs#chimps#2560x1440#noMK.btd6", text, Some(Gamemode::Easy))
            .unwrap();
        assert_eq!(easy.extra_instructions, 0);
        assert_eq!(easy.steps.len(), 2);
        assert_eq!(easy.difficulty, Difficulty::Easy);
    }

    #[test]
    fn coordinates_rescale_to_active_resolution() {
        let data = fixture_data();
        let areas = data.areas_for(Resolution::new(1920, 1080)).unwrap();
        let parser = PlaythroughParser::new(
            &data,
            &areas.click,
            Resolution::new(1920, 1080),
            KnowledgeModifiers::NONE,
        );
        let playthrough = parser
            .parse_text(
                "logs#medium#2560x1440.btd6",
                "place dart dart0 at 500, 500\n",
                None,
            )
            .unwrap();
        assert_eq!(playthrough.monkeys["dart0"].position, Point::new(375, 375));
    }

    #[test]
    fn unknown_map_fails_whole_file() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let parser = PlaythroughParser::new(
            &data,
            &areas.click,
            Resolution::new(2560, 1440),
            KnowledgeModifiers::NONE,
        );
        assert!(matches!(
            parser.parse_text("atlantis#easy#2560x1440.btd6", "", None),
            Err(PlaythroughError::UnknownMap(_))
        ));
    }
}
