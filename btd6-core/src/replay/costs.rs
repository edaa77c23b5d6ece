//! Measuring tower prices in a sandbox game.
//!
//! A probe playthrough places every monkey once per upgrade path, buys all five
//! tiers and sells it again. Each purchase carries a [`CostProbe`]; the driver
//! reports the balance drop it caused and [`ObservedCosts::apply`] folds the
//! readings into an updated tower table.

use super::ReplayError;
use crate::data::{ClickAreas, GameData, TestPosition, Towers};
use crate::gamemode::{Difficulty, Gamemode};
use crate::instructions::{CostProbe, Instruction, Playthrough, PlaythroughError, ProbeGroup};
use crate::instructions::parser::LineParser;
use crate::pricing::{KnowledgeModifiers, PricingModel};
use log::debug;
use std::collections::BTreeMap;

const PROBE_GAMEMODE: Gamemode = Gamemode::MediumSandbox;

/// Prices read off the balance while probing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedCosts {
    prices: BTreeMap<CostProbe, i64>,
}

impl ObservedCosts {
    /// Stores the balance drop caused by the probed purchase; non-positive drops are noise.
    pub fn record(&mut self, probe: &CostProbe, observed: i64) {
        if observed <= 0 {
            debug!("ignoring price reading {observed} for {}", probe.tower);
            return;
        }
        self.prices.insert(probe.clone(), observed);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn get(&self, group: ProbeGroup, tower: &str, upgrade: Option<(u8, u8)>) -> Option<i64> {
        self.prices
            .get(&CostProbe {
                group,
                tower: tower.to_string(),
                upgrade,
            })
            .copied()
    }

    /// `towers` with every observed price that differs applied, plus one line per change.
    #[must_use]
    pub fn apply(&self, towers: &Towers) -> (Towers, Vec<String>) {
        let mut updated = towers.clone();
        let mut changes = Vec::new();

        for (tower, costs) in &mut updated.monkeys {
            if let Some(base) = self.get(ProbeGroup::Monkeys, tower, None)
                && base != costs.base
            {
                changes.push(format!("{tower} base {} -> {base}", costs.base));
                costs.base = base;
            }
            for path in 0..3u8 {
                for tier in 1..=5u8 {
                    let price = &mut costs.upgrades[usize::from(path)][usize::from(tier - 1)];
                    if let Some(observed) = self.get(ProbeGroup::Monkeys, tower, Some((path, tier)))
                        && observed != *price
                    {
                        changes.push(format!(
                            "{tower} path {} tier {tier} {price} -> {observed}",
                            path + 1
                        ));
                        *price = observed;
                    }
                }
            }
        }

        for (hero, costs) in &mut updated.heroes {
            if let Some(base) = self.get(ProbeGroup::Heroes, hero, None)
                && base != costs.base
            {
                changes.push(format!("hero {hero} base {} -> {base}", costs.base));
                costs.base = base;
            }
        }
        (updated, changes)
    }
}

fn probe_parser<'a>(data: &'a GameData, click: &'a ClickAreas) -> LineParser<'a> {
    LineParser::new(
        data,
        click,
        PricingModel::new(Difficulty::Medium, PROBE_GAMEMODE, KnowledgeModifiers::NONE),
    )
}

fn parse_probed(
    parser: &mut LineParser<'_>,
    line: &str,
    probe: Option<CostProbe>,
) -> Result<Vec<Instruction>, ReplayError> {
    let mut steps = parser
        .parse_line(line)
        .map_err(|err| ReplayError::InvalidArguments(format!("cost probe {line:?}: {err}")))?;
    if let Some(first) = steps.first_mut() {
        match first {
            Instruction::Place(step) => step.probe = probe,
            Instruction::Upgrade(step) => step.probe = probe,
            _ => {}
        }
    }
    Ok(steps)
}

fn probe_playthrough(
    data: &GameData,
    click: &ClickAreas,
    map_key: &str,
    label: &str,
    parser: LineParser<'_>,
    mut steps: Vec<Instruction>,
) -> Result<Playthrough, ReplayError> {
    let map = data
        .map(map_key)
        .ok_or_else(|| PlaythroughError::UnknownMap(map_key.to_string()))?;
    steps.insert(
        0,
        Instruction::Click {
            name: None,
            position: click.gamemode_deflation_message_confirmation,
        },
    );
    let (monkeys, hero) = parser.into_parts();
    Ok(Playthrough {
        key: format!("costs/{label}@{map_key}"),
        path: None,
        descriptor: None,
        map: map_key.to_string(),
        category: map.category,
        page: map.page,
        slot: map.pos,
        difficulty: Difficulty::Medium,
        gamemode: PROBE_GAMEMODE,
        hero,
        steps,
        monkeys,
        extra_instructions: 1,
    })
}

/// Places, fully upgrades and sells every monkey once per path on `map_key`.
///
/// # Errors
///
/// Returns an error if the map is unknown or a keybind needed for probing is missing.
pub fn monkey_probe_playthrough(
    data: &GameData,
    click: &ClickAreas,
    map_key: &str,
    positions: TestPosition,
) -> Result<Playthrough, ReplayError> {
    let mut parser = probe_parser(data, click);
    let mut steps = Vec::new();
    for (tower, costs) in &data.towers.monkeys {
        let at = positions.for_class(costs.class);
        for path in 0..3u8 {
            let name = format!("{tower}{path}");
            let probe = |upgrade| CostProbe {
                group: ProbeGroup::Monkeys,
                tower: tower.clone(),
                upgrade,
            };
            steps.extend(parse_probed(
                &mut parser,
                &format!("place {tower} {name} at {at}"),
                Some(probe(None)),
            )?);
            for tier in 1..=5u8 {
                steps.extend(parse_probed(
                    &mut parser,
                    &format!("upgrade {name} path {path}"),
                    Some(probe(Some((path, tier)))),
                )?);
            }
            steps.extend(parse_probed(&mut parser, &format!("sell {name}"), None)?);
        }
    }
    probe_playthrough(data, click, map_key, "monkeys", parser, steps)
}

/// Places `hero` once on `map_key`; the hero must be selected beforehand.
///
/// # Errors
///
/// Returns an error if the hero or map is unknown or the hero keybind is missing.
pub fn hero_probe_playthrough(
    data: &GameData,
    click: &ClickAreas,
    map_key: &str,
    positions: TestPosition,
    hero: &str,
) -> Result<Playthrough, ReplayError> {
    let costs = data
        .towers
        .heroes
        .get(hero)
        .ok_or_else(|| ReplayError::NotFound(format!("hero {hero}")))?;
    let at = positions.for_class(costs.class);
    let mut parser = probe_parser(data, click);
    let steps = parse_probed(
        &mut parser,
        &format!("place {hero} hero0 at {at}"),
        Some(CostProbe {
            group: ProbeGroup::Heroes,
            tower: hero.to_string(),
            upgrade: None,
        }),
    )?;
    probe_playthrough(data, click, map_key, hero, parser, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::test_support::{fixture_areas, fixture_data};

    fn probe(tower: &str, upgrade: Option<(u8, u8)>) -> CostProbe {
        CostProbe {
            group: ProbeGroup::Monkeys,
            tower: tower.to_string(),
            upgrade,
        }
    }

    fn spots() -> TestPosition {
        TestPosition {
            land: Point::new(1000, 700),
            water: Point::new(1400, 900),
        }
    }

    #[test]
    fn changed_prices_are_applied_and_reported() {
        let data = fixture_data();
        let mut observed = ObservedCosts::default();
        observed.record(&probe("dart", None), 215);
        observed.record(&probe("dart", Some((0, 3))), 300);
        observed.record(&probe("dart", Some((2, 1))), 95);
        observed.record(&probe("dart", Some((1, 1))), 0);

        let (towers, changes) = observed.apply(&data.towers);
        assert_eq!(towers.monkeys["dart"].base, 215);
        assert_eq!(towers.monkeys["dart"].upgrades[2][0], 95);
        assert_eq!(towers.monkeys["dart"].upgrades[1][0], 100);
        assert_eq!(
            changes,
            vec![
                "dart base 200 -> 215".to_string(),
                "dart path 3 tier 1 90 -> 95".to_string(),
            ]
        );
    }

    #[test]
    fn nothing_observed_changes_nothing() {
        let data = fixture_data();
        let (towers, changes) = ObservedCosts::default().apply(&data.towers);
        assert_eq!(towers, data.towers);
        assert!(changes.is_empty());
    }

    #[test]
    fn monkey_probe_buys_every_tier_with_a_probe() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let playthrough = monkey_probe_playthrough(&data, &areas.click, "logs", spots()).unwrap();

        assert_eq!(playthrough.gamemode, Gamemode::MediumSandbox);
        assert_eq!(playthrough.extra_instructions, 1);
        assert!(matches!(playthrough.steps[0], Instruction::Click { name: None, .. }));
        let probes = playthrough
            .steps
            .iter()
            .filter(|step| step.probe().is_some())
            .count();
        assert_eq!(probes, data.towers.monkeys.len() * 3 * 6);
        let sells = playthrough
            .steps
            .iter()
            .filter(|step| matches!(step, Instruction::Sell(_)))
            .count();
        assert_eq!(sells, data.towers.monkeys.len() * 3);
        assert_eq!(
            playthrough.steps[1].probe(),
            Some(&probe(data.towers.monkeys.keys().next().unwrap(), None))
        );
    }

    #[test]
    fn hero_probe_places_the_hero() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let playthrough =
            hero_probe_playthrough(&data, &areas.click, "logs", spots(), "quincy").unwrap();
        assert_eq!(playthrough.hero.as_deref(), Some("quincy"));
        assert_eq!(playthrough.steps.len(), 2);
        assert_eq!(
            playthrough.steps[1].probe().map(|p| p.group),
            Some(ProbeGroup::Heroes)
        );
        assert!(hero_probe_playthrough(&data, &areas.click, "logs", spots(), "nobody").is_err());
    }
}
