//! Reward tables and efficiency ranking.

use super::{Catalog, CatalogEntry};
use crate::data::GameData;
use crate::descriptor::Flag;
use crate::gamemode::{CashGroup, Gamemode, MapCategory};
use crate::stats::{PlaythroughLog, PlaythroughStats};

// XP segments: (first round, length, base xp, increment per round)
const XP_SEGMENTS: [(i64, i64, i64, i64); 3] = [
    (0, 21, 0, 20),
    (21, 30, 21 * 20, 40),
    (51, 50, 21 * 20 + 30 * 40, 90),
];

/// Cumulative base XP for every round up to and including `round`.
#[must_use]
pub fn round_total_base_xp(round: i64) -> i64 {
    XP_SEGMENTS
        .iter()
        .map(|&(start, length, base, inc)| {
            let count = (round - start + 1).clamp(0, length);
            base * count + inc * (count * (count + 1) / 2)
        })
        .sum()
}

const fn round_window(gamemode: Gamemode) -> (i64, i64) {
    use Gamemode::*;
    match gamemode {
        Easy | PrimaryOnly => (0, 40),
        Medium | MilitaryOnly | Reverse | Apopalypse => (0, 60),
        Hard | MagicMonkeysOnly | DoubleHpMoabs | HalfCash | AlternateBloonsRounds => (2, 80),
        Impoppable | Chimps => (5, 100),
        Deflation => (30, 60),
        EasySandbox | MediumSandbox | HardSandbox => (0, 0),
    }
}

/// XP paid for winning `gamemode` on a map of `category`.
#[must_use]
pub fn playthrough_xp(gamemode: Gamemode, category: MapCategory) -> i64 {
    let (first, last) = round_window(gamemode);
    let total = round_total_base_xp(last) - round_total_base_xp(first);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let xp = (total as f64 * category.xp_multiplier()) as i64;
    xp
}

/// Monkey money paid for winning `gamemode` on a map of `category`.
#[must_use]
pub fn playthrough_monkey_money(data: &GameData, gamemode: Gamemode, category: MapCategory) -> i64 {
    let Some(info) = data.gamemodes.get(&gamemode) else {
        return 0;
    };
    let column = match category {
        MapCategory::Beginner => 0,
        MapCategory::Intermediate => 1,
        MapCategory::Advanced => 2,
        MapCategory::Expert => 3,
    };
    let row: [i64; 4] = match info.cash_group {
        CashGroup::Easy => [15, 30, 45, 60],
        CashGroup::Medium => [25, 50, 75, 100],
        CashGroup::Hard => [40, 80, 120, 160],
        CashGroup::Impoppable => [60, 120, 180, 240],
    };
    row[column]
}

#[allow(clippy::cast_precision_loss)]
fn per_hour(stats: &PlaythroughStats, entry: &CatalogEntry, reward: i64) -> f64 {
    stats
        .average_win_time(&entry.key, entry.gamemode)
        .filter(|avg| *avg > 0.0)
        .map_or(0.0, |avg| 3600.0 / avg * reward as f64)
}

fn category_of(data: &GameData, entry: &CatalogEntry) -> Option<MapCategory> {
    data.map(entry.map()).map(|map| map.category)
}

#[must_use]
pub fn xp_per_hour(data: &GameData, stats: &PlaythroughStats, entry: &CatalogEntry) -> f64 {
    category_of(data, entry).map_or(0.0, |category| {
        per_hour(stats, entry, playthrough_xp(entry.gamemode, category))
    })
}

#[must_use]
pub fn monkey_money_per_hour(data: &GameData, stats: &PlaythroughStats, entry: &CatalogEntry) -> f64 {
    category_of(data, entry).map_or(0.0, |category| {
        per_hour(
            stats,
            entry,
            playthrough_monkey_money(data, entry.gamemode, category),
        )
    })
}

/// A catalog entry with its computed efficiency.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub entry: CatalogEntry,
    pub value: f64,
}

fn rank_by<F>(catalog: &Catalog, gain: F) -> Vec<RankedEntry>
where
    F: Fn(&CatalogEntry) -> f64,
{
    let mut ranked: Vec<RankedEntry> = catalog
        .entries()
        .map(|entry| RankedEntry {
            value: gain(entry),
            entry: entry.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked
}

/// Entries sorted by XP per hour, best first; entries without wins rank last.
#[must_use]
pub fn rank_by_xp(catalog: &Catalog, data: &GameData, stats: &PlaythroughStats) -> Vec<RankedEntry> {
    rank_by(catalog, |entry| xp_per_hour(data, stats, entry))
}

/// Entries sorted by monkey money per hour, best first.
#[must_use]
pub fn rank_by_monkey_money(
    catalog: &Catalog,
    data: &GameData,
    stats: &PlaythroughStats,
) -> Vec<RankedEntry> {
    rank_by(catalog, |entry| monkey_money_per_hour(data, stats, entry))
}

#[derive(Default)]
struct Champion<'a> {
    entry: Option<&'a CatalogEntry>,
    value: u32,
    time: Option<f64>,
}

impl<'a> Champion<'a> {
    fn consider(&mut self, entry: &'a CatalogEntry, value: u32, time: Option<f64>, prefer_no_mk: bool) {
        let candidate_no_mk = entry.has_flag(Flag::NoMonkeyKnowledge);
        let replace = match self.entry {
            None => value > self.value,
            Some(_) if value > self.value => true,
            Some(current) => {
                let current_no_mk = current.has_flag(Flag::NoMonkeyKnowledge);
                if prefer_no_mk && !current_no_mk && candidate_no_mk {
                    true
                } else {
                    let mk_compatible =
                        !prefer_no_mk || current_no_mk == candidate_no_mk || candidate_no_mk;
                    mk_compatible
                        && value == self.value
                        && time.is_some_and(|t| self.time.is_none_or(|best| t < best))
                }
            }
        };
        if replace {
            self.entry = Some(entry);
            self.value = value;
            self.time = time;
        }
    }
}

/// Most valuable entry for `map`.
///
/// Entries that lost during this session are only used when nothing else is
/// left. `noMK` files are preferred when `prefer_no_mk` is set; at equal value
/// the faster average win time wins.
#[must_use]
pub fn highest_value<'a>(
    catalog: &'a Catalog,
    map: &str,
    data: &GameData,
    stats: &PlaythroughStats,
    log: &PlaythroughLog,
    prefer_no_mk: bool,
) -> Option<&'a CatalogEntry> {
    let modes = catalog.for_map(map)?;
    let mut clean = Champion::default();
    let mut defeated = Champion::default();
    for entry in modes.values().flatten() {
        let value = data.gamemode_value(entry.gamemode);
        let time = stats.average_win_time(&entry.key, entry.gamemode);
        if log.had_defeats(&entry.key, entry.gamemode) {
            defeated.consider(entry, value, time, prefer_no_mk);
        } else {
            clean.consider(entry, value, time, prefer_no_mk);
        }
    }
    clean.entry.or(defeated.entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PlaythroughDescriptor;
    use crate::geometry::Resolution;
    use crate::stats::Outcome;
    use crate::test_support::fixture_data;
    use std::path::PathBuf;
    use std::time::Duration;

    const QHD: Resolution = Resolution::new(2560, 1440);

    fn entry(name: &str, gamemode: Gamemode) -> CatalogEntry {
        let descriptor = PlaythroughDescriptor::parse(name).unwrap();
        CatalogEntry {
            key: name.to_string(),
            path: PathBuf::from(name),
            is_original: descriptor.gamemode == gamemode,
            descriptor,
            gamemode,
            hero: None,
        }
    }

    fn win(stats: &mut PlaythroughStats, key: &str, gamemode: Gamemode, secs: u64) {
        stats.record_attempt(key, QHD, gamemode, Outcome::Win, Duration::from_secs(secs), 1.0);
    }

    #[test]
    fn base_xp_segments() {
        assert_eq!(round_total_base_xp(-1), 0);
        assert_eq!(round_total_base_xp(0), 20);
        // 21 rounds of the first segment: 20 * (21 * 22 / 2)
        assert_eq!(round_total_base_xp(20), 4620);
        assert_eq!(round_total_base_xp(21), 4620 + 420 + 40);
    }

    #[test]
    fn xp_windows_and_multipliers() {
        let easy = round_total_base_xp(40) - round_total_base_xp(0);
        assert_eq!(playthrough_xp(Gamemode::Easy, MapCategory::Beginner), easy);
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let expert = (easy as f64 * 1.3) as i64;
        assert_eq!(playthrough_xp(Gamemode::PrimaryOnly, MapCategory::Expert), expert);
        assert_eq!(playthrough_xp(Gamemode::EasySandbox, MapCategory::Expert), 0);
        assert!(
            playthrough_xp(Gamemode::Chimps, MapCategory::Beginner)
                > playthrough_xp(Gamemode::Hard, MapCategory::Beginner)
        );
    }

    #[test]
    fn monkey_money_by_cash_group() {
        let data = fixture_data();
        assert_eq!(
            playthrough_monkey_money(&data, Gamemode::Easy, MapCategory::Beginner),
            15
        );
        assert_eq!(
            playthrough_monkey_money(&data, Gamemode::Chimps, MapCategory::Expert),
            240
        );
        assert_eq!(
            playthrough_monkey_money(&data, Gamemode::HardSandbox, MapCategory::Expert),
            0
        );
    }

    #[test]
    fn ranking_puts_unplayed_last() {
        let data = fixture_data();
        let mut stats = PlaythroughStats::default();
        let mut catalog = Catalog::default();
        let fast = entry("logs#easy#2560x1440#noMK.btd6", Gamemode::Easy);
        let slow = entry("logs#medium#2560x1440#noMK.btd6", Gamemode::Easy);
        let unplayed = entry("logs#hard#2560x1440#noMK.btd6", Gamemode::Easy);
        for e in [&unplayed, &slow, &fast] {
            catalog.insert(e.clone());
        }
        win(&mut stats, &fast.key, Gamemode::Easy, 300);
        win(&mut stats, &slow.key, Gamemode::Easy, 600);

        let ranked = rank_by_monkey_money(&catalog, &data, &stats);
        let keys: Vec<&str> = ranked.iter().map(|r| r.entry.key.as_str()).collect();
        assert_eq!(keys, vec![fast.key.as_str(), slow.key.as_str(), unplayed.key.as_str()]);
        assert!((ranked[0].value - 3600.0 / 300.0 * 15.0).abs() < 1e-9);
        assert!(ranked[2].value.abs() < f64::EPSILON);
    }

    #[test]
    fn highest_value_prefers_clean_runs() {
        let data = fixture_data();
        let stats = PlaythroughStats::default();
        let mut catalog = Catalog::default();
        let chimps = entry("logs#chimps#2560x1440#noMK.btd6", Gamemode::Chimps);
        let hard = entry("logs#chimps#2560x1440#noMK.btd6", Gamemode::Hard);
        catalog.insert(chimps.clone());
        catalog.insert(hard.clone());

        let mut log = PlaythroughLog::default();
        let best = highest_value(&catalog, "logs", &data, &stats, &log, true).unwrap();
        assert_eq!(best.gamemode, Gamemode::Chimps);

        log.record(&chimps.key, Gamemode::Chimps, Outcome::Defeat);
        let best = highest_value(&catalog, "logs", &data, &stats, &log, true).unwrap();
        assert_eq!(best.gamemode, Gamemode::Hard);

        log.record(&hard.key, Gamemode::Hard, Outcome::Defeat);
        let best = highest_value(&catalog, "logs", &data, &stats, &log, true).unwrap();
        assert_eq!(best.gamemode, Gamemode::Chimps);
        assert!(highest_value(&catalog, "cubism", &data, &stats, &log, true).is_none());
    }

    #[test]
    fn highest_value_prefers_no_mk_then_speed() {
        let data = fixture_data();
        let mut stats = PlaythroughStats::default();
        let log = PlaythroughLog::default();
        let mk = entry("logs#hard#2560x1440.btd6", Gamemode::Hard);
        let no_mk_slow = entry("logs#hard#2560x1440#noMK.btd6", Gamemode::Hard);
        let no_mk_fast = entry("logs#hard#2560x1440#noMK#gB.btd6", Gamemode::Hard);
        let mut catalog = Catalog::default();
        for e in [&mk, &no_mk_slow, &no_mk_fast] {
            catalog.insert(e.clone());
        }
        win(&mut stats, &no_mk_slow.key, Gamemode::Hard, 900);
        win(&mut stats, &no_mk_fast.key, Gamemode::Hard, 600);

        let best = highest_value(&catalog, "logs", &data, &stats, &log, true).unwrap();
        assert_eq!(best.key, no_mk_fast.key);

        let mut catalog = Catalog::default();
        catalog.insert(mk.clone());
        catalog.insert(no_mk_slow.clone());
        let best = highest_value(&catalog, "logs", &data, &stats, &log, false).unwrap();
        assert_eq!(best.key, no_mk_slow.key);
        let best = highest_value(&catalog, "logs", &data, &stats, &log, true).unwrap();
        assert_eq!(best.key, no_mk_slow.key);
    }
}
