//! Attempt outcomes, win times and validation verdicts.
//!
//! The persisted layout is `file -> resolution -> {validation_result, gamemode -> counters}`
//! with an optional game `version` next to the resolutions of each file.

use crate::Persistence;
use crate::gamemode::Gamemode;
use crate::geometry::Resolution;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

static RESOLUTION_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+x\d+").expect("resolution key regex"));

/// Terminal result of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Defeat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamemodeStats {
    pub attempts: u32,
    pub wins: u32,
    /// Seconds of unpaused play for every win.
    pub win_times: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredResolutionStats")]
pub struct ResolutionStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<bool>,
    #[serde(flatten)]
    pub gamemodes: BTreeMap<Gamemode, GamemodeStats>,
}

/// On-disk form of [`ResolutionStats`]; keys naming no known gamemode are dropped.
#[derive(Deserialize)]
struct StoredResolutionStats {
    #[serde(default)]
    validation_result: Option<bool>,
    #[serde(flatten)]
    entries: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<StoredResolutionStats> for ResolutionStats {
    type Error = serde_json::Error;

    fn try_from(stored: StoredResolutionStats) -> Result<Self, Self::Error> {
        let mut gamemodes = BTreeMap::new();
        for (key, value) in stored.entries {
            let Ok(gamemode) = key.parse::<Gamemode>() else {
                debug!("ignoring stats for unknown gamemode {key:?}");
                continue;
            };
            gamemodes.insert(gamemode, serde_json::from_value(value)?);
        }
        Ok(Self {
            validation_result: stored.validation_result,
            gamemodes,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    /// Game version of the most recent win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
    #[serde(flatten)]
    pub resolutions: BTreeMap<String, ResolutionStats>,
}

/// Everything recorded about every playthrough file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaythroughStats {
    pub files: BTreeMap<String, FileStats>,
}

impl PlaythroughStats {
    fn entry(&mut self, file: &str, resolution: Resolution) -> &mut ResolutionStats {
        self.files
            .entry(file.to_string())
            .or_default()
            .resolutions
            .entry(resolution.to_string())
            .or_default()
    }

    /// Counts one finished game; wins also record their duration and the game version.
    pub fn record_attempt(
        &mut self,
        file: &str,
        resolution: Resolution,
        gamemode: Gamemode,
        outcome: Outcome,
        elapsed: Duration,
        version: f64,
    ) {
        let counters = self
            .entry(file, resolution)
            .gamemodes
            .entry(gamemode)
            .or_default();
        counters.attempts += 1;
        if outcome == Outcome::Win {
            counters.wins += 1;
            counters.win_times.push(elapsed.as_secs_f64());
            if let Some(stats) = self.files.get_mut(file) {
                stats.version = Some(version);
            }
        }
    }

    pub fn set_validation(&mut self, file: &str, resolution: Resolution, result: bool) {
        self.entry(file, resolution).validation_result = Some(result);
    }

    #[must_use]
    pub fn validation_result(&self, file: &str, resolution: Resolution) -> Option<bool> {
        self.files
            .get(file)?
            .resolutions
            .get(&resolution.to_string())?
            .validation_result
    }

    #[must_use]
    pub fn gamemode_stats(
        &self,
        file: &str,
        resolution: Resolution,
        gamemode: Gamemode,
    ) -> Option<&GamemodeStats> {
        self.files
            .get(file)?
            .resolutions
            .get(&resolution.to_string())?
            .gamemodes
            .get(&gamemode)
    }

    /// Mean win time over every recorded resolution, or `None` without wins.
    #[must_use]
    pub fn average_win_time(&self, file: &str, gamemode: Gamemode) -> Option<f64> {
        let stats = self.files.get(file)?;
        let times: Vec<f64> = stats
            .resolutions
            .iter()
            .filter(|(key, _)| RESOLUTION_KEY.is_match(key))
            .filter_map(|(_, entry)| entry.gamemodes.get(&gamemode))
            .flat_map(|counters| counters.win_times.iter().copied())
            .collect();
        if times.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = times.len() as f64;
        Some(times.iter().sum::<f64>() / count)
    }
}

/// Accumulates unpaused play time from start/stop marks.
///
/// A start while already running and a stop while stopped are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeLog {
    running_since: Option<Duration>,
    total: Duration,
}

impl TimeLog {
    pub fn start(&mut self, at: Duration) {
        if self.running_since.is_none() {
            self.running_since = Some(at);
        }
    }

    pub fn stop(&mut self, at: Duration) {
        if let Some(since) = self.running_since.take() {
            self.total += at.saturating_sub(since);
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Sum of closed start/stop intervals.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }
}

/// Stats store bound to the current resolution and game version, persisted after every change.
#[derive(Debug, Clone)]
pub struct StatsRecorder {
    stats: PlaythroughStats,
    resolution: Resolution,
    version: f64,
}

impl StatsRecorder {
    #[must_use]
    pub const fn new(stats: PlaythroughStats, resolution: Resolution, version: f64) -> Self {
        Self {
            stats,
            resolution,
            version,
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &PlaythroughStats {
        &self.stats
    }

    /// Records a finished game and writes the whole store.
    ///
    /// # Errors
    ///
    /// Returns the persistence error if the store cannot be written.
    pub fn record_attempt<P: Persistence>(
        &mut self,
        store: &P,
        file: &str,
        gamemode: Gamemode,
        outcome: Outcome,
        elapsed: Duration,
    ) -> Result<(), P::Error> {
        self.stats
            .record_attempt(file, self.resolution, gamemode, outcome, elapsed, self.version);
        log::debug!("recorded {outcome:?} for {file} ({gamemode})");
        store.save_stats(&self.stats)
    }

    /// Stores a validation verdict and writes the whole store.
    ///
    /// # Errors
    ///
    /// Returns the persistence error if the store cannot be written.
    pub fn set_validation<P: Persistence>(
        &mut self,
        store: &P,
        file: &str,
        result: bool,
    ) -> Result<(), P::Error> {
        self.stats.set_validation(file, self.resolution, result);
        store.save_stats(&self.stats)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub attempts: u32,
    pub wins: u32,
    pub defeats: u32,
}

/// Outcomes of the current session only, per file and gamemode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaythroughLog {
    entries: BTreeMap<String, BTreeMap<Gamemode, LogEntry>>,
}

impl PlaythroughLog {
    pub fn record(&mut self, file: &str, gamemode: Gamemode, outcome: Outcome) {
        let entry = self
            .entries
            .entry(file.to_string())
            .or_default()
            .entry(gamemode)
            .or_default();
        entry.attempts += 1;
        match outcome {
            Outcome::Win => entry.wins += 1,
            Outcome::Defeat => entry.defeats += 1,
        }
    }

    #[must_use]
    pub fn entry(&self, file: &str, gamemode: Gamemode) -> Option<LogEntry> {
        self.entries.get(file)?.get(&gamemode).copied()
    }

    #[must_use]
    pub fn had_defeats(&self, file: &str, gamemode: Gamemode) -> bool {
        self.entry(file, gamemode).is_some_and(|e| e.defeats > 0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Gamemode, LogEntry)> {
        self.entries.iter().flat_map(|(file, modes)| {
            modes
                .iter()
                .map(move |(gamemode, entry)| (file.as_str(), *gamemode, *entry))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "playthroughs/logs#chimps#2560x1440#noMK.btd6";
    const QHD: Resolution = Resolution::new(2560, 1440);
    const FHD: Resolution = Resolution::new(1920, 1080);

    #[test]
    fn attempts_accumulate_across_outcomes() {
        let mut stats = PlaythroughStats::default();
        stats.record_attempt(FILE, QHD, Gamemode::Chimps, Outcome::Defeat, Duration::ZERO, 45.1);
        assert!(stats.files[FILE].version.is_none());
        stats.record_attempt(FILE, QHD, Gamemode::Chimps, Outcome::Win, Duration::from_secs(50), 45.1);
        let counters = stats.gamemode_stats(FILE, QHD, Gamemode::Chimps).unwrap();
        assert_eq!(counters.attempts, 2);
        assert_eq!(counters.wins, 1);
        assert_eq!(counters.win_times, vec![50.0]);
        assert_eq!(stats.files[FILE].version, Some(45.1));
        assert_eq!(stats.validation_result(FILE, QHD), None);
    }

    #[test]
    fn average_spans_resolutions() {
        let mut stats = PlaythroughStats::default();
        stats.record_attempt(FILE, QHD, Gamemode::Chimps, Outcome::Win, Duration::from_secs(50), 1.0);
        stats.record_attempt(FILE, FHD, Gamemode::Chimps, Outcome::Win, Duration::from_secs(70), 1.0);
        assert_eq!(stats.average_win_time(FILE, Gamemode::Chimps), Some(60.0));
        assert_eq!(stats.average_win_time(FILE, Gamemode::Hard), None);
        assert_eq!(stats.average_win_time("missing.btd6", Gamemode::Chimps), None);
    }

    #[test]
    fn persisted_layout_nests_gamemodes_beside_validation() {
        let mut stats = PlaythroughStats::default();
        stats.set_validation(FILE, QHD, true);
        stats.record_attempt(FILE, QHD, Gamemode::Hard, Outcome::Win, Duration::from_secs(3), 2.0);
        let json = serde_json::to_value(&stats).unwrap();
        let entry = &json[FILE]["2560x1440"];
        assert_eq!(entry["validation_result"], true);
        assert_eq!(entry["hard"]["attempts"], 1);
        assert_eq!(json[FILE]["version"], 2.0);

        let back: PlaythroughStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }

    #[test]
    fn stats_from_newer_versions_keep_known_gamemodes() {
        let json = serde_json::json!({
            FILE: {
                "version": 46.0,
                "2560x1440": {
                    "validation_result": true,
                    "hard": {"attempts": 3, "wins": 2, "win_times": [40.0, 44.0]},
                    "legends": {"attempts": 1, "wins": 0, "win_times": []}
                }
            }
        });
        let stats: PlaythroughStats = serde_json::from_value(json).unwrap();
        assert_eq!(stats.validation_result(FILE, QHD), Some(true));
        assert_eq!(stats.gamemode_stats(FILE, QHD, Gamemode::Hard).unwrap().wins, 2);
        assert_eq!(stats.files[FILE].resolutions["2560x1440"].gamemodes.len(), 1);
    }

    #[test]
    fn malformed_counters_of_a_known_gamemode_are_rejected() {
        let json = serde_json::json!({
            FILE: {"2560x1440": {"hard": {"attempts": "many"}}}
        });
        assert!(serde_json::from_value::<PlaythroughStats>(json).is_err());
    }

    #[test]
    fn time_log_ignores_unbalanced_marks() {
        let mut log = TimeLog::default();
        log.start(Duration::from_secs(10));
        log.start(Duration::from_secs(12));
        log.stop(Duration::from_secs(20));
        log.stop(Duration::from_secs(25));
        log.start(Duration::from_secs(30));
        assert!(log.is_running());
        log.stop(Duration::from_secs(35));
        assert_eq!(log.total(), Duration::from_secs(15));
    }

    #[test]
    fn session_log_tracks_defeats() {
        let mut log = PlaythroughLog::default();
        log.record(FILE, Gamemode::Chimps, Outcome::Win);
        assert!(!log.had_defeats(FILE, Gamemode::Chimps));
        log.record(FILE, Gamemode::Chimps, Outcome::Defeat);
        assert!(log.had_defeats(FILE, Gamemode::Chimps));
        assert_eq!(log.entry(FILE, Gamemode::Chimps).unwrap().attempts, 2);
        assert_eq!(log.iter().count(), 1);
    }
}
