//! Discovery of playthrough files and the gamemodes each one can be replayed as.

pub mod filter;
pub mod ranking;

use crate::data::{MonkeyGroup, Towers};
use crate::descriptor::{Flag, PlaythroughDescriptor};
use crate::gamemode::Gamemode;
use crate::instructions::{Playthrough, PlaythroughParser};
use crate::profile::UserProfile;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub use filter::{CatalogFilter, ValidationFilter};
pub use ranking::{
    RankedEntry, highest_value, monkey_money_per_hour, playthrough_monkey_money, playthrough_xp,
    rank_by_monkey_money, rank_by_xp, round_total_base_xp, xp_per_hour,
};

/// One playthrough file offered for one gamemode.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Path as discovered; also the stats key.
    pub key: String,
    pub path: PathBuf,
    pub descriptor: PlaythroughDescriptor,
    pub gamemode: Gamemode,
    /// `gamemode` is the one the file was recorded for.
    pub is_original: bool,
    pub hero: Option<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn map(&self) -> &str {
        &self.descriptor.map
    }

    #[must_use]
    pub const fn has_flag(&self, flag: Flag) -> bool {
        self.descriptor.has_flag(flag)
    }
}

/// Entries grouped by map, then by gamemode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    maps: BTreeMap<String, BTreeMap<Gamemode, Vec<CatalogEntry>>>,
}

impl Catalog {
    pub fn insert(&mut self, entry: CatalogEntry) {
        self.maps
            .entry(entry.descriptor.map.clone())
            .or_default()
            .entry(entry.gamemode)
            .or_default()
            .push(entry);
    }

    /// Every entry, map by map.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.maps
            .values()
            .flat_map(|modes| modes.values().flatten())
    }

    #[must_use]
    pub fn for_map(&self, map: &str) -> Option<&BTreeMap<Gamemode, Vec<CatalogEntry>>> {
        self.maps.get(map)
    }

    pub fn maps(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.values().all(|modes| modes.values().all(Vec::is_empty))
    }
}

/// Group shared by every non-hero tower, if there is exactly one.
#[must_use]
pub fn single_monkey_group(playthrough: &Playthrough, towers: &Towers) -> Option<MonkeyGroup> {
    let groups: BTreeSet<MonkeyGroup> = playthrough
        .monkeys
        .values()
        .filter_map(|monkey| monkey.tower.monkey_type())
        .filter_map(|tower| towers.monkeys.get(tower).map(|costs| costs.group))
        .collect();
    let mut iter = groups.into_iter();
    match (iter.next(), iter.next()) {
        (Some(group), None) => Some(group),
        _ => None,
    }
}

/// Gamemodes a file recorded for `native` can be played as; `native` comes last.
#[must_use]
pub fn compatible_gamemodes(native: Gamemode, single_group: Option<MonkeyGroup>) -> Vec<Gamemode> {
    use Gamemode::{
        Chimps, DoubleHpMoabs, Easy, HalfCash, Hard, Impoppable, MagicMonkeysOnly, Medium,
        MilitaryOnly, PrimaryOnly,
    };

    let mut modes = match native {
        Chimps | MagicMonkeysOnly | DoubleHpMoabs | HalfCash | Impoppable => {
            vec![Hard, Medium, Easy]
        }
        Hard | MilitaryOnly => vec![Medium, Easy],
        Medium | PrimaryOnly => vec![Easy],
        _ => Vec::new(),
    };

    let restricted = match single_group {
        Some(MonkeyGroup::Magic)
            if matches!(native, Hard | DoubleHpMoabs | HalfCash | Impoppable | Chimps) =>
        {
            Some(MagicMonkeysOnly)
        }
        Some(MonkeyGroup::Military)
            if matches!(native, Medium | Hard | DoubleHpMoabs | HalfCash | Impoppable | Chimps) =>
        {
            Some(MilitaryOnly)
        }
        Some(MonkeyGroup::Primary)
            if matches!(
                native,
                Easy | Medium | Hard | DoubleHpMoabs | HalfCash | Impoppable | Chimps
            ) =>
        {
            Some(PrimaryOnly)
        }
        _ => None,
    };
    modes.extend(restricted);
    modes.push(native);
    modes
}

/// Playthrough files in `dir`, sorted by name. A missing directory yields nothing.
fn list_playthrough_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("skipping playthrough directory {}: {err}", dir.display());
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Scans `dirs` and offers every file for each compatible gamemode.
///
/// With a `profile`, files for locked maps or heroes and gamemodes the player
/// cannot start are left out. Unreadable or misnamed files are logged and skipped.
#[must_use]
pub fn discover(
    dirs: &[PathBuf],
    parser: &PlaythroughParser<'_>,
    profile: Option<&UserProfile>,
) -> Catalog {
    let mut catalog = Catalog::default();
    for path in dirs.iter().flat_map(|dir| list_playthrough_files(dir)) {
        let descriptor = match PlaythroughDescriptor::from_path(&path) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!("ignoring {}: {err}", path.display());
                continue;
            }
        };
        let playthrough = match parser.parse_file(&path, None) {
            Ok(playthrough) => playthrough,
            Err(err) => {
                warn!("ignoring {}: {err}", path.display());
                continue;
            }
        };
        if let Some(profile) = profile
            && !profile.can_use_playthrough(&descriptor.map, playthrough.hero.as_deref())
        {
            debug!("{} needs a locked map or hero", path.display());
            continue;
        }

        let group = single_monkey_group(&playthrough, &parser.data().towers);
        for gamemode in compatible_gamemodes(descriptor.gamemode, group) {
            if profile.is_some_and(|p| !p.can_access_gamemode(&descriptor.map, gamemode)) {
                continue;
            }
            catalog.insert(CatalogEntry {
                key: playthrough.key.clone(),
                path: path.clone(),
                descriptor: descriptor.clone(),
                gamemode,
                is_original: gamemode == descriptor.gamemode,
                hero: playthrough.hero.clone(),
            });
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use Gamemode::*;

    #[test]
    fn downward_compatibility_table() {
        assert_eq!(compatible_gamemodes(Chimps, None), vec![Hard, Medium, Easy, Chimps]);
        assert_eq!(compatible_gamemodes(Hard, None), vec![Medium, Easy, Hard]);
        assert_eq!(compatible_gamemodes(Medium, None), vec![Easy, Medium]);
        assert_eq!(compatible_gamemodes(MilitaryOnly, None), vec![Medium, Easy, MilitaryOnly]);
        assert_eq!(compatible_gamemodes(PrimaryOnly, None), vec![Easy, PrimaryOnly]);
        assert_eq!(compatible_gamemodes(Deflation, None), vec![Deflation]);
        assert_eq!(compatible_gamemodes(Easy, None), vec![Easy]);
    }

    #[test]
    fn single_group_adds_restricted_mode() {
        assert_eq!(
            compatible_gamemodes(Chimps, Some(MonkeyGroup::Military)),
            vec![Hard, Medium, Easy, MilitaryOnly, Chimps]
        );
        assert_eq!(
            compatible_gamemodes(Easy, Some(MonkeyGroup::Primary)),
            vec![PrimaryOnly, Easy]
        );
        assert_eq!(
            compatible_gamemodes(Medium, Some(MonkeyGroup::Magic)),
            vec![Easy, Medium]
        );
        assert_eq!(
            compatible_gamemodes(Hard, Some(MonkeyGroup::Support)),
            vec![Medium, Easy, Hard]
        );
    }
}
