//! Player progression: unlocked maps, heroes, knowledge and per-map medals.

use crate::gamemode::Gamemode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of `userconfig.json`. Every section is optional on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub monkey_knowledge: BTreeMap<String, bool>,
    #[serde(default, rename = "heros", alias = "heroes")]
    pub heroes: BTreeMap<String, bool>,
    #[serde(default)]
    pub unlocked_maps: BTreeMap<String, bool>,
    #[serde(default)]
    pub unlocked_monkey_upgrades: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub medals: BTreeMap<String, BTreeMap<Gamemode, bool>>,
}

impl UserProfile {
    #[must_use]
    pub fn has_knowledge(&self, name: &str) -> bool {
        self.monkey_knowledge.get(name).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_medal_unlocked(&self, map: &str, gamemode: Gamemode) -> bool {
        self.medals
            .get(map)
            .and_then(|medals| medals.get(&gamemode))
            .copied()
            .unwrap_or(false)
    }

    /// Records a medal. Returns `true` when the stored value changed.
    pub fn set_medal_unlocked(&mut self, map: &str, gamemode: Gamemode, unlocked: bool) -> bool {
        if self.is_medal_unlocked(map, gamemode) == unlocked {
            return false;
        }
        self.medals
            .entry(map.to_string())
            .or_default()
            .insert(gamemode, unlocked);
        true
    }

    /// Whether the player may start `gamemode` on `map`.
    ///
    /// A map without any medal record is treated as locked. The base difficulties
    /// are always open; other gamemodes need their own medal or the medal of the
    /// gamemode that unlocks them.
    #[must_use]
    pub fn can_access_gamemode(&self, map: &str, gamemode: Gamemode) -> bool {
        if !self.medals.contains_key(map) {
            return false;
        }
        if gamemode.is_base_difficulty() || self.is_medal_unlocked(map, gamemode) {
            return true;
        }
        gamemode
            .prerequisite()
            .is_some_and(|required| self.is_medal_unlocked(map, required))
    }

    /// First accessible sandbox on `map`, optionally limited to `restricted_to`.
    #[must_use]
    pub fn available_sandbox(&self, map: &str, restricted_to: Option<&[Gamemode]>) -> Option<Gamemode> {
        restricted_to
            .unwrap_or(&Gamemode::SANDBOXES)
            .iter()
            .copied()
            .find(|gamemode| self.can_access_gamemode(map, *gamemode))
    }

    /// Whether the map, and the hero if the playthrough uses one, are unlocked.
    #[must_use]
    pub fn can_use_playthrough(&self, map: &str, hero: Option<&str>) -> bool {
        if !self.unlocked_maps.get(map).copied().unwrap_or(false) {
            return false;
        }
        hero.is_none_or(|hero| self.heroes.get(hero).copied().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        serde_json::from_str(
            r#"{
                "monkey_knowledge": {"hero_favors": true},
                "heros": {"quincy": true, "obyn": false},
                "unlocked_maps": {"logs": true, "cubism": false},
                "unlocked_monkey_upgrades": {},
                "medals": {
                    "logs": {"easy": true, "medium": true, "reverse": true, "hard": true, "alternate_bloons_rounds": true},
                    "cubism": {}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let profile: UserProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.medals.is_empty());
        assert!(!profile.has_knowledge("hero_favors"));
    }

    #[test]
    fn access_follows_unlock_tree() {
        let profile = profile();
        assert!(profile.can_access_gamemode("logs", Gamemode::Hard));
        assert!(profile.can_access_gamemode("logs", Gamemode::Impoppable));
        assert!(!profile.can_access_gamemode("logs", Gamemode::Chimps));
        assert!(profile.can_access_gamemode("logs", Gamemode::MediumSandbox));
        assert!(profile.can_access_gamemode("cubism", Gamemode::Easy));
        assert!(!profile.can_access_gamemode("cubism", Gamemode::PrimaryOnly));
        assert!(!profile.can_access_gamemode("quad", Gamemode::Easy));
    }

    #[test]
    fn sandbox_lookup_respects_restriction() {
        let profile = profile();
        assert_eq!(
            profile.available_sandbox("logs", None),
            Some(Gamemode::EasySandbox)
        );
        assert_eq!(
            profile.available_sandbox("logs", Some(&[Gamemode::MediumSandbox])),
            Some(Gamemode::MediumSandbox)
        );
        assert_eq!(profile.available_sandbox("cubism", None), None);
    }

    #[test]
    fn medal_updates_report_changes() {
        let mut profile = profile();
        assert!(!profile.set_medal_unlocked("logs", Gamemode::Easy, true));
        assert!(profile.set_medal_unlocked("quad", Gamemode::Easy, true));
        assert!(profile.is_medal_unlocked("quad", Gamemode::Easy));
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("heros").is_some());
    }

    #[test]
    fn playthrough_usability_checks_map_and_hero() {
        let profile = profile();
        assert!(profile.can_use_playthrough("logs", None));
        assert!(profile.can_use_playthrough("logs", Some("quincy")));
        assert!(!profile.can_use_playthrough("logs", Some("obyn")));
        assert!(!profile.can_use_playthrough("cubism", None));
    }
}
