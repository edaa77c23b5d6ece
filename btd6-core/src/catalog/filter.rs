//! Composable catalog filters.

use super::{Catalog, CatalogEntry};
use crate::data::GameData;
use crate::descriptor::Flag;
use crate::gamemode::{Gamemode, MapCategory};
use crate::geometry::Resolution;
use crate::stats::PlaythroughStats;

/// How stored validation verdicts for the current resolution restrict the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationFilter {
    /// Keep only files validated at this resolution.
    #[default]
    ExcludeNonValidated,
    IncludeAll,
    /// Keep only files not yet validated at this resolution.
    ExcludeValidated,
}

impl ValidationFilter {
    #[must_use]
    pub const fn accepts(self, verdict: Option<bool>) -> bool {
        match self {
            Self::IncludeAll => true,
            Self::ExcludeNonValidated => matches!(verdict, Some(true)),
            Self::ExcludeValidated => !matches!(verdict, Some(true)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub category: Option<MapCategory>,
    pub gamemode: Option<Gamemode>,
    pub monkey_knowledge_enabled: bool,
    pub validation: ValidationFilter,
    pub hero_whitelist: Option<Vec<String>>,
    pub required_flags: Vec<Flag>,
    pub only_original: bool,
}

impl CatalogFilter {
    #[must_use]
    pub fn new(monkey_knowledge_enabled: bool, validation: ValidationFilter) -> Self {
        Self {
            monkey_knowledge_enabled,
            validation,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn category(mut self, category: Option<MapCategory>) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub const fn gamemode(mut self, gamemode: Option<Gamemode>) -> Self {
        self.gamemode = gamemode;
        self
    }

    #[must_use]
    pub fn hero_whitelist(mut self, heroes: Vec<String>) -> Self {
        self.hero_whitelist = Some(heroes);
        self
    }

    #[must_use]
    pub fn require(mut self, flag: Flag) -> Self {
        self.required_flags.push(flag);
        self
    }

    #[must_use]
    pub const fn only_original(mut self, only_original: bool) -> Self {
        self.only_original = only_original;
        self
    }

    /// Whether `entry` passes every configured restriction.
    #[must_use]
    pub fn accepts(
        &self,
        entry: &CatalogEntry,
        data: &GameData,
        stats: &PlaythroughStats,
        resolution: Resolution,
    ) -> bool {
        if let Some(category) = self.category
            && data.map(entry.map()).is_none_or(|map| map.category != category)
        {
            return false;
        }
        if self.gamemode.is_some_and(|gamemode| gamemode != entry.gamemode) {
            return false;
        }
        if !entry.has_flag(Flag::NoMonkeyKnowledge) && !self.monkey_knowledge_enabled {
            return false;
        }
        if let (Some(whitelist), Some(hero)) = (&self.hero_whitelist, &entry.hero)
            && !whitelist.contains(hero)
        {
            return false;
        }
        if !self.required_flags.iter().all(|flag| entry.has_flag(*flag)) {
            return false;
        }
        if self.only_original && !entry.is_original {
            return false;
        }
        self.validation
            .accepts(stats.validation_result(&entry.key, resolution))
    }

    /// A new catalog holding the accepted entries.
    #[must_use]
    pub fn apply(
        &self,
        catalog: &Catalog,
        data: &GameData,
        stats: &PlaythroughStats,
        resolution: Resolution,
    ) -> Catalog {
        let mut filtered = Catalog::default();
        for entry in catalog.entries() {
            if self.accepts(entry, data, stats, resolution) {
                filtered.insert(entry.clone());
            }
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PlaythroughDescriptor;
    use crate::test_support::fixture_data;
    use std::path::PathBuf;

    const QHD: Resolution = Resolution::new(2560, 1440);

    fn entry(name: &str, gamemode: Gamemode, hero: Option<&str>) -> CatalogEntry {
        let descriptor = PlaythroughDescriptor::parse(name).unwrap();
        CatalogEntry {
            key: name.to_string(),
            path: PathBuf::from(name),
            is_original: descriptor.gamemode == gamemode,
            descriptor,
            gamemode,
            hero: hero.map(str::to_string),
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.insert(entry("logs#chimps#2560x1440#noMK.btd6", Gamemode::Chimps, Some("quincy")));
        catalog.insert(entry("logs#chimps#2560x1440#noMK.btd6", Gamemode::Hard, Some("quincy")));
        catalog.insert(entry("logs#hard#2560x1440.btd6", Gamemode::Hard, None));
        catalog.insert(entry("cubism#easy#2560x1440#noMK#gB.btd6", Gamemode::Easy, Some("obyn")));
        catalog
    }

    #[test]
    fn validation_filter_truth_table() {
        use ValidationFilter::*;
        assert!(IncludeAll.accepts(None));
        assert!(ExcludeNonValidated.accepts(Some(true)));
        assert!(!ExcludeNonValidated.accepts(Some(false)));
        assert!(!ExcludeNonValidated.accepts(None));
        assert!(ExcludeValidated.accepts(None));
        assert!(ExcludeValidated.accepts(Some(false)));
        assert!(!ExcludeValidated.accepts(Some(true)));
    }

    #[test]
    fn knowledge_requirement_hides_mk_files() {
        let data = fixture_data();
        let stats = PlaythroughStats::default();
        let without = CatalogFilter::new(false, ValidationFilter::IncludeAll)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(without.len(), 3);
        assert!(without.entries().all(|e| e.has_flag(Flag::NoMonkeyKnowledge)));
        let with = CatalogFilter::new(true, ValidationFilter::IncludeAll)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(with.len(), 4);
    }

    #[test]
    fn filters_compose() {
        let data = fixture_data();
        let stats = PlaythroughStats::default();
        let filter = CatalogFilter::new(true, ValidationFilter::IncludeAll)
            .gamemode(Some(Gamemode::Hard))
            .hero_whitelist(vec!["obyn".to_string()]);
        let kept = filter.apply(&catalog(), &data, &stats, QHD);
        let keys: Vec<&str> = kept.entries().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["logs#hard#2560x1440.btd6"]);

        let golden = CatalogFilter::new(true, ValidationFilter::IncludeAll)
            .require(Flag::GoldenBloon)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(golden.len(), 1);

        let originals = CatalogFilter::new(true, ValidationFilter::IncludeAll)
            .only_original(true)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(originals.len(), 3);
    }

    #[test]
    fn validation_uses_current_resolution_only() {
        let data = fixture_data();
        let mut stats = PlaythroughStats::default();
        stats.set_validation("logs#hard#2560x1440.btd6", Resolution::new(1920, 1080), true);
        let validated = CatalogFilter::new(true, ValidationFilter::ExcludeNonValidated)
            .apply(&catalog(), &data, &stats, QHD);
        assert!(validated.is_empty());

        stats.set_validation("logs#hard#2560x1440.btd6", QHD, true);
        let validated = CatalogFilter::new(true, ValidationFilter::ExcludeNonValidated)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(validated.len(), 1);
        let pending = CatalogFilter::new(true, ValidationFilter::ExcludeValidated)
            .apply(&catalog(), &data, &stats, QHD);
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn category_restriction() {
        let data = fixture_data();
        let stats = PlaythroughStats::default();
        let category = data.map("cubism").unwrap().category;
        let kept = CatalogFilter::new(true, ValidationFilter::IncludeAll)
            .category(Some(category))
            .apply(&catalog(), &data, &stats, QHD);
        assert!(kept.entries().all(|e| data.map(e.map()).unwrap().category == category));
        assert!(kept.entries().any(|e| e.map() == "cubism"));
    }
}
