//! Turns a requested mode into a [`RunPlan`].

use super::costs::{hero_probe_playthrough, monkey_probe_playthrough};
use super::{
    ChaseTarget, ModeKind, Objective, ReplayError, ReplayState, RunMode, RunPlan, play_objectives,
};
use crate::catalog::{
    Catalog, CatalogEntry, CatalogFilter, ValidationFilter, compatible_gamemodes, discover,
    rank_by_monkey_money, rank_by_xp, single_monkey_group,
};
use crate::constants::{GOLDEN_BLOON_EVENT, UNVALIDATED_PLAYTHROUGH_DIR};
use crate::data::{ClickAreas, GameData};
use crate::descriptor::{Flag, PlaythroughDescriptor};
use crate::gamemode::{Gamemode, MapCategory};
use crate::instructions::PlaythroughParser;
use crate::profile::UserProfile;
use crate::session::Session;
use crate::stats::PlaythroughStats;
use log::info;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where a resumed playthrough picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFrom {
    /// Instruction index in the file, not counting synthetic steps.
    Step(usize),
    /// From the first instruction, executing everything before the game is started.
    BeforeStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub from: ResumeFrom,
    /// Stop before this instruction index.
    pub until: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub repeat: bool,
    pub record_stats: bool,
    pub validation: ValidationFilter,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            repeat: false,
            record_stats: true,
            validation: ValidationFilter::ExcludeNonValidated,
        }
    }
}

/// Builds run plans from the discovered catalog.
pub struct Planner<'a> {
    data: &'a GameData,
    session: Session,
    profile: &'a UserProfile,
    stats: &'a PlaythroughStats,
    parser: PlaythroughParser<'a>,
    dirs: Vec<PathBuf>,
    options: PlanOptions,
    catalog: Catalog,
}

impl<'a> Planner<'a> {
    /// Discovers every playthrough in `dirs` usable with `profile`.
    #[must_use]
    pub fn new(
        data: &'a GameData,
        click: &'a ClickAreas,
        session: Session,
        profile: &'a UserProfile,
        stats: &'a PlaythroughStats,
        dirs: Vec<PathBuf>,
        options: PlanOptions,
    ) -> Self {
        let parser = PlaythroughParser::new(
            data,
            click,
            session.resolution,
            session.knowledge(profile),
        );
        let catalog = discover(&dirs, &parser, Some(profile));
        info!("{} playthrough/gamemode combinations available", catalog.len());
        Self {
            data,
            session,
            profile,
            stats,
            parser,
            dirs,
            options,
            catalog,
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn plan(&self, mode: RunMode) -> RunPlan {
        RunPlan {
            mode,
            repeat: self.options.repeat,
            record_stats: self.options.record_stats,
            resuming: false,
            do_all_before_start: false,
        }
    }

    fn filter(&self) -> CatalogFilter {
        CatalogFilter::new(self.session.monkey_knowledge_enabled, self.options.validation)
    }

    fn filtered(&self, filter: &CatalogFilter) -> Catalog {
        filter.apply(&self.catalog, self.data, self.stats, self.session.resolution)
    }

    fn require_no_knowledge(&self, mode: ModeKind) -> Result<(), ReplayError> {
        if self.session.monkey_knowledge_enabled {
            return Err(ReplayError::InvalidArguments(format!(
                "mode {mode} only works with monkey knowledge disabled"
            )));
        }
        Ok(())
    }

    /// Finds a playthrough file by path or by name in the playthrough directories.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a playthrough file name or no such file exists.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ReplayError> {
        PlaythroughDescriptor::parse(name).map_err(|_| {
            ReplayError::InvalidArguments(format!("{name:?} is not a playthrough file name"))
        })?;
        if name.contains(['/', '\\']) && Path::new(name).is_file() {
            return Ok(PathBuf::from(name));
        }
        self.dirs
            .iter()
            .map(PathBuf::as_path)
            .chain([Path::new(UNVALIDATED_PLAYTHROUGH_DIR)])
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ReplayError::NotFound(name.to_string()))
    }

    /// Plays one file, optionally as another compatible gamemode or resumed mid-game.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found or parsed, the gamemode is not
    /// compatible, or the resume window is empty.
    pub fn single(
        &self,
        name: &str,
        gamemode: Option<Gamemode>,
        resume: Option<Resume>,
    ) -> Result<RunPlan, ReplayError> {
        let path = self.resolve(name)?;
        let native = self.parser.parse_file(&path, None)?;
        if let Some(gamemode) = gamemode {
            let group = single_monkey_group(&native, &self.data.towers);
            let native_mode = native.descriptor.as_ref().map_or(native.gamemode, |d| d.gamemode);
            if !compatible_gamemodes(native_mode, group).contains(&gamemode) {
                return Err(ReplayError::InvalidArguments(format!(
                    "{name} cannot be played as {gamemode}"
                )));
            }
        }
        let mut playthrough = match gamemode {
            Some(gamemode) if gamemode != native.gamemode => {
                self.parser.parse_file(&path, Some(gamemode))?
            }
            _ => native,
        };

        let Some(resume) = resume else {
            let playthrough = Rc::new(playthrough);
            let objectives = play_objectives(&playthrough, true);
            return Ok(self.plan(RunMode::Single { objectives }));
        };

        let extra = playthrough.extra_instructions;
        let total = playthrough.steps.len().saturating_sub(extra);
        let offset = match resume.from {
            ResumeFrom::Step(offset) => offset,
            ResumeFrom::BeforeStart => 0,
        };
        let last = resume.until.map_or(total, |until| until.min(total));
        if offset >= total || resume.until.is_some_and(|until| offset >= until) {
            return Err(ReplayError::InvalidArguments(format!(
                "instruction offset {offset} is past the last instruction ({last})"
            )));
        }
        playthrough.steps = playthrough.steps[extra + offset..extra + last].to_vec();
        if let Some(first) = playthrough.steps.first() {
            info!("continuing {name}; first instruction: {first}");
        }
        let playthrough = Rc::new(playthrough);
        Ok(RunPlan {
            mode: RunMode::Single {
                objectives: vec![
                    Objective::with(ReplayState::Ingame, &playthrough),
                    Objective::new(ReplayState::ManageObjectives),
                ],
            },
            repeat: false,
            record_stats: false,
            resuming: true,
            do_all_before_start: resume.from == ResumeFrom::BeforeStart,
        })
    }

    /// Random games from every usable playthrough.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::EmptyPool`] when no playthrough matches.
    pub fn random(
        &self,
        category: Option<MapCategory>,
        gamemode: Option<Gamemode>,
    ) -> Result<RunPlan, ReplayError> {
        let filtered = self.filtered(&self.filter().category(category).gamemode(gamemode));
        let pool: Vec<CatalogEntry> = filtered.entries().cloned().collect();
        if pool.is_empty() {
            return Err(ReplayError::EmptyPool(ModeKind::Random.to_string()));
        }
        Ok(self.plan(RunMode::Random { pool }))
    }

    /// Plays the most valuable playthrough for the map showing `event`'s reward icon.
    ///
    /// # Errors
    ///
    /// Returns an error for an event without a loaded icon, or when no playthrough matches.
    pub fn chase(
        &self,
        event: &str,
        category: Option<MapCategory>,
        gamemode: Option<Gamemode>,
        known_events: &[String],
    ) -> Result<RunPlan, ReplayError> {
        if !known_events.iter().any(|known| known == event) {
            return Err(ReplayError::InvalidArguments(format!(
                "unknown collection event {event:?}"
            )));
        }
        let mut filter = self.filter().category(category).gamemode(gamemode);
        if event == GOLDEN_BLOON_EVENT {
            filter = filter.require(Flag::GoldenBloon);
        }
        let catalog = self.filtered(&filter);
        if catalog.is_empty() {
            return Err(ReplayError::EmptyPool(ModeKind::Chase.to_string()));
        }
        Ok(self.plan(RunMode::Chase(ChaseTarget {
            event: event.to_string(),
            category,
            catalog,
        })))
    }

    /// One of the `n` best playthroughs by XP per hour.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::EmptyPool`] when no playthrough matches.
    pub fn xp(&self, n: usize) -> Result<RunPlan, ReplayError> {
        let mut pool = rank_by_xp(&self.filtered(&self.filter()), self.data, self.stats);
        pool.truncate(n.max(1));
        if pool.is_empty() {
            return Err(ReplayError::EmptyPool(ModeKind::Xp.to_string()));
        }
        Ok(self.plan(RunMode::Xp { pool }))
    }

    /// One of the `n` best playthroughs by monkey money per hour.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::EmptyPool`] when no playthrough matches.
    pub fn monkey_money(&self, n: usize) -> Result<RunPlan, ReplayError> {
        let mut pool = rank_by_monkey_money(&self.filtered(&self.filter()), self.data, self.stats);
        pool.truncate(n.max(1));
        if pool.is_empty() {
            return Err(ReplayError::EmptyPool(ModeKind::MonkeyMoney.to_string()));
        }
        Ok(self.plan(RunMode::MonkeyMoney { pool }))
    }

    fn validation_plan(&self, queue: VecDeque<CatalogEntry>) -> RunPlan {
        RunPlan {
            repeat: false,
            ..self.plan(RunMode::Validate { queue })
        }
    }

    /// Validates one file in a sandbox of its map.
    ///
    /// # Errors
    ///
    /// Returns an error with monkey knowledge enabled or when the file is not found.
    pub fn validate_file(&self, name: &str) -> Result<RunPlan, ReplayError> {
        self.require_no_knowledge(ModeKind::Validate)?;
        let path = self.resolve(name)?;
        let descriptor = PlaythroughDescriptor::from_path(&path)
            .map_err(|err| ReplayError::InvalidArguments(err.to_string()))?;
        let entry = CatalogEntry {
            key: path.to_string_lossy().replace('\\', "/"),
            path,
            gamemode: descriptor.gamemode,
            descriptor,
            is_original: true,
            hero: None,
        };
        Ok(self.validation_plan(VecDeque::from([entry])))
    }

    /// Validates every original-gamemode playthrough, optionally in one category.
    ///
    /// Without `--include-unvalidated` every file is revalidated; with it only
    /// files not yet validated at this resolution are.
    ///
    /// # Errors
    ///
    /// Returns an error with monkey knowledge enabled or when nothing matches.
    pub fn validate_all(&self, category: Option<MapCategory>) -> Result<RunPlan, ReplayError> {
        self.require_no_knowledge(ModeKind::Validate)?;
        let validation = match self.options.validation {
            ValidationFilter::IncludeAll => ValidationFilter::ExcludeValidated,
            _ => ValidationFilter::IncludeAll,
        };
        let filter = CatalogFilter::new(true, validation)
            .category(category)
            .only_original(true);
        let queue: VecDeque<CatalogEntry> = self.filtered(&filter).entries().cloned().collect();
        if queue.is_empty() {
            return Err(ReplayError::EmptyPool(ModeKind::Validate.to_string()));
        }
        Ok(self.validation_plan(queue))
    }

    /// Measures tower prices on the first test map with medium sandbox access.
    ///
    /// # Errors
    ///
    /// Returns an error with monkey knowledge enabled, without a usable test map,
    /// or when probe playthroughs cannot be built.
    pub fn costs(&self, include_heroes: bool) -> Result<RunPlan, ReplayError> {
        self.require_no_knowledge(ModeKind::Costs)?;
        let positions = self.data.test_positions_for(self.session.resolution)?;
        let Some((map, spots)) = positions.iter().find(|(map, _)| {
            self.profile
                .available_sandbox(map, Some(&[Gamemode::MediumSandbox][..]))
                .is_some()
        }) else {
            return Err(ReplayError::InvalidArguments(
                "costs needs medium sandbox access on one of the test position maps".to_string(),
            ));
        };
        info!("probing tower prices on {map}");

        let click = self.parser.click_areas();
        let monkeys = Rc::new(monkey_probe_playthrough(self.data, click, map, *spots)?);
        let mut objectives = vec![
            Objective::new(ReplayState::GotoHome),
            Objective::with(ReplayState::GotoIngame, &monkeys),
            Objective::with(ReplayState::Ingame, &monkeys),
        ];
        if include_heroes {
            for hero in self.data.towers.heroes.keys() {
                if !self.profile.heroes.get(hero).copied().unwrap_or(false)
                    || !click.hero_positions.contains_key(hero)
                {
                    continue;
                }
                let probe = Rc::new(hero_probe_playthrough(self.data, click, map, *spots, hero)?);
                objectives.extend([
                    Objective::new(ReplayState::GotoHome),
                    Objective::with(ReplayState::SelectHero, &probe),
                    Objective::new(ReplayState::GotoHome),
                    Objective::with(ReplayState::GotoIngame, &probe),
                    Objective::with(ReplayState::Ingame, &probe),
                ]);
            }
        }
        objectives.push(Objective::new(ReplayState::ManageObjectives));
        Ok(RunPlan {
            repeat: false,
            record_stats: false,
            ..self.plan(RunMode::Costs { objectives })
        })
    }
}
