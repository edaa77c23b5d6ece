//! The control loop: one observe/classify/act cycle per tick.

use super::costs::ObservedCosts;
use super::screens::{Screen, classify};
use super::{
    Flow, GameRun, ModeKind, Objective, ReplayError, ReplayState, RunMode, RunPlan, RunSummary,
    ValidationRecord, play_objectives,
};
use crate::Persistence;
use crate::capabilities::{Host, ReferenceInventory};
use crate::constants::{INGAME_POLL_INTERVAL, MENU_POLL_INTERVAL};
use crate::data::{GameData, ResolutionAreas};
use crate::gamemode::Gamemode;
use crate::instructions::{Playthrough, PlaythroughError, PlaythroughParser};
use crate::pricing::KnowledgeModifiers;
use crate::profile::UserProfile;
use crate::session::Session;
use crate::stats::{PlaythroughStats, StatsRecorder};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    Finished,
}

/// Replays playthroughs against a [`Host`], persisting through `P`.
pub struct ReplayDriver<'a, H: Host, P: Persistence> {
    pub(super) host: H,
    pub(super) store: P,
    pub(super) data: &'a GameData,
    pub(super) areas: ResolutionAreas,
    pub(super) session: Session,
    pub(super) knowledge: KnowledgeModifiers,
    pub(super) profile: UserProfile,
    pub(super) recorder: StatsRecorder,
    pub(super) plan: RunPlan,
    pub(super) objectives: VecDeque<Objective>,
    pub(super) current: Option<Objective>,
    pub(super) state: ReplayState,
    pub(super) last_screen: Screen,
    pub(super) waited_on_unknown: bool,
    pub(super) state_failed: bool,
    pub(super) state_failures: u32,
    pub(super) objective_failed: bool,
    pub(super) started: bool,
    pub(super) last_hero: Option<String>,
    pub(super) run: Option<GameRun>,
    pub(super) pending_verdict: Option<ValidationRecord>,
    pub(super) chase_found: Option<Rc<Playthrough>>,
    pub(super) observed_costs: ObservedCosts,
    pub(super) rng: ChaCha20Rng,
    pub(super) summary: RunSummary,
}

impl<'a, H: Host, P: Persistence> ReplayDriver<'a, H, P> {
    /// Prepares a run. Fails before any input is sent when the reference
    /// images, screen areas or persisted state are unusable.
    ///
    /// # Errors
    ///
    /// Returns an error if required templates are missing, the mode needs
    /// templates that are not loaded, no screen areas exist for the session
    /// resolution, or the stored profile/stats cannot be read.
    pub fn new(
        host: H,
        store: P,
        data: &'a GameData,
        session: Session,
        plan: RunPlan,
        seed: u64,
    ) -> Result<Self, ReplayError> {
        let inventory = ReferenceInventory::check(&host)?;
        let kind = plan.mode.kind();
        if !inventory.supports(kind) {
            return Err(ReplayError::UnsupportedMode(kind));
        }
        let areas = data.areas_for(session.resolution)?;
        let profile = store.load_profile().map_err(ReplayError::storage)?;
        let stats = store.load_stats().map_err(ReplayError::storage)?;
        let knowledge = session.knowledge(&profile);
        Ok(Self {
            host,
            store,
            data,
            areas,
            session,
            knowledge,
            profile,
            recorder: StatsRecorder::new(stats, session.resolution, data.version),
            plan,
            objectives: VecDeque::new(),
            current: None,
            state: ReplayState::ManageObjectives,
            last_screen: Screen::Unknown,
            waited_on_unknown: false,
            state_failed: false,
            state_failures: 0,
            objective_failed: false,
            started: false,
            last_hero: None,
            run: None,
            pending_verdict: None,
            chase_found: None,
            observed_costs: ObservedCosts::default(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            summary: RunSummary::default(),
        })
    }

    #[must_use]
    pub const fn state(&self) -> ReplayState {
        self.state
    }

    #[must_use]
    pub const fn summary(&self) -> &RunSummary {
        &self.summary
    }

    #[must_use]
    pub const fn profile(&self) -> &UserProfile {
        &self.profile
    }

    #[must_use]
    pub const fn stats(&self) -> &PlaythroughStats {
        self.recorder.stats()
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Runs ticks until the driver exits, then flushes pending state.
    ///
    /// # Errors
    ///
    /// Returns the first device, data or persistence error.
    pub fn run(mut self) -> Result<RunSummary, ReplayError> {
        while self.tick()? == TickOutcome::Running {}
        self.finish()
    }

    /// Writes any pending validation verdict and returns the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the verdict cannot be persisted.
    pub fn finish(mut self) -> Result<RunSummary, ReplayError> {
        self.flush_verdict()?;
        Ok(self.summary)
    }

    /// One observe/classify/act cycle, followed by the poll delay.
    ///
    /// # Errors
    ///
    /// Returns device failures and persistence failures; recognition
    /// anomalies are logged and retried instead.
    pub fn tick(&mut self) -> Result<TickOutcome, ReplayError> {
        if self.state == ReplayState::Exit {
            return Ok(TickOutcome::Finished);
        }
        if self.host.interrupt_requested() {
            warn!("interrupted; saving and stopping");
            self.flush_verdict()?;
            self.state = ReplayState::Exit;
            return Ok(TickOutcome::Finished);
        }
        if !self.host.is_target_application_focused() {
            if self.last_screen != Screen::Unfocused {
                info!("game window is not focused; waiting");
            }
            self.last_screen = Screen::Unfocused;
            self.host.sleep(MENU_POLL_INTERVAL);
            return Ok(TickOutcome::Running);
        }
        if self.host.control_held() {
            self.host.sleep(MENU_POLL_INTERVAL);
            return Ok(TickOutcome::Running);
        }

        let frame = self.host.capture_screen()?;
        let screen = classify(&mut self.host, &frame, &self.areas.compare)?;
        if screen != self.last_screen {
            debug!("screen {} -> {screen} ({})", self.last_screen, self.state);
        }

        let flow = match self.state {
            ReplayState::ManageObjectives => {
                self.manage()?;
                None
            }
            ReplayState::Undefined => {
                self.arbitrate();
                None
            }
            ReplayState::Idle | ReplayState::Exit => None,
            ReplayState::GotoHome => Some(self.goto_home(screen)?),
            ReplayState::GotoIngame => Some(self.goto_ingame(screen)?),
            ReplayState::SelectHero => Some(self.select_hero(screen)?),
            ReplayState::FindHardestIncreasedRewardsMap => Some(self.find_map(screen)?),
            ReplayState::Ingame => Some(self.ingame(screen, &frame)?),
        };
        if let Some(flow) = flow {
            self.apply(flow);
        }

        if screen != Screen::Unknown {
            self.waited_on_unknown = false;
        }
        self.last_screen = screen;

        if self.state == ReplayState::Exit {
            return Ok(TickOutcome::Finished);
        }
        let poll = if self.state == ReplayState::Ingame {
            INGAME_POLL_INTERVAL
        } else {
            MENU_POLL_INTERVAL
        };
        self.host.sleep(poll);
        Ok(TickOutcome::Running)
    }

    fn apply(&mut self, flow: Flow) {
        match flow {
            Flow::Pending => {}
            Flow::Done => {
                if self
                    .current
                    .as_ref()
                    .is_some_and(|o| o.state != ReplayState::GotoHome)
                {
                    self.state_failures = 0;
                }
                self.state = ReplayState::Undefined;
            }
            Flow::StateFailed => {
                self.state_failed = true;
                self.state = ReplayState::Undefined;
            }
            Flow::ObjectiveFailed => {
                self.objective_failed = true;
                self.state = ReplayState::Undefined;
            }
        }
    }

    /// Decides what follows the objective that just finished or failed.
    fn arbitrate(&mut self) {
        if self.objective_failed {
            self.objective_failed = false;
            self.state_failed = false;
            self.state_failures = 0;
            self.objectives.clear();
            self.current = None;
            self.run = None;
            let kind = self.plan.mode.kind();
            if self.plan.repeat || matches!(kind, ModeKind::Validate | ModeKind::Costs) {
                warn!("objective failed; planning the next attempt");
                self.state = ReplayState::ManageObjectives;
            } else {
                warn!("objective failed; exiting");
                self.state = ReplayState::Exit;
            }
            return;
        }

        if self.state_failed {
            self.state_failed = false;
            self.state_failures += 1;
            if self.state_failures > 1 {
                warn!("retry did not help; giving up on the objective");
                self.objective_failed = true;
                return;
            }
            if let Some(current) = self.current.take() {
                info!("unexpected screen during {}; returning home to retry", current.state);
                self.objectives.push_front(current);
            }
            self.objectives.push_front(Objective::new(ReplayState::GotoHome));
        }

        match self.objectives.pop_front() {
            Some(next) => {
                debug!("next objective: {}", next.state);
                if next.state == ReplayState::Ingame {
                    self.run = None;
                }
                self.state = next.state;
                self.current = Some(next);
            }
            None => {
                self.current = None;
                self.state = ReplayState::ManageObjectives;
            }
        }
    }

    /// Refills the objective stack for the next attempt.
    fn manage(&mut self) -> Result<(), ReplayError> {
        if self.host.exit_hotkey_pressed() {
            self.flush_verdict()?;
            info!("exit requested; stopping");
            self.state = ReplayState::Exit;
            return Ok(());
        }
        self.flush_verdict()?;

        match self.plan.mode.kind() {
            ModeKind::Validate => self.next_validation(),
            ModeKind::Costs => self.manage_costs(),
            _ => {
                if let Some(playthrough) = self.chase_found.take() {
                    let select = self.needs_hero(&playthrough);
                    self.load(play_objectives(&playthrough, select));
                    return Ok(());
                }
                if self.started && !self.plan.repeat {
                    info!("all done");
                    self.state = ReplayState::Exit;
                    return Ok(());
                }
                self.started = true;
                let objectives = self.next_objectives()?;
                self.load(objectives);
                Ok(())
            }
        }
    }

    fn next_objectives(&mut self) -> Result<Vec<Objective>, ReplayError> {
        let entry = match &self.plan.mode {
            RunMode::Single { objectives } => return Ok(objectives.clone()),
            RunMode::Chase(_) => {
                return Ok(vec![
                    Objective::new(ReplayState::GotoHome),
                    Objective::new(ReplayState::FindHardestIncreasedRewardsMap),
                    Objective::new(ReplayState::ManageObjectives),
                ]);
            }
            RunMode::Random { pool } => {
                if pool.is_empty() {
                    return Err(ReplayError::EmptyPool(ModeKind::Random.to_string()));
                }
                pool[self.rng.gen_range(0..pool.len())].clone()
            }
            RunMode::Xp { pool } | RunMode::MonkeyMoney { pool } => {
                if pool.is_empty() {
                    return Err(ReplayError::EmptyPool(self.plan.mode.kind().to_string()));
                }
                pool[self.rng.gen_range(0..pool.len())].entry.clone()
            }
            RunMode::Validate { .. } | RunMode::Costs { .. } => return Ok(Vec::new()),
        };
        info!("playing {} as {}", entry.key, entry.gamemode);
        match self.parse(&entry.path, Some(entry.gamemode)) {
            Ok(playthrough) => {
                let playthrough = Rc::new(playthrough);
                let select = self.needs_hero(&playthrough);
                Ok(play_objectives(&playthrough, select))
            }
            Err(err) => {
                warn!("cannot load {}: {err}", entry.key);
                Ok(Vec::new())
            }
        }
    }

    fn next_validation(&mut self) -> Result<(), ReplayError> {
        loop {
            let RunMode::Validate { queue } = &mut self.plan.mode else {
                return Ok(());
            };
            let Some(entry) = queue.pop_front() else {
                info!("validation finished");
                self.state = ReplayState::Exit;
                return Ok(());
            };
            let Some(sandbox) = self.profile.available_sandbox(entry.map(), None) else {
                warn!("no sandbox unlocked on {}; skipping {}", entry.map(), entry.key);
                continue;
            };
            match self.parse(&entry.path, Some(sandbox)) {
                Ok(playthrough) => {
                    info!("validating {} in {sandbox}", entry.key);
                    let playthrough = Rc::new(playthrough);
                    self.pending_verdict = Some(ValidationRecord {
                        file: entry.key.clone(),
                        result: true,
                    });
                    let select = self.needs_hero(&playthrough);
                    self.load(play_objectives(&playthrough, select));
                    return Ok(());
                }
                Err(err) => warn!("cannot load {}: {err}", entry.key),
            }
        }
    }

    fn manage_costs(&mut self) -> Result<(), ReplayError> {
        if !self.started {
            self.started = true;
            if let RunMode::Costs { objectives } = &self.plan.mode {
                let objectives = objectives.clone();
                self.load(objectives);
            }
            return Ok(());
        }
        let (towers, changes) = self.observed_costs.apply(&self.data.towers);
        if changes.is_empty() {
            info!("tower prices unchanged");
        } else {
            for change in &changes {
                info!("price changed: {change}");
            }
            self.store
                .save_towers(&towers, &self.data.towers)
                .map_err(ReplayError::storage)?;
            self.summary.tower_changes = changes;
        }
        self.state = ReplayState::Exit;
        Ok(())
    }

    fn load(&mut self, objectives: Vec<Objective>) {
        self.objectives = objectives.into();
        self.current = None;
        self.state = ReplayState::Undefined;
    }

    pub(super) fn needs_hero(&self, playthrough: &Playthrough) -> bool {
        playthrough.hero.is_some() && playthrough.hero != self.last_hero
    }

    pub(super) fn parse(
        &self,
        path: &Path,
        gamemode: Option<Gamemode>,
    ) -> Result<Playthrough, PlaythroughError> {
        PlaythroughParser::new(
            self.data,
            &self.areas.click,
            self.session.resolution,
            self.knowledge,
        )
        .parse_file(path, gamemode)
    }

    pub(super) fn flush_verdict(&mut self) -> Result<(), ReplayError> {
        let Some(record) = self.pending_verdict.take() else {
            return Ok(());
        };
        self.recorder
            .set_validation(&self.store, &record.file, record.result)
            .map_err(ReplayError::storage)?;
        if record.result {
            info!("{} validated", record.file);
        } else {
            warn!("{} failed validation", record.file);
        }
        self.summary.validations.push(record);
        Ok(())
    }

    /// The playthrough of the objective being worked on.
    pub(super) fn current_playthrough(&self) -> Option<Rc<Playthrough>> {
        self.current.as_ref().and_then(|o| o.playthrough.clone())
    }
}
