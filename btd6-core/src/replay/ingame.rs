//! Instruction execution while a game is running.

use super::driver::ReplayDriver;
use super::screens::{GameStateKind, Screen, classify_game_state};
use super::{Flow, ModeKind, ReplayError};
use crate::Persistence;
use crate::capabilities::{Host, Template};
use crate::constants::{ACTION_DELAY, MENU_CHANGE_DELAY, SMALL_ACTION_DELAY, UNREADABLE};
use crate::data::KeyCode;
use crate::gamemode::Gamemode;
use crate::instructions::{ActionKind, GameSpeed, Instruction, Playthrough};
use crate::stats::{Outcome, TimeLog};
use crate::status;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::rc::Rc;

/// Progress through one game.
#[derive(Debug, Clone)]
pub struct GameRun {
    pub playthrough: Rc<Playthrough>,
    pub steps: VecDeque<Instruction>,
    pub time: TimeLog,
    /// Balance read on the previous tick, or `-1`.
    pub last_balance: i64,
    /// Cost of the action dispatched on the previous tick.
    pub last_cost: i64,
    pub last_action: Option<Instruction>,
    pub last_round: i64,
    pub fast: bool,
    pub do_all_before_start: bool,
}

impl GameRun {
    #[must_use]
    pub fn new(playthrough: Rc<Playthrough>, do_all_before_start: bool) -> Self {
        let steps = playthrough.steps.iter().cloned().collect();
        Self {
            playthrough,
            steps,
            time: TimeLog::default(),
            last_balance: UNREADABLE,
            last_cost: 0,
            last_action: None,
            last_round: UNREADABLE,
            fast: true,
            do_all_before_start,
        }
    }

    /// Balance expected now if the previous action went through.
    #[must_use]
    pub const fn expected_balance(&self) -> i64 {
        self.last_balance - self.last_cost
    }
}

/// Refund of the run of sells at the front of `queue`.
#[must_use]
pub fn sell_bundle_refund(queue: &VecDeque<Instruction>) -> i64 {
    queue
        .iter()
        .take_while(|step| step.kind() == ActionKind::Sell)
        .map(|step| -step.cost())
        .sum()
}

/// Cost of the first queued instruction that spends money, or 0.
#[must_use]
pub fn next_costing_cost(queue: &VecDeque<Instruction>) -> i64 {
    queue
        .iter()
        .find(|step| !matches!(step.kind(), ActionKind::Sell | ActionKind::AwaitRound))
        .map_or(0, Instruction::cost)
}

/// Cost of the first queued instruction with a positive cost, or 0.
#[must_use]
pub fn next_spending_cost(queue: &VecDeque<Instruction>) -> i64 {
    queue
        .iter()
        .map(Instruction::cost)
        .find(|cost| *cost > 0)
        .unwrap_or(0)
}

/// What the dispatch rule looks at besides the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    pub money: i64,
    pub expected_balance: i64,
    pub round: i64,
    pub gamemode: Gamemode,
    pub validating: bool,
}

/// Whether `head`, the front of `queue`, may fire now.
///
/// Purchases need both the observed and the expected balance to cover them.
/// A sell fires once the refunds of the sells queued with it plus the balance
/// cover the next purchase. Deflation ignores money entirely.
#[must_use]
pub fn dispatch_ready(head: &Instruction, queue: &VecDeque<Instruction>, ctx: &DispatchContext) -> bool {
    if ctx.gamemode == Gamemode::Deflation {
        return true;
    }
    let available = ctx.money.min(ctx.expected_balance);
    match head {
        Instruction::AwaitRound { round } => ctx.validating || ctx.round >= i64::from(*round),
        Instruction::Sell(_) => available + sell_bundle_refund(queue) >= next_costing_cost(queue),
        other => available >= other.cost(),
    }
}

/// Money and round from raw recognizer output; either failing yields `-1` for both.
#[must_use]
pub fn read_counters(money_text: &str, round_text: &str) -> (i64, i64) {
    let money = money_text
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<i64>();
    let round = round_text
        .split('/')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .parse::<i64>();
    match (money, round) {
        (Ok(money), Ok(round)) => (money, round),
        _ => (UNREADABLE, UNREADABLE),
    }
}

fn chains_with(step: &Instruction, name: &str) -> bool {
    matches!(
        step.kind(),
        ActionKind::Retarget | ActionKind::Special | ActionKind::Click
    ) && step.monkey_name() == Some(name)
}

impl<H: Host, P: Persistence> ReplayDriver<'_, H, P> {
    pub(super) fn ingame(&mut self, screen: Screen, frame: &H::Frame) -> Result<Flow, ReplayError> {
        let mut run = match self.run.take() {
            Some(run) => run,
            None => {
                let Some(playthrough) = self.current_playthrough() else {
                    warn!("in-game objective without a playthrough");
                    return Ok(Flow::ObjectiveFailed);
                };
                info!(
                    "starting {} ({} steps)",
                    playthrough.key,
                    playthrough.steps.len()
                );
                GameRun::new(playthrough, self.plan.do_all_before_start)
            }
        };

        let flow = match screen {
            Screen::Ingame => self.play_tick(&mut run, frame),
            Screen::IngamePaused => {
                if self.last_screen != Screen::IngamePaused {
                    run.time.stop(self.host.elapsed());
                }
                self.host.sleep(crate::constants::TRANSIENT_SCREEN_WAIT);
                if self.host.is_target_application_focused() {
                    self.host.send_key(&KeyCode::escape())?;
                }
                Ok(Flow::Pending)
            }
            Screen::VictorySummary => self.finish_game(&mut run, Outcome::Win),
            Screen::Defeat => self.finish_game(&mut run, Outcome::Defeat),
            Screen::Unknown
            | Screen::Levelup
            | Screen::Round100Insta
            | Screen::CollectionClaimChest
            | Screen::ApopalypseHint => {
                self.dismiss_transient(screen)?;
                Ok(Flow::Pending)
            }
            other => {
                warn!("unexpected screen {other} while playing");
                Ok(Flow::StateFailed)
            }
        };
        if matches!(flow, Ok(Flow::Pending)) {
            self.run = Some(run);
        }
        flow
    }

    fn play_tick(&mut self, run: &mut GameRun, frame: &H::Frame) -> Result<Flow, ReplayError> {
        run.time.start(self.host.elapsed());
        let gamemode = run.playthrough.gamemode;
        let money_text = self
            .host
            .recognize_digits(frame, self.areas.ocr_segments.money)?;
        let round_text = self
            .host
            .recognize_digits(frame, self.areas.ocr_segments.round_for(gamemode))?;
        let (money, round) = read_counters(&money_text, &round_text);
        status::rewrite(&format!(
            "money {money} | round {round} | {} steps left",
            run.steps.len()
        ));

        let mode = self.plan.mode.kind();
        let expected = run.expected_balance();

        if mode == ModeKind::Validate
            && run.last_balance != UNREADABLE
            && money != UNREADABLE
            && run.last_cost != 0
            && money != expected
        {
            let action = run
                .last_action
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            if money == run.last_balance {
                warn!("{action:?} did not go through; {} is invalid", run.playthrough.key);
                if let Some(verdict) = &mut self.pending_verdict {
                    verdict.result = false;
                }
                run.steps.clear();
            } else {
                warn!("pricing error after {action:?}: expected {expected}, read {money}");
            }
        }

        if mode == ModeKind::Costs
            && run.last_balance != UNREADABLE
            && money != UNREADABLE
            && let Some(probe) = run.last_action.as_ref().and_then(Instruction::probe)
        {
            self.observed_costs.record(probe, run.last_balance - money);
        }

        let head = run.steps.front().cloned();
        let head_kind = head.as_ref().map(Instruction::kind);
        let mut dispatched = None;
        let mut this_cost = 0;
        let mut skipping = false;

        if mode == ModeKind::Validate
            && matches!(head_kind, Some(ActionKind::AwaitRound | ActionKind::Speed))
        {
            run.steps.pop_front();
        } else if money == UNREADABLE
            || (round == UNREADABLE && head_kind == Some(ActionKind::AwaitRound))
        {
            warn!("recognition error: money {money_text:?}, round {round_text:?}");
        } else if mode != ModeKind::Costs && expected > money {
            warn!("cash recognition error: expected at least {expected}, read {money}");
            skipping = true;
        } else if mode != ModeKind::Costs
            && head_kind == Some(ActionKind::AwaitRound)
            && run.last_round != UNREADABLE
            && (round - run.last_round > 1 || run.last_round > round)
        {
            warn!("round recognition error: read {round} after {}", run.last_round);
            skipping = true;
        } else if let Some(step) = head {
            let ctx = DispatchContext {
                money,
                expected_balance: expected,
                round,
                gamemode,
                validating: mode == ModeKind::Validate,
            };
            if dispatch_ready(&step, &run.steps, &ctx) {
                run.steps.pop_front();
                if !matches!(step.kind(), ActionKind::Sell | ActionKind::AwaitRound) {
                    this_cost = step.cost();
                }
                debug!("dispatching {step}");
                self.dispatch(run, &step)?;
                dispatched = Some(step);
            }
        } else if matches!(mode, ModeKind::Validate | ModeKind::Costs) && run.last_cost == 0 {
            info!("all instructions of {} executed", run.playthrough.key);
            status::settle();
            return Ok(Flow::Done);
        }

        if run.steps.is_empty()
            || (!run.do_all_before_start
                && gamemode != Gamemode::Deflation
                && !skipping
                && next_spending_cost(&run.steps) > money.min(expected))
        {
            self.match_speed(run.fast, frame)?;
        }

        run.last_balance = money;
        run.last_cost = this_cost;
        run.last_action = dispatched;
        run.last_round = round;
        Ok(Flow::Pending)
    }

    fn dispatch(&mut self, run: &mut GameRun, step: &Instruction) -> Result<(), ReplayError> {
        match step {
            Instruction::Place(place) => {
                self.host.move_cursor(place.position)?;
                self.host.sleep(ACTION_DELAY);
                self.host.send_key(&place.key)?;
                self.host.sleep(ACTION_DELAY);
                self.host.click_here()?;
            }
            Instruction::Upgrade(_) | Instruction::Retarget(_) | Instruction::Special(_) => {
                let (name, position) = match step {
                    Instruction::Upgrade(s) => (s.name.as_str(), s.position),
                    Instruction::Retarget(s) => (s.name.as_str(), s.position),
                    Instruction::Special(s) => (s.name.as_str(), s.position),
                    _ => return Ok(()),
                };
                let mortar = run.playthrough.is_mortar(name);
                self.host.click(position)?;
                self.host.sleep(ACTION_DELAY);
                self.apply_to_selected(step, mortar)?;
                while let Some(next) = run.steps.front()
                    && chains_with(next, name)
                {
                    let next = next.clone();
                    run.steps.pop_front();
                    debug!("dispatching {next}");
                    self.apply_to_selected(&next, mortar)?;
                }
                self.host.send_key(&KeyCode::escape())?;
            }
            Instruction::Sell(sell) => {
                self.host.click(sell.position)?;
                self.host.sleep(ACTION_DELAY);
                self.host.send_key(&sell.key)?;
            }
            Instruction::RemoveObstacle { position, .. } => {
                self.host.click(*position)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                let frame = self.host.capture_screen()?;
                let (diff, at) = self
                    .host
                    .locate_template(&frame, &Template::RemoveObstacleConfirm)?;
                debug!("obstacle confirm button at {at} (diff {diff:.3})");
                self.host.click(at)?;
            }
            Instruction::Click { position, .. } => self.host.click(*position)?,
            Instruction::Speed { speed } => run.fast = *speed == GameSpeed::Fast,
            Instruction::AwaitRound { .. } => {}
        }
        Ok(())
    }

    /// Acts on the monkey whose upgrade panel is open.
    fn apply_to_selected(&mut self, step: &Instruction, mortar: bool) -> Result<(), ReplayError> {
        match step {
            Instruction::Upgrade(upgrade) => self.host.send_key(&upgrade.key)?,
            Instruction::Special(special) => self.host.send_key(&special.key)?,
            Instruction::Retarget(retarget) => match retarget.to {
                Some(to) => {
                    self.host.move_cursor(to)?;
                    self.host.sleep(SMALL_ACTION_DELAY);
                    self.host.send_key(&retarget.key)?;
                    if mortar {
                        self.host.click_here()?;
                    }
                }
                None => self.host.send_key(&retarget.key)?,
            },
            Instruction::Click { position, .. } => {
                self.host.sleep(ACTION_DELAY);
                self.host.click(*position)?;
                self.host.sleep(ACTION_DELAY);
            }
            _ => {}
        }
        self.host.sleep(SMALL_ACTION_DELAY);
        Ok(())
    }

    fn match_speed(&mut self, fast: bool, frame: &H::Frame) -> Result<(), ReplayError> {
        let Some(observed) = classify_game_state(&mut self.host, frame, &self.areas.compare)? else {
            return Ok(());
        };
        let wanted = if fast {
            GameStateKind::PlayingFast
        } else {
            GameStateKind::PlayingSlow
        };
        if observed == wanted {
            return Ok(());
        }
        match self.data.keybinds.other("play") {
            Some(key) => {
                debug!("game is {observed:?}, want {wanted:?}");
                self.host.send_key(key)?;
            }
            None => warn!("no key bound for others.play; cannot change game speed"),
        }
        Ok(())
    }

    fn finish_game(&mut self, run: &mut GameRun, outcome: Outcome) -> Result<Flow, ReplayError> {
        status::settle();
        run.time.stop(self.host.elapsed());
        let playthrough = Rc::clone(&run.playthrough);
        let elapsed = run.time.total();
        if self.plan.record_stats {
            self.recorder
                .record_attempt(
                    &self.store,
                    &playthrough.key,
                    playthrough.gamemode,
                    outcome,
                    elapsed,
                )
                .map_err(ReplayError::storage)?;
        }
        self.summary.games_played += 1;
        self.summary
            .log
            .record(&playthrough.key, playthrough.gamemode, outcome);

        match outcome {
            Outcome::Win => {
                self.summary.wins += 1;
                info!(
                    "won {} on {} in {:.1}s",
                    playthrough.gamemode,
                    playthrough.map,
                    elapsed.as_secs_f64()
                );
                if !self.plan.resuming
                    && self
                        .profile
                        .set_medal_unlocked(&playthrough.map, playthrough.gamemode, true)
                {
                    self.store
                        .save_profile(&self.profile)
                        .map_err(ReplayError::storage)?;
                }
                Ok(Flow::Done)
            }
            Outcome::Defeat => {
                self.summary.defeats += 1;
                warn!("lost {} on {}", playthrough.gamemode, playthrough.map);
                if let Some(verdict) = &mut self.pending_verdict {
                    verdict.result = false;
                }
                Ok(Flow::ObjectiveFailed)
            }
        }
    }
}
