//! Menu navigation: getting home, into a game, picking a hero, finding event maps.

use super::driver::ReplayDriver;
use super::screens::Screen;
use super::{Flow, ReplayError, RunMode};
use crate::Persistence;
use crate::capabilities::{Host, Template};
use crate::catalog::highest_value;
use crate::constants::{
    BASE_RESOLUTION, COLLECTION_MATCH_THRESHOLD, DISMISS_CLICK, GOLDEN_BLOON_EVENT,
    GOLDEN_BLOON_PAGE_WAIT, INSTA_MATCH_THRESHOLD, MENU_CHANGE_DELAY, TRANSIENT_SCREEN_WAIT,
};
use crate::data::KeyCode;
use crate::gamemode::MapCategory;
use crate::geometry::Point;
use log::{debug, info, warn};
use std::rc::Rc;

/// Bound on insta claims per chest; a chest holds a handful at most.
const MAX_INSTA_CLAIMS: usize = 16;

/// Index of the closest slot lying strictly above and left of `at`.
#[must_use]
pub fn nearest_slot_above_left(slots: &[Point], at: Point) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.x < at.x && slot.y < at.y)
        .min_by(|(_, a), (_, b)| a.distance(at).total_cmp(&b.distance(at)))
        .map(|(index, _)| index)
}

impl<H: Host, P: Persistence> ReplayDriver<'_, H, P> {
    /// Waits out one unknown frame, escapes on the second.
    fn tolerate_unknown(&mut self) -> Result<(), ReplayError> {
        if self.last_screen == Screen::Unknown && self.waited_on_unknown {
            self.waited_on_unknown = false;
            self.host.send_key(&KeyCode::escape())?;
        } else {
            self.waited_on_unknown = true;
            self.host.sleep(TRANSIENT_SCREEN_WAIT);
        }
        Ok(())
    }

    /// Clears overlays that can pop up over any screen.
    pub(super) fn dismiss_transient(&mut self, screen: Screen) -> Result<(), ReplayError> {
        let dismiss = DISMISS_CLICK.scaled(BASE_RESOLUTION, self.session.resolution);
        match screen {
            Screen::Unknown => self.tolerate_unknown()?,
            Screen::Levelup => {
                self.host.click(dismiss)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(dismiss)?;
            }
            Screen::Round100Insta => {
                self.host.click(dismiss)?;
                self.host.sleep(MENU_CHANGE_DELAY);
            }
            Screen::CollectionClaimChest => self.claim_chest()?,
            Screen::ApopalypseHint => self
                .host
                .click(self.areas.click.gamemode_apopalypse_message_confirmation)?,
            _ => {}
        }
        Ok(())
    }

    fn claim_chest(&mut self) -> Result<(), ReplayError> {
        let Some(chest) = self.areas.click.collection_claim_chest else {
            warn!("no click position for the collection chest; escaping");
            self.host.send_key(&KeyCode::escape())?;
            return Ok(());
        };
        self.host.click(chest)?;
        self.host.sleep(MENU_CHANGE_DELAY * 2);
        for _ in 0..MAX_INSTA_CLAIMS {
            let frame = self.host.capture_screen()?;
            let (diff, at) = self.host.locate_template(&frame, &Template::UnknownInsta)?;
            if diff >= INSTA_MATCH_THRESHOLD {
                break;
            }
            debug!("revealing insta at {at}");
            self.host.click(at)?;
            self.host.sleep(MENU_CHANGE_DELAY);
            self.host.click(at)?;
            self.host.sleep(MENU_CHANGE_DELAY);
        }
        self.host.click(self.session.resolution.center())?;
        self.host.sleep(MENU_CHANGE_DELAY);
        self.host.send_key(&KeyCode::escape())?;
        Ok(())
    }

    pub(super) fn goto_home(&mut self, screen: Screen) -> Result<Flow, ReplayError> {
        let click = &self.areas.click;
        match screen {
            Screen::Startmenu => return Ok(Flow::Done),
            Screen::Ingame
            | Screen::OverwriteSave
            | Screen::HeroSelection
            | Screen::GamemodeSelection
            | Screen::DifficultySelection
            | Screen::MapSelection => self.host.send_key(&KeyCode::escape())?,
            Screen::IngamePaused => {
                let home = click.screen_ingame_paused_button_home;
                self.host.click(home)?;
            }
            Screen::Defeat => {
                let frame = self.host.capture_screen()?;
                let (_, at) = self.host.locate_template(&frame, &Template::HomeButton)?;
                self.host.click(at)?;
            }
            Screen::VictorySummary => {
                let next = click.screen_victory_summary_button_next;
                self.host.click(next)?;
            }
            Screen::Victory => {
                let home = click.screen_victory_button_home;
                self.host.click(home)?;
            }
            other => self.dismiss_transient(other)?,
        }
        Ok(Flow::Pending)
    }

    pub(super) fn goto_ingame(&mut self, screen: Screen) -> Result<Flow, ReplayError> {
        let Some(playthrough) = self.current_playthrough() else {
            warn!("goto_ingame without a playthrough");
            return Ok(Flow::ObjectiveFailed);
        };
        match screen {
            Screen::Startmenu => {
                let click = &self.areas.click;
                let (Some(&reset), Some(&category), Some(&slot), Some(&difficulty), Some(gamemode)) = (
                    click.map_categories.get(&playthrough.category.reset_tab()),
                    click.map_categories.get(&playthrough.category),
                    click.map_positions.get(playthrough.slot),
                    click.gamedifficulty_positions.get(&playthrough.difficulty),
                    click.gamemode_position(playthrough.gamemode),
                ) else {
                    warn!(
                        "missing click positions for {} {} at {}",
                        playthrough.map, playthrough.gamemode, self.session.resolution
                    );
                    return Ok(Flow::ObjectiveFailed);
                };
                let play = click.screen_startmenu_button_play;
                self.host.click(play)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(reset)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(category)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                for _ in 0..playthrough.page {
                    self.host.click(category)?;
                    self.host.sleep(MENU_CHANGE_DELAY);
                }
                self.host.click(slot)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(difficulty)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(gamemode)?;
                Ok(Flow::Pending)
            }
            Screen::OverwriteSave => {
                let ok = self.areas.click.screen_overwrite_save_button_ok;
                self.host.click(ok)?;
                Ok(Flow::Pending)
            }
            Screen::ApopalypseHint => {
                self.dismiss_transient(screen)?;
                Ok(Flow::Pending)
            }
            Screen::Ingame => {
                info!(
                    "in game: {} - {}",
                    playthrough.map, playthrough.gamemode
                );
                Ok(Flow::Done)
            }
            Screen::Unknown => Ok(Flow::Pending),
            other => {
                debug!("goto_ingame expects the start menu, saw {other}");
                Ok(Flow::StateFailed)
            }
        }
    }

    pub(super) fn select_hero(&mut self, screen: Screen) -> Result<Flow, ReplayError> {
        match screen {
            Screen::Startmenu => {
                let Some(hero) = self.current_playthrough().and_then(|p| p.hero.clone()) else {
                    return Ok(Flow::Done);
                };
                let Some(&position) = self.areas.click.hero_positions.get(&hero) else {
                    warn!("no click position for hero {hero}");
                    return Ok(Flow::ObjectiveFailed);
                };
                let open = self.areas.click.screen_startmenu_button_hero_selection;
                let confirm = self.areas.click.screen_hero_selection_select_hero;
                self.host.click(open)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(position)?;
                self.host.sleep(MENU_CHANGE_DELAY);
                self.host.click(confirm)?;
                info!("selected hero {hero}");
                self.last_hero = Some(hero);
                Ok(Flow::Done)
            }
            Screen::Unknown => Ok(Flow::Pending),
            other => {
                debug!("select_hero expects the start menu, saw {other}");
                Ok(Flow::StateFailed)
            }
        }
    }

    /// Pages through map categories looking for the collection event icon.
    pub(super) fn find_map(&mut self, screen: Screen) -> Result<Flow, ReplayError> {
        match screen {
            Screen::Startmenu => {}
            Screen::Unknown => return Ok(Flow::Pending),
            other => {
                debug!("find_map expects the start menu, saw {other}");
                return Ok(Flow::StateFailed);
            }
        }
        let RunMode::Chase(target) = &self.plan.mode else {
            return Ok(Flow::ObjectiveFailed);
        };
        let event = target.event.clone();
        let categories: Vec<MapCategory> = match target.category {
            Some(category) => vec![category],
            None => self.data.categories().into_iter().rev().collect(),
        };
        let page_wait = if event == GOLDEN_BLOON_EVENT {
            GOLDEN_BLOON_PAGE_WAIT
        } else {
            MENU_CHANGE_DELAY
        };

        let play = self.areas.click.screen_startmenu_button_play;
        self.host.click(play)?;
        self.host.sleep(MENU_CHANGE_DELAY);

        for (index, category) in categories.into_iter().enumerate() {
            let Some(&tab) = self.areas.click.map_categories.get(&category) else {
                warn!("no click position for category {category}");
                return Ok(Flow::ObjectiveFailed);
            };
            if index == 0
                && let Some(&reset) = self.areas.click.map_categories.get(&category.reset_tab())
            {
                self.host.click(reset)?;
                self.host.sleep(MENU_CHANGE_DELAY);
            }

            let Some(map) = self.scan_category(category, tab, &event, page_wait)? else {
                warn!("no map with increased rewards in {category}");
                return Ok(Flow::ObjectiveFailed);
            };
            info!("increased rewards in {category}: {map}");

            let RunMode::Chase(target) = &self.plan.mode else {
                return Ok(Flow::ObjectiveFailed);
            };
            let best = highest_value(
                &target.catalog,
                &map,
                self.data,
                self.recorder.stats(),
                &self.summary.log,
                !self.session.monkey_knowledge_enabled,
            )
            .cloned();
            let Some(entry) = best else {
                info!("no playthrough for {map}; trying easier maps");
                continue;
            };
            match self.parse(&entry.path, Some(entry.gamemode)) {
                Ok(playthrough) => {
                    info!("chasing with {} as {}", entry.key, entry.gamemode);
                    self.chase_found = Some(Rc::new(playthrough));
                    return Ok(Flow::Done);
                }
                Err(err) => {
                    warn!("cannot load {}: {err}", entry.key);
                    return Ok(Flow::ObjectiveFailed);
                }
            }
        }
        warn!("no usable playthrough for any map with increased rewards");
        Ok(Flow::ObjectiveFailed)
    }

    /// Clicks through the pages of `category` until the event icon shows up.
    fn scan_category(
        &mut self,
        category: MapCategory,
        tab: Point,
        event: &str,
        page_wait: std::time::Duration,
    ) -> Result<Option<String>, ReplayError> {
        let icon = Template::Collection(event.to_string());
        for page in 0..self.data.category_pages(category) {
            self.host.click(tab)?;
            self.host.sleep(page_wait);
            let frame = self.host.capture_screen()?;
            let (diff, at) = self.host.locate_template(&frame, &icon)?;
            if diff >= COLLECTION_MATCH_THRESHOLD {
                continue;
            }
            let slot = nearest_slot_above_left(&self.areas.click.map_positions, at);
            let map = slot.and_then(|slot| self.data.map_at(category, page, slot));
            if map.is_none() {
                warn!("event icon at {at} on {category} page {page} matches no map slot");
            }
            return Ok(map.map(str::to_string));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_maps_to_the_closest_slot_above_left() {
        let slots = [
            Point::new(100, 100),
            Point::new(300, 100),
            Point::new(100, 300),
            Point::new(300, 300),
        ];
        assert_eq!(nearest_slot_above_left(&slots, Point::new(350, 180)), Some(1));
        assert_eq!(nearest_slot_above_left(&slots, Point::new(320, 320)), Some(3));
        assert_eq!(nearest_slot_above_left(&slots, Point::new(150, 310)), Some(2));
        assert_eq!(nearest_slot_above_left(&slots, Point::new(50, 50)), None);
    }

    #[test]
    fn icon_on_a_slot_edge_belongs_to_the_slot_before_it() {
        let slots = [Point::new(100, 100), Point::new(300, 100), Point::new(100, 300)];
        assert_eq!(nearest_slot_above_left(&slots, Point::new(300, 150)), Some(0));
        assert_eq!(nearest_slot_above_left(&slots, Point::new(150, 300)), Some(0));
        assert_eq!(nearest_slot_above_left(&slots, Point::new(100, 100)), None);
    }
}
