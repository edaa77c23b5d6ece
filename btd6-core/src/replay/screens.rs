//! Screen classification against reference templates.

use crate::capabilities::{DeviceError, Template, Vision};
use crate::constants::SCREEN_MATCH_THRESHOLD;
use crate::data::CompareAreas;
use std::fmt;

/// What the game currently shows. Observed each tick, never driven directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Screen {
    Unknown,
    Startmenu,
    MapSelection,
    DifficultySelection,
    GamemodeSelection,
    HeroSelection,
    Ingame,
    IngamePaused,
    VictorySummary,
    Victory,
    Defeat,
    OverwriteSave,
    Levelup,
    ApopalypseHint,
    Round100Insta,
    CollectionClaimChest,
    Unfocused,
}

impl Screen {
    /// Classified screens in matching order; earlier entries win ties.
    pub const CLASSIFIED: [Self; 15] = [
        Self::Startmenu,
        Self::MapSelection,
        Self::DifficultySelection,
        Self::GamemodeSelection,
        Self::HeroSelection,
        Self::Ingame,
        Self::IngamePaused,
        Self::VictorySummary,
        Self::Victory,
        Self::Defeat,
        Self::OverwriteSave,
        Self::Levelup,
        Self::ApopalypseHint,
        Self::Round100Insta,
        Self::CollectionClaimChest,
    ];

    /// Reference image and compare-area name.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Startmenu => "startmenu",
            Self::MapSelection => "map_selection",
            Self::DifficultySelection => "difficulty_selection",
            Self::GamemodeSelection => "gamemode_selection",
            Self::HeroSelection => "hero_selection",
            Self::Ingame => "ingame",
            Self::IngamePaused => "ingame_paused",
            Self::VictorySummary => "victory_summary",
            Self::Victory => "victory",
            Self::Defeat => "defeat",
            Self::OverwriteSave => "overwrite_save",
            Self::Levelup => "levelup",
            Self::ApopalypseHint => "apopalypse_hint",
            Self::Round100Insta => "round_100_insta",
            Self::CollectionClaimChest => "collection_claim_chest",
            Self::Unfocused => "btd6_unfocused",
        }
    }

    /// Screens whose reference image must exist for any mode to run.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(
            self,
            Self::Unknown | Self::Unfocused | Self::CollectionClaimChest
        )
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// Game speed indicator shown in the corner while in game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameStateKind {
    PlayingFast,
    PlayingSlow,
    Paused,
}

impl GameStateKind {
    pub const ALL: [Self; 3] = [Self::PlayingFast, Self::PlayingSlow, Self::Paused];

    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::PlayingFast => "game_playing_fast",
            Self::PlayingSlow => "game_playing_slow",
            Self::Paused => "game_paused",
        }
    }
}

/// Best-matching screen under the similarity threshold, or [`Screen::Unknown`].
///
/// Screens without a loaded reference or compare area are skipped.
///
/// # Errors
///
/// Propagates failures of the vision backend.
pub fn classify<V: Vision>(
    vision: &mut V,
    frame: &V::Frame,
    compare: &CompareAreas,
) -> Result<Screen, DeviceError> {
    let mut best: Option<(f64, Screen)> = None;
    for screen in Screen::CLASSIFIED {
        let template = Template::Screen(screen);
        let Some(area) = compare.screens.get(screen.template_name()) else {
            continue;
        };
        if !vision.has_template(&template) {
            continue;
        }
        let diff = vision.match_template(frame, *area, &template)?;
        if diff < SCREEN_MATCH_THRESHOLD && best.is_none_or(|(best_diff, _)| diff < best_diff) {
            best = Some((diff, screen));
        }
    }
    Ok(best.map_or(Screen::Unknown, |(_, screen)| screen))
}

/// Closest game speed indicator; no threshold applies.
///
/// # Errors
///
/// Propagates failures of the vision backend.
pub fn classify_game_state<V: Vision>(
    vision: &mut V,
    frame: &V::Frame,
    compare: &CompareAreas,
) -> Result<Option<GameStateKind>, DeviceError> {
    let mut best: Option<(f64, GameStateKind)> = None;
    for kind in GameStateKind::ALL {
        let diff = vision.match_template(frame, compare.game_state, &Template::GameState(kind))?;
        if best.is_none_or(|(best_diff, _)| diff < best_diff) {
            best = Some((diff, kind));
        }
    }
    Ok(best.map(|(_, kind)| kind))
}
