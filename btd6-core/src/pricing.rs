//! In-game price arithmetic.
//!
//! These rules reproduce the game's own rounding exactly; recorded playthroughs
//! are validated against observed balances, so any drift shows up as a
//! pricing error during replay.

use crate::constants::{
    DIFFICULTY_FACTOR_EASY, DIFFICULTY_FACTOR_HARD, DIFFICULTY_FACTOR_MEDIUM,
    FIRST_SPIKE_NAME, FIRST_SPIKE_REDUCTION, HERO_FAVORS_FACTOR, IMPOPPABLE_FACTOR,
    PRICE_ROUNDING_STEP, SELL_RATIO, SPIKE_TYPE,
};
use crate::gamemode::{Difficulty, Gamemode};

/// Monkey knowledge that changes prices, resolved for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnowledgeModifiers {
    pub hero_favors: bool,
    pub first_last_line_of_defense: bool,
}

impl KnowledgeModifiers {
    pub const NONE: Self = Self {
        hero_favors: false,
        first_last_line_of_defense: false,
    };
}

/// What is being bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purchase<'a> {
    PlaceMonkey { tower: &'a str, name: &'a str },
    PlaceHero,
    Upgrade,
}

#[must_use]
pub const fn difficulty_factor(difficulty: Difficulty, gamemode: Gamemode) -> f64 {
    if matches!(gamemode, Gamemode::Impoppable) {
        return IMPOPPABLE_FACTOR;
    }
    match difficulty {
        Difficulty::Easy => DIFFICULTY_FACTOR_EASY,
        Difficulty::Medium => DIFFICULTY_FACTOR_MEDIUM,
        Difficulty::Hard => DIFFICULTY_FACTOR_HARD,
    }
}

/// Adjusted price of a placement or upgrade.
///
/// Discount, difficulty and knowledge factors are applied in that order, the
/// result is rounded to a multiple of five, then flat reductions are subtracted.
/// Knowledge never applies on CHIMPS.
#[must_use]
pub fn adjusted_price(
    base_price: i64,
    difficulty: Difficulty,
    gamemode: Gamemode,
    purchase: Purchase<'_>,
    knowledge: KnowledgeModifiers,
    discount_percent: Option<u8>,
) -> i64 {
    let discount = discount_percent.map_or(0.0, |pct| f64::from(pct) / 100.0);
    let factor = difficulty_factor(difficulty, gamemode);
    let knowledge_applies = gamemode != Gamemode::Chimps;

    let mut additional_factor = 1.0;
    let mut reduction = 0;
    match purchase {
        Purchase::PlaceHero if knowledge_applies && knowledge.hero_favors => {
            additional_factor = HERO_FAVORS_FACTOR;
        }
        Purchase::PlaceMonkey { tower, name }
            if knowledge_applies
                && knowledge.first_last_line_of_defense
                && tower == SPIKE_TYPE
                && name == FIRST_SPIKE_NAME =>
        {
            reduction = FIRST_SPIKE_REDUCTION;
        }
        _ => {}
    }

    #[allow(clippy::cast_precision_loss)]
    let raw = base_price as f64 * (1.0 - discount) * factor * additional_factor / PRICE_ROUNDING_STEP;
    #[allow(clippy::cast_possible_truncation)]
    let rounded = raw.round_ties_even() as i64 * PRICE_ROUNDING_STEP as i64;
    rounded - reduction
}

/// Refund for selling a monkey whose purchases add up to `value`.
#[must_use]
pub fn sell_value(value: i64) -> i64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let refund = (value as f64 * SELL_RATIO).round_ties_even() as i64;
    refund
}

/// Prices every purchase of one playthrough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingModel {
    pub difficulty: Difficulty,
    pub gamemode: Gamemode,
    pub knowledge: KnowledgeModifiers,
}

impl PricingModel {
    #[must_use]
    pub const fn new(difficulty: Difficulty, gamemode: Gamemode, knowledge: KnowledgeModifiers) -> Self {
        Self {
            difficulty,
            gamemode,
            knowledge,
        }
    }

    #[must_use]
    pub fn price(&self, base_price: i64, purchase: Purchase<'_>, discount_percent: Option<u8>) -> i64 {
        adjusted_price(
            base_price,
            self.difficulty,
            self.gamemode,
            purchase,
            self.knowledge,
            discount_percent,
        )
    }
}
