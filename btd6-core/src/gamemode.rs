//! Gamemodes, difficulty tiers and map categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownName {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

named_enum! {
    /// Every gamemode a playthrough can be recorded for or replayed as.
    Gamemode, "gamemode" {
        Easy => "easy",
        PrimaryOnly => "primary_only",
        Deflation => "deflation",
        Medium => "medium",
        MilitaryOnly => "military_only",
        Reverse => "reverse",
        Apopalypse => "apopalypse",
        Hard => "hard",
        MagicMonkeysOnly => "magic_monkeys_only",
        DoubleHpMoabs => "double_hp_moabs",
        HalfCash => "half_cash",
        AlternateBloonsRounds => "alternate_bloons_rounds",
        Impoppable => "impoppable",
        Chimps => "chimps",
        EasySandbox => "easy_sandbox",
        MediumSandbox => "medium_sandbox",
        HardSandbox => "hard_sandbox",
    }
}

named_enum! {
    Difficulty, "difficulty" {
        Easy => "easy",
        Medium => "medium",
        Hard => "hard",
    }
}

named_enum! {
    /// Reward tier a gamemode pays out at.
    CashGroup, "cash group" {
        Easy => "easy",
        Medium => "medium",
        Hard => "hard",
        Impoppable => "impoppable",
    }
}

named_enum! {
    MapCategory, "map category" {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
}

impl Gamemode {
    pub const SANDBOXES: [Self; 3] = [Self::EasySandbox, Self::MediumSandbox, Self::HardSandbox];

    /// Parent difficulty of a sandbox gamemode.
    #[must_use]
    pub const fn sandbox_difficulty(self) -> Option<Difficulty> {
        match self {
            Self::EasySandbox => Some(Difficulty::Easy),
            Self::MediumSandbox => Some(Difficulty::Medium),
            Self::HardSandbox => Some(Difficulty::Hard),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_sandbox(self) -> bool {
        self.sandbox_difficulty().is_some()
    }

    /// Gamemodes opening with a dialog that must be confirmed before play.
    #[must_use]
    pub const fn has_start_dialog(self) -> bool {
        matches!(
            self,
            Self::Deflation
                | Self::HalfCash
                | Self::Impoppable
                | Self::Chimps
                | Self::EasySandbox
                | Self::MediumSandbox
                | Self::HardSandbox
        )
    }

    /// The medal whose unlock grants access to this gamemode.
    #[must_use]
    pub const fn prerequisite(self) -> Option<Self> {
        match self {
            Self::PrimaryOnly | Self::EasySandbox => Some(Self::Easy),
            Self::Deflation => Some(Self::PrimaryOnly),
            Self::MilitaryOnly | Self::Reverse => Some(Self::Medium),
            Self::Apopalypse => Some(Self::MilitaryOnly),
            Self::MediumSandbox => Some(Self::Reverse),
            Self::HardSandbox | Self::MagicMonkeysOnly | Self::AlternateBloonsRounds => {
                Some(Self::Hard)
            }
            Self::DoubleHpMoabs => Some(Self::MagicMonkeysOnly),
            Self::HalfCash => Some(Self::DoubleHpMoabs),
            Self::Impoppable => Some(Self::AlternateBloonsRounds),
            Self::Chimps => Some(Self::Impoppable),
            Self::Easy | Self::Medium | Self::Hard => None,
        }
    }

    #[must_use]
    pub const fn is_base_difficulty(self) -> bool {
        matches!(self, Self::Easy | Self::Medium | Self::Hard)
    }
}

impl MapCategory {
    /// Reward multiplier applied to experience for harder map categories.
    #[must_use]
    pub const fn xp_multiplier(self) -> f64 {
        match self {
            Self::Beginner => 1.0,
            Self::Intermediate => 1.1,
            Self::Advanced => 1.2,
            Self::Expert => 1.3,
        }
    }

    /// The category tab clicked first so the target tab's page counter resets.
    #[must_use]
    pub const fn reset_tab(self) -> Self {
        match self {
            Self::Beginner => Self::Advanced,
            _ => Self::Beginner,
        }
    }
}
