//! Per-run settings threaded through the parser, catalog and driver.

use crate::constants::{KNOWLEDGE_FIRST_LAST_LINE, KNOWLEDGE_HERO_FAVORS};
use crate::geometry::Resolution;
use crate::pricing::KnowledgeModifiers;
use crate::profile::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Set by `--mk`; playthroughs relying on monkey knowledge are only used when on.
    pub monkey_knowledge_enabled: bool,
    pub resolution: Resolution,
}

impl Session {
    #[must_use]
    pub const fn new(monkey_knowledge_enabled: bool, resolution: Resolution) -> Self {
        Self {
            monkey_knowledge_enabled,
            resolution,
        }
    }

    /// Knowledge modifiers in effect: enabled for the run and owned by the player.
    #[must_use]
    pub fn knowledge(&self, profile: &UserProfile) -> KnowledgeModifiers {
        if !self.monkey_knowledge_enabled {
            return KnowledgeModifiers::NONE;
        }
        KnowledgeModifiers {
            hero_favors: profile.has_knowledge(KNOWLEDGE_HERO_FAVORS),
            first_last_line_of_defense: profile.has_knowledge(KNOWLEDGE_FIRST_LAST_LINE),
        }
    }
}
