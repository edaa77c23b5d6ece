//! Playthrough identity decoded from a file name.
//!
//! `<map>#<gamemode>#<W>x<H>[#<flag>...].btd6`, optionally inside a directory.

use crate::constants::PLAYTHROUGH_EXTENSION;
use crate::gamemode::Gamemode;
use crate::geometry::Resolution;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use thiserror::Error;

static FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<map>\w+)#(?P<gamemode>\w+)#(?P<resolution>\d+x\d+)(?:#(?P<comment>.+))?\.btd6$",
    )
    .expect("playthrough file name regex")
});

static SINGLE_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<kind>[a-z]+)Only$").expect("single type flag regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("{0:?} is not a playthrough file name")]
    Malformed(String),
    #[error("{name:?} names unknown gamemode {gamemode:?}")]
    UnknownGamemode { name: String, gamemode: String },
}

/// Boolean markers carried in the comment part of a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `noMK`: works without monkey knowledge.
    NoMonkeyKnowledge,
    /// `noLL`: no blind micro of the lead-layer kind.
    NoLl,
    /// `noLLwMK`: as `noLL`, when monkey knowledge is on.
    NoLlWithMonkeyKnowledge,
    /// `gB`: survives golden bloon spawns.
    GoldenBloon,
}

impl Flag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMonkeyKnowledge => "noMK",
            Self::NoLl => "noLL",
            Self::NoLlWithMonkeyKnowledge => "noLLwMK",
            Self::GoldenBloon => "gB",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorFlags {
    pub no_monkey_knowledge: bool,
    pub no_ll: bool,
    pub no_ll_with_monkey_knowledge: bool,
    pub golden_bloon: bool,
    /// Tower type named by a `<type>Only` marker.
    pub single_type: Option<String>,
}

impl DescriptorFlags {
    /// Decodes `#`-separated comment tokens; unknown tokens are ignored.
    #[must_use]
    pub fn from_comment(comment: &str) -> Self {
        let mut flags = Self::default();
        for token in comment.split('#') {
            match token {
                "noMK" => flags.no_monkey_knowledge = true,
                "noLL" => flags.no_ll = true,
                "noLLwMK" => flags.no_ll_with_monkey_knowledge = true,
                "gB" => flags.golden_bloon = true,
                other => {
                    if let Some(caps) = SINGLE_TYPE.captures(other) {
                        flags.single_type = Some(caps["kind"].to_string());
                    }
                }
            }
        }
        flags
    }

    #[must_use]
    pub const fn has(&self, flag: Flag) -> bool {
        match flag {
            Flag::NoMonkeyKnowledge => self.no_monkey_knowledge,
            Flag::NoLl => self.no_ll,
            Flag::NoLlWithMonkeyKnowledge => self.no_ll_with_monkey_knowledge,
            Flag::GoldenBloon => self.golden_bloon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaythroughDescriptor {
    pub map: String,
    pub gamemode: Gamemode,
    pub resolution: Resolution,
    pub comment: Option<String>,
    pub flags: DescriptorFlags,
}

impl PlaythroughDescriptor {
    /// Decodes the final component of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name does not follow the playthrough grammar or
    /// names an unknown gamemode.
    pub fn parse(path: &str) -> Result<Self, DescriptorError> {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let caps = FILE_NAME
            .captures(name)
            .ok_or_else(|| DescriptorError::Malformed(path.to_string()))?;
        let gamemode = caps["gamemode"]
            .parse::<Gamemode>()
            .map_err(|_| DescriptorError::UnknownGamemode {
                name: path.to_string(),
                gamemode: caps["gamemode"].to_string(),
            })?;
        let resolution = caps["resolution"]
            .parse::<Resolution>()
            .map_err(|_| DescriptorError::Malformed(path.to_string()))?;
        let comment = caps.name("comment").map(|m| m.as_str().to_string());
        let flags = comment
            .as_deref()
            .map(DescriptorFlags::from_comment)
            .unwrap_or_default();
        Ok(Self {
            map: caps["map"].to_string(),
            gamemode,
            resolution,
            comment,
            flags,
        })
    }

    /// Decodes a path on disk.
    ///
    /// # Errors
    ///
    /// See [`PlaythroughDescriptor::parse`].
    pub fn from_path(path: &Path) -> Result<Self, DescriptorError> {
        Self::parse(&path.to_string_lossy())
    }

    #[must_use]
    pub const fn has_flag(&self, flag: Flag) -> bool {
        self.flags.has(flag)
    }

    /// File name for this descriptor recorded at `resolution`.
    #[must_use]
    pub fn file_name(&self, resolution: Resolution) -> String {
        let comment = self
            .comment
            .as_deref()
            .map(|c| format!("#{c}"))
            .unwrap_or_default();
        format!(
            "{}#{}#{}{}.{}",
            self.map, self.gamemode, resolution, comment, PLAYTHROUGH_EXTENSION
        )
    }
}

/// `<folder>/<file name>` for `descriptor` recorded at `resolution`.
#[must_use]
pub fn playthrough_file_name(
    descriptor: &PlaythroughDescriptor,
    folder: &str,
    resolution: Resolution,
) -> String {
    format!("{folder}/{}", descriptor.file_name(resolution))
}
