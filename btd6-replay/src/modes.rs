//! Positional mode words and the legacy single-dash flags.

use anyhow::{Context, Result, bail};
use btd6_core::{Gamemode, MapCategory, Planner, Resume, ResumeFrom, RunPlan};
use std::str::FromStr;

/// Single-dash flags accepted anywhere on the command line, with their long form.
const LEGACY_FLAGS: [(&str, &str); 6] = [
    ("-ns", "--no-stats"),
    ("-mk", "--mk"),
    ("-nomk", "--no-mk"),
    ("-nv", "--include-unvalidated"),
    ("-r", "--repeat"),
    ("-l", "--list"),
];

/// Moves legacy and boolean run flags in front of the mode words, in long form.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let program = args.next();
    let (flags, words): (Vec<String>, Vec<String>) = args.partition(|arg| {
        LEGACY_FLAGS
            .iter()
            .any(|(legacy, long)| arg == legacy || arg == long)
    });
    let flags = flags.into_iter().map(|flag| {
        LEGACY_FLAGS
            .iter()
            .find(|(legacy, _)| *legacy == flag)
            .map_or(flag, |(_, long)| (*long).to_string())
    });
    program.into_iter().chain(flags).chain(words).collect()
}

/// The run mode requested by the positional words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeRequest {
    File {
        name: String,
        gamemode: Option<Gamemode>,
        resume: Option<Resume>,
    },
    Random {
        category: Option<MapCategory>,
        gamemode: Option<Gamemode>,
    },
    Chase {
        event: String,
        category: Option<MapCategory>,
        gamemode: Option<Gamemode>,
    },
    Xp(usize),
    MonkeyMoney(usize),
    ValidateFile(String),
    ValidateAll(Option<MapCategory>),
    Costs {
        heroes: bool,
    },
}

impl ModeRequest {
    /// Unit of the ranking value shown when listing.
    pub const fn value_unit(&self) -> &'static str {
        match self {
            Self::Xp(_) => "XP/h",
            Self::MonkeyMoney(_) => "MM/h",
            _ => "",
        }
    }

    /// Builds the run plan.
    ///
    /// # Errors
    ///
    /// Returns planner errors: unknown files, empty pools, incompatible gamemodes.
    pub fn plan(&self, planner: &Planner<'_>, known_events: &[String]) -> Result<RunPlan> {
        let plan = match self {
            Self::File {
                name,
                gamemode,
                resume,
            } => planner.single(name, *gamemode, *resume)?,
            Self::Random { category, gamemode } => planner.random(*category, *gamemode)?,
            Self::Chase {
                event,
                category,
                gamemode,
            } => planner.chase(event, *category, *gamemode, known_events)?,
            Self::Xp(n) => planner.xp(*n)?,
            Self::MonkeyMoney(n) => planner.monkey_money(*n)?,
            Self::ValidateFile(name) => planner.validate_file(name)?,
            Self::ValidateAll(category) => planner.validate_all(*category)?,
            Self::Costs { heroes } => planner.costs(*heroes)?,
        };
        Ok(plan)
    }
}

/// Cursor over the mode words.
struct Words<'a> {
    words: &'a [String],
    next: usize,
}

impl<'a> Words<'a> {
    const fn new(words: &'a [String]) -> Self {
        Self { words, next: 0 }
    }

    fn take(&mut self) -> Option<&'a str> {
        let word = self.words.get(self.next)?;
        self.next += 1;
        Some(word.as_str())
    }

    /// Consumes the next word only if it parses as `T`.
    fn take_parsed<T: FromStr>(&mut self) -> Option<T> {
        let value = self.words.get(self.next)?.parse().ok()?;
        self.next += 1;
        Some(value)
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        let matched = self.words.get(self.next).is_some_and(|word| word == keyword);
        if matched {
            self.next += 1;
        }
        matched
    }

    fn rest(&self) -> &'a [String] {
        &self.words[self.next.min(self.words.len())..]
    }
}

/// Parses `<mode> <mode arguments…>`; leftover words are an error.
///
/// # Errors
///
/// Returns an error for a missing or unknown mode, missing mode arguments or
/// unrecognized leftovers.
pub fn parse_mode(words: &[String]) -> Result<ModeRequest> {
    let mut words = Words::new(words);
    let Some(mode) = words.take() else {
        bail!("arguments missing; usage: btd6-replay [flags] <mode> <mode arguments...>");
    };
    let request = match mode {
        "file" => {
            let name = words.take().context("no playthrough file given")?.to_string();
            let gamemode = words.take_parsed();
            let resume = if words.take_keyword("continue") {
                Some(parse_resume(&mut words)?)
            } else {
                None
            };
            ModeRequest::File {
                name,
                gamemode,
                resume,
            }
        }
        "random" => ModeRequest::Random {
            category: words.take_parsed(),
            gamemode: words.take_parsed(),
        },
        "chase" => ModeRequest::Chase {
            event: words.take().context("no collection event given")?.to_string(),
            category: words.take_parsed(),
            gamemode: words.take_parsed(),
        },
        "xp" => ModeRequest::Xp(words.take_parsed().unwrap_or(1)),
        "mm" | "monkey_money" => ModeRequest::MonkeyMoney(words.take_parsed().unwrap_or(1)),
        "validate" => match words.take() {
            Some("file") => ModeRequest::ValidateFile(
                words.take().context("no playthrough file given")?.to_string(),
            ),
            Some("all") => ModeRequest::ValidateAll(words.take_parsed()),
            _ => bail!("validate expects `file <name>` or `all [category]`"),
        },
        "costs" => ModeRequest::Costs {
            heroes: words.take_keyword("+heroes"),
        },
        other => bail!("unknown mode {other:?}"),
    };

    let leftovers = words.rest();
    if !leftovers.is_empty() {
        bail!("unrecognized arguments: {}", leftovers.join(" "));
    }
    Ok(request)
}

fn parse_resume(words: &mut Words<'_>) -> Result<Resume> {
    let from = match words.take() {
        Some("-") => ResumeFrom::BeforeStart,
        Some(offset) => ResumeFrom::Step(
            offset
                .parse()
                .with_context(|| format!("continue needs an instruction offset, got {offset:?}"))?,
        ),
        None => bail!("continue needs an instruction offset or `-`"),
    };
    let until = if words.take_keyword("until") {
        let last = words.take().context("until needs an instruction index")?;
        Some(
            last.parse()
                .with_context(|| format!("until needs an instruction index, got {last:?}"))?,
        )
    } else {
        None
    };
    Ok(Resume { from, until })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn legacy_flags_move_ahead_of_the_mode() {
        let args = normalize_legacy_flags(words("btd6-replay file logs#easy#2560x1440.btd6 -nomk -r -ns"));
        assert_eq!(
            args,
            words("btd6-replay --no-mk --repeat --no-stats file logs#easy#2560x1440.btd6")
        );
        let args = normalize_legacy_flags(words("btd6-replay --mk -l xp 5"));
        assert_eq!(args, words("btd6-replay --mk --list xp 5"));
    }

    #[test]
    fn file_mode_with_gamemode_and_resume() {
        let request =
            parse_mode(&words("file logs#hard#2560x1440.btd6 chimps continue 4 until 9")).unwrap();
        assert_eq!(
            request,
            ModeRequest::File {
                name: "logs#hard#2560x1440.btd6".to_string(),
                gamemode: Some(Gamemode::Chimps),
                resume: Some(Resume {
                    from: ResumeFrom::Step(4),
                    until: Some(9),
                }),
            }
        );
        let request = parse_mode(&words("file logs#hard#2560x1440.btd6 continue -")).unwrap();
        assert!(matches!(
            request,
            ModeRequest::File { resume: Some(Resume { from: ResumeFrom::BeforeStart, until: None }), .. }
        ));
    }

    #[test]
    fn optional_words_are_typed() {
        assert_eq!(
            parse_mode(&words("random expert hard")).unwrap(),
            ModeRequest::Random {
                category: Some(MapCategory::Expert),
                gamemode: Some(Gamemode::Hard),
            }
        );
        assert_eq!(
            parse_mode(&words("random chimps")).unwrap(),
            ModeRequest::Random {
                category: None,
                gamemode: Some(Gamemode::Chimps),
            }
        );
        assert_eq!(parse_mode(&words("xp")).unwrap(), ModeRequest::Xp(1));
        assert_eq!(parse_mode(&words("monkey_money 3")).unwrap(), ModeRequest::MonkeyMoney(3));
        assert_eq!(
            parse_mode(&words("validate all beginner")).unwrap(),
            ModeRequest::ValidateAll(Some(MapCategory::Beginner))
        );
        assert_eq!(
            parse_mode(&words("costs +heroes")).unwrap(),
            ModeRequest::Costs { heroes: true }
        );
    }

    #[test]
    fn leftovers_and_missing_arguments_fail() {
        let err = parse_mode(&words("xp 3 expert")).unwrap_err();
        assert!(err.to_string().contains("unrecognized arguments: expert"));
        assert!(parse_mode(&words("random everything")).is_err());
        assert!(parse_mode(&words("file")).is_err());
        assert!(parse_mode(&words("file logs#easy#2560x1440.btd6 continue")).is_err());
        assert!(parse_mode(&words("file logs#easy#2560x1440.btd6 continue x")).is_err());
        assert!(parse_mode(&words("validate")).is_err());
        assert!(parse_mode(&words("achievements")).is_err());
        assert!(parse_mode(&[]).is_err());
    }
}
