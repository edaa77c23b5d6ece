//! Serializes instructions back into the line grammar.

use super::{Instruction, Playthrough};
use crate::descriptor::playthrough_file_name;
use crate::geometry::Resolution;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

fn discount_suffix(discount: Option<u8>) -> String {
    discount.map_or_else(String::new, |pct| format!(" with {pct}% discount"))
}

/// One line per written instruction. Synthetic clicks are omitted.
#[must_use]
pub fn write_instructions(steps: &[Instruction]) -> String {
    let mut out = String::new();
    for step in steps {
        let line = match step {
            Instruction::Place(place) => format!(
                "place {} {} at {}{}",
                place.tower.name(),
                place.name,
                place.position,
                discount_suffix(place.discount)
            ),
            Instruction::Upgrade(upgrade) => format!(
                "upgrade {} path {}{}",
                upgrade.name,
                upgrade.path,
                discount_suffix(upgrade.discount)
            ),
            Instruction::Retarget(retarget) => match retarget.to {
                Some(to) => format!("retarget {} to {to}", retarget.name),
                None => format!("retarget {}", retarget.name),
            },
            Instruction::Special(special) => format!("special {}", special.name),
            Instruction::Sell(sell) => format!("sell {}", sell.name),
            Instruction::RemoveObstacle { position, cost } => {
                format!("remove obstacle at {position} for {cost}")
            }
            Instruction::AwaitRound { round } => format!("round {round}"),
            Instruction::Speed { speed } => format!("speed {}", speed.as_str()),
            Instruction::Click { .. } => continue,
        };
        let _ = writeln!(out, "{line}");
    }
    out
}

/// Writes `playthrough` as `<folder>/<map>#<gamemode>#<resolution>[#comment].btd6`.
///
/// # Errors
///
/// Returns an error if the folder cannot be created or the file cannot be written.
pub fn write_playthrough_file(
    playthrough: &Playthrough,
    folder: &str,
    resolution: Resolution,
) -> io::Result<PathBuf> {
    let name = match &playthrough.descriptor {
        Some(descriptor) => {
            let mut descriptor = descriptor.clone();
            descriptor.gamemode = playthrough.gamemode;
            playthrough_file_name(&descriptor, folder, resolution)
        }
        None => format!(
            "{folder}/{}#{}#{resolution}.{}",
            playthrough.map,
            playthrough.gamemode,
            crate::constants::PLAYTHROUGH_EXTENSION
        ),
    };
    fs::create_dir_all(folder)?;
    let path = PathBuf::from(name);
    fs::write(&path, write_instructions(&playthrough.steps))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::parser::LineParser;
    use crate::gamemode::{Difficulty, Gamemode};
    use crate::pricing::{KnowledgeModifiers, PricingModel};
    use crate::test_support::{fixture_areas, fixture_data};

    #[test]
    fn parsed_lines_are_written_verbatim() {
        let data = fixture_data();
        let areas = fixture_areas(&data);
        let mut parser = LineParser::new(
            &data,
            &areas.click,
            PricingModel::new(Difficulty::Hard, Gamemode::Chimps, KnowledgeModifiers::NONE),
        );
        let text = "\
place quincy hero0 at 100, 200
place dart dart0 at 300, 400 with 10% discount
upgrade dart0 path 2
upgrade dart0 path 0 with 100% discount
retarget dart0
special dart0
sell dart0
remove obstacle at 12, 34 for 500
round 7
speed slow
";
        let mut steps = Vec::new();
        for line in text.lines() {
            steps.extend(parser.parse_line(line).unwrap());
        }
        assert_eq!(write_instructions(&steps), text);
    }

    #[test]
    fn clicks_are_not_written() {
        let steps = vec![
            Instruction::Click {
                name: None,
                position: crate::geometry::Point::new(1, 1),
            },
            Instruction::AwaitRound { round: 2 },
        ];
        assert_eq!(write_instructions(&steps), "round 2\n");
    }
}
