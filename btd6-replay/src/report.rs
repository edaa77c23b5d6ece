use anyhow::Result;
use btd6_core::{ModeKind, RunPlan, RunSummary};
use clap::ValueEnum;
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human readable summary
    Console,
    /// Machine readable run summary
    Json,
}

/// Writes the end-of-run summary in the requested format.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_summary<W: Write + ?Sized>(
    out: &mut W,
    summary: &RunSummary,
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, summary)?;
            writeln!(out)?;
        }
        ReportFormat::Console => write_console_summary(out, summary)?,
    }
    Ok(())
}

fn write_console_summary<W: Write + ?Sized>(out: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(out, "{}", "📊 Run Summary".bright_yellow().bold())?;
    writeln!(out, "{}", "-".repeat(30).yellow())?;
    writeln!(
        out,
        "Games played: {}  Wins: {}  Defeats: {}",
        summary.games_played,
        summary.wins.to_string().green(),
        summary.defeats.to_string().red()
    )?;

    if !summary.log.is_empty() {
        writeln!(out)?;
        for (file, gamemode, entry) in summary.log.iter() {
            writeln!(
                out,
                "  {file} ({gamemode}): {} attempts, {} wins, {} defeats",
                entry.attempts, entry.wins, entry.defeats
            )?;
        }
    }

    if !summary.validations.is_empty() {
        writeln!(out)?;
        for record in &summary.validations {
            let verdict = if record.result {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            writeln!(out, "  [{verdict}] {}", record.file)?;
        }
    }

    if !summary.tower_changes.is_empty() {
        writeln!(out)?;
        writeln!(out, "Tower price changes:")?;
        for change in &summary.tower_changes {
            writeln!(out, "  {change}")?;
        }
    }
    Ok(())
}

/// Lists the playthroughs a plan would draw from.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn list_candidates<W: Write + ?Sized>(out: &mut W, plan: &RunPlan, value_unit: &str) -> Result<()> {
    let kind = plan.mode.kind();
    if matches!(kind, ModeKind::Single | ModeKind::Costs) {
        writeln!(out, "mode {kind} doesn't qualify for listing")?;
        return Ok(());
    }

    let candidates = plan.candidates();
    writeln!(out, "{} playthroughs found:", candidates.len())?;
    for (entry, value) in candidates {
        match value {
            Some(value) => writeln!(
                out,
                "{}: {} - {} with {value:.0} {value_unit}",
                entry.key,
                entry.map(),
                entry.gamemode
            )?,
            None => writeln!(out, "{}: {} - {}", entry.key, entry.map(), entry.gamemode)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use btd6_core::replay::ValidationRecord;
    use btd6_core::{Gamemode, Outcome, PlaythroughLog};

    fn summary() -> RunSummary {
        let mut log = PlaythroughLog::default();
        log.record("playthroughs/logs#easy#2560x1440.btd6", Gamemode::Easy, Outcome::Win);
        log.record("playthroughs/logs#easy#2560x1440.btd6", Gamemode::Easy, Outcome::Defeat);
        RunSummary {
            games_played: 2,
            wins: 1,
            defeats: 1,
            validations: vec![ValidationRecord {
                file: "playthroughs/logs#easy#2560x1440.btd6".to_string(),
                result: false,
            }],
            tower_changes: vec!["dart base 200 -> 215".to_string()],
            log,
        }
    }

    #[test]
    fn console_summary_lists_everything() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write_summary(&mut out, &summary(), ReportFormat::Console).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Games played: 2  Wins: 1  Defeats: 1"));
        assert!(text.contains("2 attempts, 1 wins, 1 defeats"));
        assert!(text.contains("[FAIL] playthroughs/logs#easy#2560x1440.btd6"));
        assert!(text.contains("dart base 200 -> 215"));
    }

    #[test]
    fn json_summary_is_parseable() {
        let mut out = Vec::new();
        write_summary(&mut out, &summary(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["games_played"], 2);
        assert_eq!(value["validations"][0]["result"], false);
        assert_eq!(value["tower_changes"][0], "dart base 200 -> 215");
    }
}
