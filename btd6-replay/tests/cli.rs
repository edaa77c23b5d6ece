use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
const PLAYTHROUGH: &str = "logs#easy#2560x1440#noMK.btd6";

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "btd6-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

/// A playthrough directory and a state directory with logs unlocked.
fn fixture(label: &str) -> (PathBuf, PathBuf) {
    let playthroughs = temp_path(&format!("{label}-playthroughs"));
    std::fs::create_dir_all(&playthroughs).unwrap();
    std::fs::write(
        playthroughs.join(PLAYTHROUGH),
        "place dart dart0 at 500, 500\nupgrade dart0 path 0\n",
    )
    .unwrap();

    let state = temp_path(&format!("{label}-state"));
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(
        state.join("userconfig.json"),
        r#"{"unlocked_maps": {"logs": true}, "medals": {"logs": {}}}"#,
    )
    .unwrap();
    (playthroughs, state)
}

fn run(playthroughs: &Path, state: &Path, words: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_btd6-replay"))
        .args(["--data-dir", DATA_DIR, "--resolution", "2560x1440"])
        .arg("--playthrough-dir")
        .arg(playthroughs)
        .arg("--state-dir")
        .arg(state)
        .arg("--images-dir")
        .arg(state.join("images"))
        .args(words)
        .env("NO_COLOR", "1")
        .output()
        .expect("run cli")
}

#[test]
fn knowledge_flag_is_required() {
    let output = Command::new(env!("CARGO_BIN_EXE_btd6-replay"))
        .args(["random"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}

#[test]
fn leftover_words_are_rejected() {
    let (playthroughs, state) = fixture("leftovers");
    let output = run(&playthroughs, &state, &["-nomk", "xp", "2", "expert"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized arguments: expert"));
}

#[test]
fn list_shows_the_random_pool() {
    let (playthroughs, state) = fixture("random");
    let output = run(&playthroughs, &state, &["-nomk", "-nv", "-l", "random"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 playthroughs found"));
    assert!(stdout.contains(": logs - easy"));
}

#[test]
fn list_shows_xp_rates_and_writes_to_a_file() {
    let (playthroughs, state) = fixture("xp");
    let report = state.join("list.txt");
    let output = run(
        &playthroughs,
        &state,
        &["--output", report.to_str().unwrap(), "-nomk", "-nv", "-l", "xp", "3"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let content = std::fs::read_to_string(report).expect("read output");
    assert!(content.contains("1 playthroughs found"));
    assert!(content.contains("XP/h"));
}

#[test]
fn unvalidated_files_are_hidden_by_default() {
    let (playthroughs, state) = fixture("validated");
    let output = run(&playthroughs, &state, &["-nomk", "-l", "random"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no playthroughs available"));
}

#[test]
fn replay_without_reference_images_fails() {
    let (playthroughs, state) = fixture("images");
    let output = run(&playthroughs, &state, &["-nomk", "file", PLAYTHROUGH]);
    assert!(!output.status.success());
}
