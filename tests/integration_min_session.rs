// Drives the compiled binary through a pseudo terminal: one keyboard answer,
// then escape. Ignored by default since it needs a PTY.
// Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

use abc_tutor::store::{JsonProfileStore, ProfileStore};
use abc_tutor::Category;
use expectrl::{Eof, Session};
use tempfile::tempdir;

#[test]
#[ignore]
fn one_answer_is_saved_on_exit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let profiles = dir.path().join("profiles.json");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("abc-tutor"));
    cmd.env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .args(["-u", "Léa", "--new-user", "-c", "digits", "--profiles"])
        .arg(&profiles);

    let mut p = Session::spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(300));

    // enter picks the highlighted choice, whichever digit it is
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("\x1b")?;
    p.expect(Eof)?;

    let saved = JsonProfileStore::with_path(&profiles).load()?;
    let (_, attempts) = saved.get_profile("Léa")?.totals(Category::Digits);
    assert_eq!(attempts, 1);
    Ok(())
}
