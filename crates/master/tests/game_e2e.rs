//! End-to-end runs of the master binary against scripted shell players.
//! A scripted player just dumps its move bytes and exits; the master sees
//! the bytes one turn at a time and then an EOF. Segment paths are
//! redirected into a tempdir through the environment (children inherit
//! it), so runs cannot collide with a real game.

use serial_test::serial;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A player that sends the given move bytes, then closes its stream.
fn scripted_player(dir: &Path, name: &str, moves: &[u8]) -> PathBuf {
    let mut body = String::from("#!/bin/sh\n");
    if !moves.is_empty() {
        body.push_str("printf '");
        for byte in moves {
            body.push_str(&format!("\\{byte:03o}"));
        }
        body.push_str("'\n");
    }
    write_script(dir, name, &body)
}

fn master_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_master"));
    cmd.env("GRIDCLASH_STATE_PATH", dir.join("state"))
        .env("GRIDCLASH_SYNC_PATH", dir.join("sync"))
        .env("RUST_LOG", "info");
    cmd
}

#[test]
#[serial]
fn scripted_game_runs_to_completion() {
    let dir = tempdir().unwrap();
    // A: east, east, south from its (1, 1) anchor. B: west from (8, 1).
    let a = scripted_player(dir.path(), "player_a.sh", &[2, 2, 4]);
    let b = scripted_player(dir.path(), "player_b.sh", &[6]);

    let output = master_cmd(dir.path())
        .args(["-w", "10", "-h", "10", "-d", "10", "-t", "1", "-s", "42", "-p"])
        .arg(&a)
        .arg(&b)
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "master failed:\n{stderr}");
    assert!(stderr.contains("game over"), "no game-over line in:\n{stderr}");
    assert!(stderr.contains("Player0"), "missing roster in logs:\n{stderr}");
    assert!(stderr.contains("Player1"), "missing roster in logs:\n{stderr}");

    // TERMINATED must leave nothing behind.
    assert!(!dir.path().join("state").exists(), "state segment survives");
    assert!(!dir.path().join("sync").exists(), "sync segment survives");
}

#[test]
#[serial]
fn invalid_move_bytes_are_absorbed() {
    let dir = tempdir().unwrap();
    // Bytes 9 and 200 are not directions; the game just counts them.
    let a = scripted_player(dir.path(), "player_a.sh", &[9, 200, 2]);

    let output = master_cmd(dir.path())
        .args(["-d", "10", "-t", "1", "-p"])
        .arg(&a)
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "master failed:\n{stderr}");
    assert!(stderr.contains("game over"), "no game-over line in:\n{stderr}");
}

#[test]
#[serial]
fn missing_player_aborts_setup_without_leaking_segments() {
    let dir = tempdir().unwrap();

    let output = master_cmd(dir.path())
        .args(["-t", "1", "-p"])
        .arg(dir.path().join("does_not_exist"))
        .output()
        .unwrap();

    assert!(
        !output.status.success(),
        "setup with a missing player must fail"
    );
    assert!(!dir.path().join("state").exists(), "state segment leaked");
    assert!(!dir.path().join("sync").exists(), "sync segment leaked");
}

#[test]
#[serial]
fn unresponsive_view_never_stalls_the_game() {
    let dir = tempdir().unwrap();
    let a = scripted_player(dir.path(), "player_a.sh", &[2]);
    // A view that attaches to nothing and never acknowledges a render.
    let view = write_script(dir.path(), "view.sh", "#!/bin/sh\nexec sleep 60\n");

    let start = Instant::now();
    let output = master_cmd(dir.path())
        .args(["-d", "50", "-t", "1", "--final-view-ms", "200", "-v"])
        .arg(&view)
        .arg("-p")
        .arg(&a)
        .output()
        .unwrap();
    let elapsed = start.elapsed();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "master failed:\n{stderr}");
    assert!(
        elapsed < Duration::from_secs(15),
        "rendezvous timeouts did not bound the run: {elapsed:?}"
    );
    assert!(!dir.path().join("state").exists());
    assert!(!dir.path().join("sync").exists());
}

#[test]
#[serial]
fn external_shutdown_exits_nonzero_and_cleans_up() {
    let dir = tempdir().unwrap();
    // A player that stays connected but never moves keeps the game alive
    // until the signal arrives.
    let a = write_script(dir.path(), "player_a.sh", "#!/bin/sh\nexec sleep 60\n");

    let mut child = master_cmd(dir.path())
        .args(["-t", "30", "-p"])
        .arg(&a)
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(500));
    let interrupted = Command::new("kill")
        .arg("-INT")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(interrupted.success(), "failed to signal the master");

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(
            Instant::now() < deadline,
            "master did not exit after SIGINT"
        );
        std::thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(status.code(), Some(1), "external shutdown must exit 1");
    assert!(!dir.path().join("state").exists(), "state segment leaked");
    assert!(!dir.path().join("sync").exists(), "sync segment leaked");
}
