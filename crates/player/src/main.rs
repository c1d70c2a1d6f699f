mod strategy;

use anyhow::{Context, Result, bail};
use arena::semaphore::SemaphoreError;
use arena::{StateReader, SyncHandle, paths};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const ATTACH_ATTEMPTS: u32 = 100;
const ATTACH_POLL: Duration = Duration::from_millis(20);

/// Bound on the turn-gate wait so the game-over flag is re-checked even
/// when the master never grants another turn.
const TURN_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        bail!("usage: {} <width> <height>", args[0]);
    }
    // Dimensions arrive by spawn convention; the mapped header stays
    // authoritative, so they are only validated here.
    let _width: u16 = args[1].parse().context("invalid width argument")?;
    let _height: u16 = args[2].parse().context("invalid height argument")?;

    common::setup_logging();

    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    let state = common::wait_for_resource(
        || StateReader::open(paths::state_segment_path()),
        ATTACH_ATTEMPTS,
        ATTACH_POLL,
        "state segment",
    )?;
    let sync = common::wait_for_resource(
        || SyncHandle::open(paths::sync_segment_path()),
        ATTACH_ATTEMPTS,
        ATTACH_POLL,
        "sync segment",
    )?;

    // The master records our pid just after spawning us; retry until the
    // slot shows up.
    let me = common::wait_for_resource(
        || find_self(&state),
        ATTACH_ATTEMPTS,
        ATTACH_POLL,
        "roster slot",
    )?;
    tracing::info!(player = me, "attached to the game");

    let mut stdout = std::io::stdout();

    while !shutdown.load(Ordering::Relaxed) && !state.is_game_over() {
        let granted = match sync.wait_turn(me, TURN_POLL, &shutdown) {
            Ok(granted) => granted,
            Err(SemaphoreError::Cancelled) => break,
            Err(e) => return Err(e).context("turn gate wait failed"),
        };
        if !granted {
            continue;
        }

        let snapshot = {
            let _guard = match sync.lock_read(&shutdown) {
                Ok(guard) => guard,
                Err(SemaphoreError::Cancelled) => break,
                Err(e) => return Err(e).context("read lock failed"),
            };
            state.snapshot()
        };
        if snapshot.game_over {
            break;
        }

        let Some(dir) = strategy::choose_move(&snapshot, me) else {
            tracing::info!(player = me, "no legal moves remain, leaving");
            break; // closing stdout is our EOF to the master
        };

        stdout.write_all(&[dir.as_byte()])?;
        stdout.flush()?;
    }

    Ok(())
}

fn find_self(state: &StateReader) -> Result<usize> {
    let pid = std::process::id() as i32;
    (0..state.player_count())
        .find(|&id| state.player(id).pid == pid)
        .ok_or_else(|| anyhow::anyhow!("pid {pid} not yet in the roster"))
}
