mod render;

use anyhow::{Context, Result, bail};
use arena::semaphore::SemaphoreError;
use arena::{StateReader, SyncHandle, paths};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const ATTACH_ATTEMPTS: u32 = 100;
const ATTACH_POLL: Duration = Duration::from_millis(20);

/// Bound on the notify wait: the game-over flag is re-checked on every
/// wake, so a master that died without a final notify cannot strand us
/// past its own teardown.
const NOTIFY_POLL: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        bail!("usage: {} <width> <height>", args[0]);
    }
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
    tracing::info!("view attached to the game");

    let stdout = std::io::stdout();

    while !shutdown.load(Ordering::Relaxed) {
        let notified = match sync.wait_display_notify(NOTIFY_POLL, &shutdown) {
            Ok(notified) => notified,
            Err(SemaphoreError::Cancelled) => break,
            Err(e) => return Err(e).context("notify wait failed"),
        };

        if !notified {
            // Timeout wake: only re-check the flag, nothing to render.
            if state.is_game_over() {
                break;
            }
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

        let mut out = stdout.lock();
        if snapshot.game_over {
            render::draw_final(&mut out, &snapshot)?;
            sync.ack_display()?;
            break;
        }
        render::draw(&mut out, &snapshot)?;
        drop(out);

        // Acknowledge only an actual render request.
        sync.ack_display()?;
    }

    Ok(())
}
