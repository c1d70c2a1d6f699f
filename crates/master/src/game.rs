//! The orchestrator context and its game loop.
//!
//! Lifecycle: `init` (segments + board), `spawn_children`, `run` (move
//! intake under the write lock), `drain` (game-over + final render +
//! winner), `shutdown_children`, `release`. The context owns every
//! shared resource; nothing here is global, and `release` is idempotent
//! so error paths and `Drop` can both call it.

use crate::config::MasterConfig;
use crate::process::{self, PlayerProcess, ViewProcess};
use anyhow::{Context, Result};
use arena::semaphore::SemaphoreError;
use arena::state::BoardView;
use arena::{Direction, GameState, SyncHandle, engine, paths, shm};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::Read;
use std::os::fd::AsFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Upper bound on any single blocking wait in the loop, so a shutdown
/// request is never ignored for longer than this.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// How long children get between SIGTERM and SIGKILL.
const TERMINATION_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every player is blocked or has closed its stream.
    AllPlayersDone,
    /// No valid move arrived within the inactivity timeout.
    IdleTimeout,
    /// SIGINT/SIGTERM received.
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy)]
pub struct GameOutcome {
    pub reason: EndReason,
    pub winner: usize,
}

enum PipeRead {
    Byte(u8),
    Eof,
    TryNext,
}

pub struct Orchestrator {
    config: MasterConfig,
    shutdown: Arc<AtomicBool>,
    state: GameState,
    sync: SyncHandle,
    players: Vec<PlayerProcess>,
    view: Option<ViewProcess>,
    state_path: String,
    sync_path: String,
    released: bool,
}

impl Orchestrator {
    /// INIT: create both segments, write the header, seed and populate the
    /// board, initialize the semaphore block. Partial failures tear down
    /// whatever was already created.
    pub fn init(config: MasterConfig, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let state_path = paths::state_segment_path();
        let sync_path = paths::sync_segment_path();
        let player_count = config.players.len();

        let mut state = GameState::create(
            &state_path,
            config.width,
            config.height,
            player_count,
        )
        .with_context(|| format!("failed to create state segment {state_path}"))?;

        let sync = match SyncHandle::create(&sync_path) {
            Ok(sync) => sync,
            Err(e) => {
                let _ = shm::unlink(&state_path);
                return Err(e).with_context(|| format!("failed to create sync segment {sync_path}"));
            }
        };
        if let Err(e) = unsafe { sync.init(player_count) } {
            let _ = shm::unlink(&state_path);
            let _ = shm::unlink(&sync_path);
            return Err(e).context("failed to initialize semaphores");
        }

        let seed = config.effective_seed();
        engine::seed_board(&mut state, seed);
        engine::place_players(&mut state);

        tracing::info!(
            width = state.width(),
            height = state.height(),
            players = player_count,
            seed,
            "game state initialized"
        );

        Ok(Self {
            config,
            shutdown,
            state,
            sync,
            players: Vec::new(),
            view: None,
            state_path,
            sync_path,
            released: false,
        })
    }

    /// SPAWNING: all players, then the optional view. Any failure kills and
    /// reaps the children spawned so far and aborts startup.
    pub fn spawn_children(&mut self) -> Result<()> {
        let (width, height) = (self.state.width(), self.state.height());

        for (id, path) in self.config.players.clone().iter().enumerate() {
            match process::spawn_player(path, id, width, height) {
                Ok(player) => {
                    let pid = player.child.id() as i32;
                    self.players.push(player);
                    if let Err(e) = self.record_pid(id, pid) {
                        self.kill_spawned();
                        return Err(e);
                    }
                }
                Err(e) => {
                    self.kill_spawned();
                    return Err(e).with_context(|| format!("startup aborted at player {id}"));
                }
            }
        }

        if let Some(view_path) = self.config.view.clone() {
            match process::spawn_view(&view_path, width, height) {
                Ok(view) => self.view = Some(view),
                Err(e) => {
                    self.kill_spawned();
                    return Err(e).context("startup aborted at view");
                }
            }
        }

        Ok(())
    }

    fn record_pid(&mut self, id: usize, pid: i32) -> Result<()> {
        let _guard = self
            .sync
            .lock_write(&self.shutdown)
            .context("write lock for pid record")?;
        self.state.player_mut(id).pid = pid;
        Ok(())
    }

    fn kill_spawned(&mut self) {
        for player in &self.players {
            process::request_termination(&player.child);
        }
        for player in &mut self.players {
            let _ = process::reap(&mut player.child, TERMINATION_GRACE);
        }
        self.players.clear();
        if let Some(view) = &mut self.view {
            process::request_termination(&view.child);
            let _ = process::reap(&mut view.child, TERMINATION_GRACE);
        }
        self.view = None;
    }

    /// RUNNING: multiplex the move pipes, serve one move per iteration in
    /// round-robin order, until a termination condition fires.
    pub fn run(&mut self) -> Result<EndReason> {
        // First render before any move lands.
        if let Err(e) = self.display_rendezvous(self.config.pacing()) {
            if matches!(e, SemaphoreError::Cancelled) {
                return Ok(EndReason::ShutdownRequested);
            }
            return Err(e).context("initial display rendezvous");
        }

        let idle_timeout = self.config.idle_timeout();
        let mut last_valid_move = Instant::now();
        let mut current = 0usize;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(EndReason::ShutdownRequested);
            }
            if last_valid_move.elapsed() > idle_timeout {
                return Ok(EndReason::IdleTimeout);
            }
            if self.all_players_done() {
                return Ok(EndReason::AllPlayersDone);
            }

            let ready = self.poll_players(POLL_SLICE)?;
            if ready.is_empty() {
                continue;
            }

            match self.serve_one(&ready, current, &mut last_valid_move) {
                Ok(Some(served)) => current = (served + 1) % self.players.len(),
                Ok(None) => {}
                Err(SemaphoreError::Cancelled) => return Ok(EndReason::ShutdownRequested),
                Err(e) => return Err(e).context("move processing failed"),
            }
        }
    }

    fn all_players_done(&self) -> bool {
        self.players
            .iter()
            .all(|p| !p.active || self.state.player(p.id).is_blocked())
    }

    /// One bounded multiplex pass; returns the ids with readable pipes.
    /// EINTR falls out as an empty set so the caller re-checks its flags.
    fn poll_players(&self, slice: Duration) -> Result<Vec<usize>> {
        let mut ids = Vec::new();
        let mut fds = Vec::new();
        for player in &self.players {
            if !player.active || self.state.player(player.id).is_blocked() {
                continue;
            }
            if let Some(pipe) = &player.pipe {
                ids.push(player.id);
                fds.push(PollFd::new(pipe.as_fd(), PollFlags::POLLIN));
            }
        }
        if fds.is_empty() {
            return Ok(Vec::new());
        }

        let timeout = PollTimeout::from(slice.as_millis().min(u16::MAX as u128) as u16);
        match poll(&mut fds, timeout) {
            Ok(0) => Ok(Vec::new()),
            Ok(_) => {
                let wake = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
                Ok(fds
                    .iter()
                    .zip(&ids)
                    .filter(|(fd, _)| fd.revents().is_some_and(|r| r.intersects(wake)))
                    .map(|(_, &id)| id)
                    .collect())
            }
            Err(Errno::EINTR) => Ok(Vec::new()),
            Err(e) => Err(e).context("poll over player pipes"),
        }
    }

    /// Round-robin from `current`: serve the first ready player. Exactly
    /// one move is consumed per call so nobody gets two turns in a row
    /// while others are waiting.
    fn serve_one(
        &mut self,
        ready: &[usize],
        current: usize,
        last_valid_move: &mut Instant,
    ) -> Result<Option<usize>, SemaphoreError> {
        let count = self.players.len();
        for tries in 0..count {
            let id = (current + tries) % count;
            if !ready.contains(&id) || !self.players[id].active {
                continue;
            }

            match self.read_move_byte(id) {
                PipeRead::TryNext => continue,
                PipeRead::Eof => {
                    self.retire_player(id)?;
                    continue;
                }
                PipeRead::Byte(byte) => {
                    self.process_move(id, byte, last_valid_move)?;
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    fn read_move_byte(&mut self, id: usize) -> PipeRead {
        let Some(pipe) = self.players[id].pipe.as_mut() else {
            return PipeRead::TryNext;
        };
        let mut byte = [0u8; 1];
        match pipe.read(&mut byte) {
            Ok(0) => PipeRead::Eof,
            Ok(_) => PipeRead::Byte(byte[0]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => PipeRead::TryNext,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => PipeRead::TryNext,
            Err(e) => {
                // Anything else means the player is gone for good.
                tracing::warn!(player = id, error = %e, "pipe read failed");
                PipeRead::Eof
            }
        }
    }

    /// EOF or a hard read error: the player takes no further turns.
    fn retire_player(&mut self, id: usize) -> Result<(), SemaphoreError> {
        {
            let _guard = self.sync.lock_write(&self.shutdown)?;
            self.state.player_mut(id).set_blocked();
        }
        let player = &mut self.players[id];
        player.active = false;
        player.pipe = None;
        tracing::info!(player = id, "player stream closed, marked blocked");
        Ok(())
    }

    /// Validate and apply one move byte under the write lock, then open the
    /// player's turn gate, render, and pace.
    fn process_move(
        &mut self,
        id: usize,
        byte: u8,
        last_valid_move: &mut Instant,
    ) -> Result<(), SemaphoreError> {
        {
            let _guard = self.sync.lock_write(&self.shutdown)?;
            let slot = *self.state.player(id);
            let decoded = Direction::from_byte(byte);
            match decoded {
                Some(dir)
                    if engine::is_valid_move(&self.state, dir, slot.x, slot.y, slot.is_blocked()) =>
                {
                    engine::apply_move(&mut self.state, id, dir);
                    *last_valid_move = Instant::now();
                    tracing::debug!(
                        player = id,
                        dir = ?dir,
                        score = self.state.player(id).score,
                        "move applied"
                    );
                }
                _ => {
                    self.state.player_mut(id).invalid_moves += 1;
                    tracing::debug!(player = id, byte, "invalid move rejected");
                }
            }
        }

        self.sync.grant_turn(id)?;
        self.display_rendezvous(self.config.pacing())?;
        std::thread::sleep(self.config.pacing());
        Ok(())
    }

    /// Ask the view to render and wait (bounded) for its acknowledgment.
    /// No view configured, or a view that never answers, is not an error.
    fn display_rendezvous(&self, timeout: Duration) -> Result<(), SemaphoreError> {
        if self.view.is_none() {
            return Ok(());
        }
        self.sync.notify_display()?;
        let acked = self.sync.wait_display_done(timeout, &self.shutdown)?;
        if !acked {
            tracing::debug!(?timeout, "view did not acknowledge in time");
        }
        Ok(())
    }

    /// DRAINING: raise the game-over flag under the write lock, wake every
    /// player, give the view one long final render, pick the winner.
    pub fn drain(&mut self, reason: EndReason) -> Result<GameOutcome> {
        match self.sync.lock_write(&self.shutdown) {
            Ok(_guard) => self.state.set_game_over(),
            // The flag is atomic; under an active shutdown we set it
            // without the lock rather than abandon the drain.
            Err(SemaphoreError::Cancelled) => self.state.set_game_over(),
            Err(e) => return Err(e).context("write lock for game over"),
        }

        for id in 0..self.players.len() {
            let _ = self.sync.grant_turn(id);
        }

        match self.display_rendezvous(self.config.final_view_timeout()) {
            Ok(()) | Err(SemaphoreError::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "final display rendezvous failed"),
        }

        let winner = engine::determine_winner(self.state.players());
        tracing::info!(
            winner,
            name = %self.state.player(winner).name(),
            reason = ?reason,
            "game over"
        );
        for (id, player) in self.state.players().iter().enumerate() {
            tracing::info!(
                player = id,
                name = %player.name(),
                score = player.score,
                valid_moves = player.valid_moves,
                invalid_moves = player.invalid_moves,
                blocked = player.is_blocked(),
                "final standing"
            );
        }

        Ok(GameOutcome { reason, winner })
    }

    /// Graceful SIGTERM, bounded grace, SIGKILL survivors, reap everyone.
    pub fn shutdown_children(&mut self) {
        for player in &self.players {
            process::request_termination(&player.child);
        }
        if let Some(view) = &self.view {
            process::request_termination(&view.child);
        }

        for player in &mut self.players {
            match process::reap(&mut player.child, TERMINATION_GRACE) {
                Ok(exit) => {
                    tracing::info!(player = player.id, %exit, "player reaped");
                }
                Err(e) => tracing::warn!(player = player.id, error = %e, "reap failed"),
            }
        }
        if let Some(view) = &mut self.view {
            match process::reap(&mut view.child, TERMINATION_GRACE) {
                Ok(exit) => tracing::info!(%exit, "view reaped"),
                Err(e) => tracing::warn!(error = %e, "view reap failed"),
            }
        }
    }

    /// TERMINATED: destroy the semaphores and unlink both segments.
    /// Idempotent; also runs from `Drop` so aborted startups clean up.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        unsafe { self.sync.destroy(self.config.players.len()) };
        if let Err(e) = shm::unlink(&self.state_path) {
            tracing::warn!(path = %self.state_path, error = %e, "failed to unlink state segment");
        }
        if let Err(e) = shm::unlink(&self.sync_path) {
            tracing::warn!(path = %self.sync_path, error = %e, "failed to unlink sync segment");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.release();
    }
}
