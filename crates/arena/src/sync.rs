//! The synchronization block and the locking protocol over it.
//!
//! Three coordinated mechanisms, all built from the raw semaphores in
//! [`SyncBlock`]:
//!
//! 1. A writer-priority readers/writer lock over the game state. The
//!    writer passes through `writer_gate` and holds `state_mutex`;
//!    readers also pass through `writer_gate` on entry, so a writer
//!    queued at the gate blocks every reader that arrives after it. The
//!    first reader in takes `state_mutex` on behalf of the group, the
//!    last one out returns it.
//! 2. One turn gate per player slot: a player decrements its gate before
//!    submitting a move, the master increments it only after that move
//!    was validated and applied. At most one move per player in flight.
//! 3. A notify/done rendezvous pair between the master and the display,
//!    bounded on both sides so neither a dead display nor a dead master
//!    wedges the other.
//!
//! Acquisitions hand out scoped guards; release happens in `Drop` on
//! every exit path, including errors and cancellation.

use crate::errors::ArenaError;
use crate::layout::MAX_PLAYERS;
use crate::semaphore::{RawSemaphore, SemaphoreError};
use crate::shm::SharedSegment;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

#[repr(C)]
pub struct SyncBlock {
    display_notify: RawSemaphore,
    display_done: RawSemaphore,
    writer_gate: RawSemaphore,
    state_mutex: RawSemaphore,
    readers_mutex: RawSemaphore,
    readers_count: AtomicU32,
    turn_gates: [RawSemaphore; MAX_PLAYERS],
}

impl SyncBlock {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Master-side one-time setup, before any child process exists.
    /// Turn gates for configured players start open (count 1) so every
    /// player may submit its first move immediately.
    ///
    /// # Safety
    /// The block must live in a MAP_SHARED mapping and no other process
    /// may be attached yet.
    pub unsafe fn init(&self, player_count: usize) -> Result<(), SemaphoreError> {
        unsafe {
            self.display_notify.init(0)?;
            self.display_done.init(0)?;
            self.writer_gate.init(1)?;
            self.state_mutex.init(1)?;
            self.readers_mutex.init(1)?;
            for gate in self.turn_gates.iter().take(player_count) {
                gate.init(1)?;
            }
        }
        self.readers_count.store(0, Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// Every child process must have been reaped first.
    pub unsafe fn destroy(&self, player_count: usize) {
        unsafe {
            self.display_notify.destroy();
            self.display_done.destroy();
            self.writer_gate.destroy();
            self.state_mutex.destroy();
            self.readers_mutex.destroy();
            for gate in self.turn_gates.iter().take(player_count) {
                gate.destroy();
            }
        }
    }

    /// Writer acquire: gate, then state mutex, then release the gate.
    /// Releasing the gate only after the mutex is held is what starves
    /// out late-arriving readers instead of the writer.
    pub fn lock_write(&self, shutdown: &AtomicBool) -> Result<WriteGuard<'_>, SemaphoreError> {
        self.writer_gate.wait(shutdown)?;
        if let Err(e) = self.state_mutex.wait(shutdown) {
            let _ = self.writer_gate.post();
            return Err(e);
        }
        self.writer_gate.post()?;
        Ok(WriteGuard { sync: self })
    }

    /// Reader acquire. The first reader of a group takes the state mutex;
    /// the group holds it collectively until the last reader leaves.
    pub fn lock_read(&self, shutdown: &AtomicBool) -> Result<ReadGuard<'_>, SemaphoreError> {
        self.writer_gate.wait(shutdown)?;
        if let Err(e) = self.readers_mutex.wait(shutdown) {
            let _ = self.writer_gate.post();
            return Err(e);
        }
        let previous = self.readers_count.fetch_add(1, Ordering::AcqRel);
        if previous == 0
            && let Err(e) = self.state_mutex.wait(shutdown)
        {
            // Roll the group entry back before bailing out.
            self.readers_count.fetch_sub(1, Ordering::AcqRel);
            let _ = self.readers_mutex.post();
            let _ = self.writer_gate.post();
            return Err(e);
        }
        self.readers_mutex.post()?;
        self.writer_gate.post()?;
        Ok(ReadGuard { sync: self })
    }

    /// Readers currently inside the critical section (stale immediately;
    /// diagnostics and tests only).
    pub fn readers(&self) -> u32 {
        self.readers_count.load(Ordering::Acquire)
    }

    // --- display rendezvous ---

    pub fn notify_display(&self) -> Result<(), SemaphoreError> {
        self.display_notify.post()
    }

    /// Master side: bounded wait for the display's acknowledgment.
    /// `Ok(false)` on timeout; the game proceeds without the display.
    pub fn wait_display_done(
        &self,
        timeout: Duration,
        shutdown: &AtomicBool,
    ) -> Result<bool, SemaphoreError> {
        self.display_done.wait_timeout(timeout, shutdown)
    }

    /// Display side: bounded wait for a render request. The caller must
    /// re-check the game-over flag on every wake, timeout included.
    pub fn wait_display_notify(
        &self,
        timeout: Duration,
        shutdown: &AtomicBool,
    ) -> Result<bool, SemaphoreError> {
        self.display_notify.wait_timeout(timeout, shutdown)
    }

    pub fn ack_display(&self) -> Result<(), SemaphoreError> {
        self.display_done.post()
    }

    // --- per-player turn gates ---

    /// Master side: allow `player` to submit its next move.
    pub fn grant_turn(&self, player: usize) -> Result<(), SemaphoreError> {
        self.turn_gates[player].post()
    }

    /// Player side: bounded wait for permission to submit one move, so a
    /// player can re-check the game-over flag while the master is idle.
    pub fn wait_turn(
        &self,
        player: usize,
        timeout: Duration,
        shutdown: &AtomicBool,
    ) -> Result<bool, SemaphoreError> {
        self.turn_gates[player].wait_timeout(timeout, shutdown)
    }

    #[cfg(test)]
    fn turn_gate_value(&self, player: usize) -> i32 {
        self.turn_gates[player].value().unwrap()
    }
}

/// Exclusive access to the game state. Dropping releases the state mutex.
pub struct WriteGuard<'a> {
    sync: &'a SyncBlock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sync.state_mutex.post() {
            tracing::error!(error = %e, "failed to release state mutex after write");
        }
    }
}

/// Shared access to the game state. Dropping leaves the reader group and
/// returns the state mutex when the group empties.
pub struct ReadGuard<'a> {
    sync: &'a SyncBlock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let release = || -> Result<(), SemaphoreError> {
            // Exit must complete even under shutdown or the writer would
            // wait on a reader that no longer exists.
            self.sync.readers_mutex.wait_uninterruptible()?;
            let previous = self.sync.readers_count.fetch_sub(1, Ordering::AcqRel);
            if previous == 1 {
                self.sync.state_mutex.post()?;
            }
            self.sync.readers_mutex.post()
        };
        if let Err(e) = release() {
            tracing::error!(error = %e, "failed to leave reader group");
        }
    }
}

/// Owner of the mapped sync segment. Both the master (creator) and the
/// children (openers) hold one of these; the protocol operations live on
/// the dereferenced [`SyncBlock`].
pub struct SyncHandle {
    seg: SharedSegment,
}

impl SyncHandle {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let seg = SharedSegment::create(path, SyncBlock::SIZE)?;
        Ok(Self { seg })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let seg = SharedSegment::open_rw(path)?;
        if seg.len() < SyncBlock::SIZE {
            return Err(ArenaError::SegmentTooSmall {
                needed: SyncBlock::SIZE,
                mapped: seg.len(),
            });
        }
        Ok(Self { seg })
    }

    pub fn path(&self) -> &Path {
        self.seg.path()
    }
}

impl std::ops::Deref for SyncHandle {
    type Target = SyncBlock;

    fn deref(&self) -> &SyncBlock {
        unsafe { &*(self.seg.as_ptr() as *const SyncBlock) }
    }
}
