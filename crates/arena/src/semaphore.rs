//! Raw POSIX counting semaphores embedded in shared memory.
//!
//! Unlike named semaphores, the `sem_t` itself lives inside the mapped
//! sync segment (`sem_init` with `pshared = 1`), so the semaphore state
//! crosses process boundaries together with the data it coordinates. The
//! master initializes every semaphore exactly once before any child is
//! spawned and destroys them only after the last child is reaped.

use nix::errno::Errno;
use std::cell::UnsafeCell;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemaphoreError {
    #[error("semaphore operation failed: {0}")]
    Os(#[from] Errno),
    #[error("wait interrupted by shutdown request")]
    Cancelled,
}

/// A `sem_t` at a fixed offset inside a shared mapping.
///
/// Never constructed by value outside tests; protocol code only ever
/// references instances in place through the segment pointer.
#[repr(transparent)]
pub struct RawSemaphore(UnsafeCell<libc::sem_t>);

unsafe impl Send for RawSemaphore {}
unsafe impl Sync for RawSemaphore {}

impl RawSemaphore {
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.0.get()
    }

    /// Initialize as process-shared with the given count.
    ///
    /// # Safety
    /// The memory must be in a MAP_SHARED mapping and no other process may
    /// be using the semaphore yet.
    pub unsafe fn init(&self, initial: u32) -> Result<(), SemaphoreError> {
        let ret = unsafe { libc::sem_init(self.as_ptr(), 1, initial) };
        if ret != 0 {
            return Err(Errno::last().into());
        }
        Ok(())
    }

    pub fn post(&self) -> Result<(), SemaphoreError> {
        let ret = unsafe { libc::sem_post(self.as_ptr()) };
        if ret != 0 {
            return Err(Errno::last().into());
        }
        Ok(())
    }

    /// Block until the count can be decremented. EINTR is retried
    /// transparently; if `shutdown` was raised by the time the signal
    /// arrives the wait aborts with `Cancelled` instead.
    pub fn wait(&self, shutdown: &AtomicBool) -> Result<(), SemaphoreError> {
        loop {
            let ret = unsafe { libc::sem_wait(self.as_ptr()) };
            if ret == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => {
                    if shutdown.load(Ordering::Relaxed) {
                        return Err(SemaphoreError::Cancelled);
                    }
                }
                e => return Err(e.into()),
            }
        }
    }

    /// Like `wait` but never cancels. Reserved for release paths that must
    /// run to completion or the protocol would be left inconsistent.
    pub(crate) fn wait_uninterruptible(&self) -> Result<(), SemaphoreError> {
        loop {
            let ret = unsafe { libc::sem_wait(self.as_ptr()) };
            if ret == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                e => return Err(e.into()),
            }
        }
    }

    /// Bounded wait. `Ok(false)` means the timeout elapsed. The absolute
    /// deadline is computed once, so EINTR retries do not extend it.
    pub fn wait_timeout(
        &self,
        timeout: Duration,
        shutdown: &AtomicBool,
    ) -> Result<bool, SemaphoreError> {
        let deadline = absolute_deadline(timeout);
        loop {
            let ret = unsafe { libc::sem_timedwait(self.as_ptr(), &deadline) };
            if ret == 0 {
                return Ok(true);
            }
            match Errno::last() {
                Errno::ETIMEDOUT => return Ok(false),
                Errno::EINTR => {
                    if shutdown.load(Ordering::Relaxed) {
                        return Err(SemaphoreError::Cancelled);
                    }
                }
                e => return Err(e.into()),
            }
        }
    }

    /// Non-blocking decrement attempt; `Ok(false)` when the count is zero.
    pub fn try_wait(&self) -> Result<bool, SemaphoreError> {
        let ret = unsafe { libc::sem_trywait(self.as_ptr()) };
        if ret == 0 {
            return Ok(true);
        }
        match Errno::last() {
            Errno::EAGAIN => Ok(false),
            e => Err(e.into()),
        }
    }

    /// Current count, for diagnostics and tests only. The value is stale
    /// the moment it is read.
    pub fn value(&self) -> Result<i32, SemaphoreError> {
        let mut val: c_int = 0;
        let ret = unsafe { libc::sem_getvalue(self.as_ptr(), &mut val) };
        if ret != 0 {
            return Err(Errno::last().into());
        }
        Ok(val)
    }

    /// # Safety
    /// No process may be blocked on or about to use the semaphore.
    pub unsafe fn destroy(&self) {
        unsafe {
            libc::sem_destroy(self.as_ptr());
        }
    }
}

fn absolute_deadline(timeout: Duration) -> libc::timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    ts.tv_sec += timeout.as_secs() as libc::time_t;
    ts.tv_nsec += timeout.subsec_nanos() as libc::c_long;
    if ts.tv_nsec >= 1_000_000_000 {
        ts.tv_sec += 1;
        ts.tv_nsec -= 1_000_000_000;
    }
    ts
}
