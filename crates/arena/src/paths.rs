//! Shared segment naming.
//!
//! Both segments are plain files under /dev/shm mapped by every
//! participant. The master creates them before spawning anything; the
//! children resolve the same names through these helpers, so an
//! environment override set on the master is inherited by its children
//! and redirects the whole process group at once.

use std::env;

/// Game state segment: header + board cells.
pub const STATE_SEGMENT_PATH: &str = "/dev/shm/gridclash_state";

/// Synchronization segment: the semaphore block.
pub const SYNC_SEGMENT_PATH: &str = "/dev/shm/gridclash_sync";

/// Environment override for the state segment path.
pub const STATE_PATH_ENV: &str = "GRIDCLASH_STATE_PATH";

/// Environment override for the sync segment path.
pub const SYNC_PATH_ENV: &str = "GRIDCLASH_SYNC_PATH";

pub fn state_segment_path() -> String {
    env::var(STATE_PATH_ENV).unwrap_or_else(|_| STATE_SEGMENT_PATH.to_string())
}

pub fn sync_segment_path() -> String {
    env::var(SYNC_PATH_ENV).unwrap_or_else(|_| SYNC_SEGMENT_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_are_absolute() {
        assert!(STATE_SEGMENT_PATH.starts_with('/'));
        assert!(SYNC_SEGMENT_PATH.starts_with('/'));
    }

    #[test]
    fn default_paths_are_distinct() {
        assert_ne!(STATE_SEGMENT_PATH, SYNC_SEGMENT_PATH);
    }
}
