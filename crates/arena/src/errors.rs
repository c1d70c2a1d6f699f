use crate::semaphore::SemaphoreError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("semaphore error: {0}")]
    Semaphore(#[from] SemaphoreError),

    #[error("segment too small: need {needed} bytes, mapped {mapped}")]
    SegmentTooSmall { needed: usize, mapped: usize },

    #[error("player count {0} outside 1..={max}", max = crate::layout::MAX_PLAYERS)]
    PlayerCount(usize),

    #[error("board {width}x{height} below minimum side {min}", min = crate::layout::MIN_BOARD_SIZE)]
    BoardTooSmall { width: u16, height: u16 },
}

impl ArenaError {
    /// True when the error came from a shutdown-interrupted wait rather
    /// than an OS failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ArenaError::Semaphore(SemaphoreError::Cancelled))
    }
}
