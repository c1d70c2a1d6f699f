//! Shared state segment layout.
//!
//! Every struct here is mapped by several processes at once, so the
//! layouts are `#[repr(C)]` and fixed for the lifetime of a game. The
//! segment is the header followed immediately by `width * height` i32
//! board cells, row-major.
//!
//! Cell encoding: a value in 1..=9 is an uncaptured cell worth that
//! reward; a value <= -1 is a cell captured by player `(-value) - 1`.
//! Zero never occurs.

use std::sync::atomic::{AtomicU8, Ordering};

pub const MAX_PLAYERS: usize = 9;
pub const MAX_NAME_LEN: usize = 16;
pub const MIN_BOARD_SIZE: u16 = 10;
pub const MIN_CELL_REWARD: i32 = 1;
pub const MAX_CELL_REWARD: i32 = 9;

/// One roster entry. Mutable fields change only under the write lock;
/// identity fields (`name`, position at spawn) are fixed before any child
/// starts.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PlayerSlot {
    pub name: [u8; MAX_NAME_LEN],
    pub score: u32,
    pub invalid_moves: u32,
    pub valid_moves: u32,
    pub x: u16,
    pub y: u16,
    pub pid: i32,
    pub blocked: u8,
}

impl PlayerSlot {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; MAX_NAME_LEN],
            score: 0,
            invalid_moves: 0,
            valid_moves: 0,
            x: 0,
            y: 0,
            pid: 0,
            blocked: 0,
        }
    }

    /// NUL-padded, truncated to fit with a terminating NUL.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; MAX_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN - 1);
        self.name[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked != 0
    }

    pub fn set_blocked(&mut self) {
        self.blocked = 1;
    }
}

/// Fixed-size header at offset 0 of the state segment.
///
/// `game_over` is atomic because readers poll it without holding the read
/// lock (the display re-checks it on every rendezvous wake, including
/// timeouts). Everything else is protected by the locking protocol.
#[repr(C)]
pub struct StateHeader {
    pub width: u16,
    pub height: u16,
    pub player_count: u32,
    pub players: [PlayerSlot; MAX_PLAYERS],
    pub game_over: AtomicU8,
}

impl StateHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn is_game_over(&self) -> bool {
        self.game_over.load(Ordering::Acquire) != 0
    }

    pub fn set_game_over(&self) {
        self.game_over.store(1, Ordering::Release);
    }
}

/// Total byte size of the state segment for a given board.
pub fn state_segment_size(width: u16, height: u16) -> usize {
    StateHeader::SIZE + width as usize * height as usize * std::mem::size_of::<i32>()
}
