//! Typed handles over the state segment.
//!
//! [`GameState`] is the master's read-write view; there is exactly one of
//! these per game and it mutates only under the write lock. [`StateReader`]
//! is the children's read-only view; it copies a [`StateSnapshot`] under
//! the read lock and works on the copy afterwards, so readers never hold
//! the lock while thinking.
//!
//! `cell`/`set_cell` are the only board access paths; both bound-check.

use crate::errors::ArenaError;
use crate::layout::{
    MAX_PLAYERS, MIN_BOARD_SIZE, PlayerSlot, StateHeader, state_segment_size,
};
use crate::shm::{ReadOnlySegment, SharedSegment};
use std::path::Path;

/// Read access to a board, whatever backs it.
pub trait BoardView {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    /// Panics when `(x, y)` is outside the board.
    fn cell(&self, x: u16, y: u16) -> i32;
}

fn cell_index(x: u16, y: u16, width: u16, height: u16) -> usize {
    assert!(
        x < width && y < height,
        "cell ({x}, {y}) outside {width}x{height} board"
    );
    y as usize * width as usize + x as usize
}

/// The master's mapping. Sole writer of the segment.
pub struct GameState {
    seg: SharedSegment,
}

impl GameState {
    /// Create the segment and write a fresh header: dimensions, roster
    /// with seeded names, cleared counters, game not over. Board cells
    /// are left to [`crate::engine::seed_board`].
    pub fn create(
        path: impl AsRef<Path>,
        width: u16,
        height: u16,
        player_count: usize,
    ) -> Result<Self, ArenaError> {
        if width < MIN_BOARD_SIZE || height < MIN_BOARD_SIZE {
            return Err(ArenaError::BoardTooSmall { width, height });
        }
        if player_count == 0 || player_count > MAX_PLAYERS {
            return Err(ArenaError::PlayerCount(player_count));
        }

        let seg = SharedSegment::create(path, state_segment_size(width, height))?;
        let mut state = Self { seg };

        let header = state.header_mut();
        header.width = width;
        header.height = height;
        header.player_count = player_count as u32;
        for (id, slot) in header.players.iter_mut().enumerate() {
            *slot = PlayerSlot::zeroed();
            if id < player_count {
                slot.set_name(&format!("Player{id}"));
            }
        }

        Ok(state)
    }

    fn header(&self) -> &StateHeader {
        unsafe { &*(self.seg.as_ptr() as *const StateHeader) }
    }

    pub fn header_mut(&mut self) -> &mut StateHeader {
        unsafe { &mut *(self.seg.as_mut_ptr() as *mut StateHeader) }
    }

    fn cells(&self) -> &[i32] {
        let len = self.header().width as usize * self.header().height as usize;
        unsafe {
            std::slice::from_raw_parts(self.seg.as_ptr().add(StateHeader::SIZE) as *const i32, len)
        }
    }

    fn cells_mut(&mut self) -> &mut [i32] {
        let len = self.header().width as usize * self.header().height as usize;
        unsafe {
            std::slice::from_raw_parts_mut(
                self.seg.as_mut_ptr().add(StateHeader::SIZE) as *mut i32,
                len,
            )
        }
    }

    pub fn set_cell(&mut self, x: u16, y: u16, value: i32) {
        let idx = cell_index(x, y, self.width(), self.height());
        self.cells_mut()[idx] = value;
    }

    pub fn player_count(&self) -> usize {
        self.header().player_count as usize
    }

    pub fn player(&self, id: usize) -> &PlayerSlot {
        assert!(id < self.player_count(), "player {id} out of roster");
        &self.header().players[id]
    }

    pub fn player_mut(&mut self, id: usize) -> &mut PlayerSlot {
        assert!(id < self.player_count(), "player {id} out of roster");
        &mut self.header_mut().players[id]
    }

    /// Valid roster prefix, e.g. for winner determination.
    pub fn players(&self) -> &[PlayerSlot] {
        &self.header().players[..self.player_count()]
    }

    pub fn is_game_over(&self) -> bool {
        self.header().is_game_over()
    }

    pub fn set_game_over(&mut self) {
        self.header_mut().set_game_over();
    }

    pub fn path(&self) -> &Path {
        self.seg.path()
    }
}

impl BoardView for GameState {
    fn width(&self) -> u16 {
        self.header().width
    }

    fn height(&self) -> u16 {
        self.header().height
    }

    fn cell(&self, x: u16, y: u16) -> i32 {
        self.cells()[cell_index(x, y, self.width(), self.height())]
    }
}

/// A child's read-only mapping of the state segment.
pub struct StateReader {
    seg: ReadOnlySegment,
}

impl StateReader {
    /// Map and sanity-check: the segment must hold the header plus every
    /// cell the header claims.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let seg = ReadOnlySegment::open(path)?;
        if seg.len() < StateHeader::SIZE {
            return Err(ArenaError::SegmentTooSmall {
                needed: StateHeader::SIZE,
                mapped: seg.len(),
            });
        }
        let reader = Self { seg };
        let needed = state_segment_size(reader.width(), reader.height());
        if reader.seg.len() < needed {
            return Err(ArenaError::SegmentTooSmall {
                needed,
                mapped: reader.seg.len(),
            });
        }
        Ok(reader)
    }

    fn header(&self) -> &StateHeader {
        unsafe { &*(self.seg.as_ptr() as *const StateHeader) }
    }

    fn cells(&self) -> &[i32] {
        let len = self.header().width as usize * self.header().height as usize;
        unsafe {
            std::slice::from_raw_parts(self.seg.as_ptr().add(StateHeader::SIZE) as *const i32, len)
        }
    }

    pub fn player_count(&self) -> usize {
        self.header().player_count as usize
    }

    pub fn player(&self, id: usize) -> &PlayerSlot {
        assert!(id < self.player_count(), "player {id} out of roster");
        &self.header().players[id]
    }

    /// Game-over is atomic and may be polled without holding the lock.
    pub fn is_game_over(&self) -> bool {
        self.header().is_game_over()
    }

    /// Copy out everything a reader needs. Call under the read lock, use
    /// the copy after release.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            width: self.width(),
            height: self.height(),
            players: self.header().players[..self.player_count()].to_vec(),
            cells: self.cells().to_vec(),
            game_over: self.is_game_over(),
        }
    }
}

impl BoardView for StateReader {
    fn width(&self) -> u16 {
        self.header().width
    }

    fn height(&self) -> u16 {
        self.header().height
    }

    fn cell(&self, x: u16, y: u16) -> i32 {
        self.cells()[cell_index(x, y, self.width(), self.height())]
    }
}

/// Owned copy of the shared state at one instant.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub width: u16,
    pub height: u16,
    pub players: Vec<PlayerSlot>,
    pub cells: Vec<i32>,
    pub game_over: bool,
}

impl BoardView for StateSnapshot {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn cell(&self, x: u16, y: u16) -> i32 {
        self.cells[cell_index(x, y, self.width, self.height)]
    }
}
