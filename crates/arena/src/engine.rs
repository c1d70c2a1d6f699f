//! Pure move/board operations over a state view. No locking, no I/O:
//! callers that mutate hold the write lock, callers that read work on a
//! snapshot.

use crate::layout::{MAX_CELL_REWARD, MAX_PLAYERS, MIN_CELL_REWARD, PlayerSlot};
use crate::state::{BoardView, GameState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The eight move directions, in wire order: byte 0 is north, continuing
/// clockwise.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Decode a wire byte; anything outside 0..=7 is not a direction.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Direction::North),
            1 => Some(Direction::NorthEast),
            2 => Some(Direction::East),
            3 => Some(Direction::SouthEast),
            4 => Some(Direction::South),
            5 => Some(Direction::SouthWest),
            6 => Some(Direction::West),
            7 => Some(Direction::NorthWest),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// (dx, dy) with y growing downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }
}

/// Owner encoding: player `id` stored as `-(id + 1)`, lossless for id 0.
pub fn encode_owner(id: usize) -> i32 {
    -(id as i32 + 1)
}

/// Inverse of [`encode_owner`]; `None` for uncaptured cells.
pub fn decode_owner(value: i32) -> Option<usize> {
    if value >= 0 {
        None
    } else {
        Some((-value - 1) as usize)
    }
}

pub fn is_valid_position(x: i32, y: i32, width: u16, height: u16) -> bool {
    x >= 0 && x < width as i32 && y >= 0 && y < height as i32
}

/// Valid position holding an uncaptured reward.
pub fn is_cell_free(board: &impl BoardView, x: i32, y: i32) -> bool {
    is_valid_position(x, y, board.width(), board.height())
        && board.cell(x as u16, y as u16) > 0
}

/// Whether a player standing at `(x, y)` may move in `dir`.
pub fn is_valid_move(board: &impl BoardView, dir: Direction, x: u16, y: u16, blocked: bool) -> bool {
    if blocked {
        return false;
    }
    let (dx, dy) = dir.delta();
    is_cell_free(board, x as i32 + dx, y as i32 + dy)
}

/// Any of the eight neighbors still capturable from `(x, y)`.
pub fn has_free_neighbor(board: &impl BoardView, x: u16, y: u16) -> bool {
    Direction::ALL.iter().any(|dir| {
        let (dx, dy) = dir.delta();
        is_cell_free(board, x as i32 + dx, y as i32 + dy)
    })
}

/// Apply a validated move. Caller holds the write lock and has already
/// checked [`is_valid_move`]: the destination reward is positive here.
pub fn apply_move(state: &mut GameState, player: usize, dir: Direction) {
    let (dx, dy) = dir.delta();
    let x = (state.player(player).x as i32 + dx) as u16;
    let y = (state.player(player).y as i32 + dy) as u16;

    let reward = state.cell(x, y);
    debug_assert!(reward > 0, "apply_move on a non-free cell");

    state.set_cell(x, y, encode_owner(player));
    let slot = state.player_mut(player);
    slot.score += reward as u32;
    slot.x = x;
    slot.y = y;
    slot.valid_moves += 1;
}

/// Fill every cell with a reward in 1..=9, reproducibly for a given seed.
pub fn seed_board(state: &mut GameState, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for y in 0..state.height() {
        for x in 0..state.width() {
            state.set_cell(x, y, rng.gen_range(MIN_CELL_REWARD..=MAX_CELL_REWARD));
        }
    }
}

/// Canonical starting anchor for a player slot: corners first, then edge
/// midpoints, then the center.
pub fn spawn_anchor(slot: usize, width: u16, height: u16) -> (u16, u16) {
    assert!(slot < MAX_PLAYERS, "anchor for slot {slot} undefined");
    match slot {
        0 => (1, 1),
        1 => (width - 2, 1),
        2 => (1, height - 2),
        3 => (width - 2, height - 2),
        4 => (width / 2, 1),
        5 => (1, height / 2),
        6 => (width - 2, height / 2),
        7 => (width / 2, height - 2),
        _ => (width / 2, height / 2),
    }
}

/// Put every configured player on its anchor and mark the anchor captured
/// immediately, so no spawn cell's reward is ever scored.
pub fn place_players(state: &mut GameState) {
    let (width, height) = (state.width(), state.height());
    for id in 0..state.player_count() {
        let (x, y) = spawn_anchor(id, width, height);
        let slot = state.player_mut(id);
        slot.x = x;
        slot.y = y;
        state.set_cell(x, y, encode_owner(id));
    }
}

/// Total, deterministic winner selection: highest score; ties broken by
/// fewer valid moves, then fewer invalid moves, then lower id. The first
/// slot seeds the comparison, so a roster of all-zero scores still
/// produces a winner.
pub fn determine_winner(players: &[PlayerSlot]) -> usize {
    assert!(!players.is_empty(), "winner of an empty roster");
    let mut winner = 0usize;
    for (id, p) in players.iter().enumerate().skip(1) {
        let best = &players[winner];
        let beats = p.score > best.score
            || (p.score == best.score
                && (p.valid_moves < best.valid_moves
                    || (p.valid_moves == best.valid_moves
                        && p.invalid_moves < best.invalid_moves)));
        if beats {
            winner = id;
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateSnapshot;
    use tempfile::tempdir;

    fn fresh_state(width: u16, height: u16, players: usize) -> (tempfile::TempDir, GameState) {
        let dir = tempdir().unwrap();
        let state = GameState::create(dir.path().join("state"), width, height, players).unwrap();
        (dir, state)
    }

    fn snapshot(width: u16, height: u16, cells: Vec<i32>) -> StateSnapshot {
        assert_eq!(cells.len(), width as usize * height as usize);
        StateSnapshot {
            width,
            height,
            players: vec![],
            cells,
            game_over: false,
        }
    }

    fn slot(score: u32, valid: u32, invalid: u32) -> PlayerSlot {
        let mut p = PlayerSlot::zeroed();
        p.score = score;
        p.valid_moves = valid;
        p.invalid_moves = invalid;
        p
    }

    // ========== Directions ==========

    #[test]
    fn every_wire_byte_round_trips() {
        for byte in 0u8..8 {
            let dir = Direction::from_byte(byte).expect("bytes 0..=7 are directions");
            assert_eq!(dir.as_byte(), byte);
        }
        for byte in 8u8..=255 {
            assert!(Direction::from_byte(byte).is_none(), "byte {byte} decoded");
        }
    }

    #[test]
    fn deltas_match_the_wire_order() {
        assert_eq!(Direction::North.delta(), (0, -1));
        assert_eq!(Direction::East.delta(), (1, 0));
        assert_eq!(Direction::South.delta(), (0, 1));
        assert_eq!(Direction::West.delta(), (-1, 0));
        assert_eq!(Direction::NorthWest.delta(), (-1, -1));
    }

    #[test]
    fn deltas_are_all_distinct_unit_steps() {
        let mut seen = std::collections::HashSet::new();
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert!(dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0));
            assert!(seen.insert((dx, dy)), "duplicate delta {:?}", (dx, dy));
        }
        assert_eq!(seen.len(), 8);
    }

    // ========== Owner encoding ==========

    #[test]
    fn owner_encoding_round_trips_including_player_zero() {
        for id in 0..MAX_PLAYERS {
            let encoded = encode_owner(id);
            assert!(encoded <= -1, "owner values are strictly negative");
            assert_eq!(decode_owner(encoded), Some(id));
        }
        assert_eq!(decode_owner(5), None);
        assert_eq!(decode_owner(1), None);
    }

    // ========== Validity ==========

    #[test]
    fn positions_outside_the_board_are_invalid() {
        assert!(is_valid_position(0, 0, 10, 10));
        assert!(is_valid_position(9, 9, 10, 10));
        assert!(!is_valid_position(-1, 0, 10, 10));
        assert!(!is_valid_position(0, -1, 10, 10));
        assert!(!is_valid_position(10, 0, 10, 10));
        assert!(!is_valid_position(0, 10, 10, 10));
    }

    #[test]
    fn captured_cells_are_not_free() {
        let mut cells = vec![5i32; 100];
        cells[0] = encode_owner(0);
        let snap = snapshot(10, 10, cells);

        assert!(!is_cell_free(&snap, 0, 0), "captured");
        assert!(is_cell_free(&snap, 1, 0), "reward 5");
        assert!(!is_cell_free(&snap, -1, 0), "off-board");
    }

    #[test]
    fn blocked_players_have_no_valid_moves() {
        let snap = snapshot(10, 10, vec![5i32; 100]);
        assert!(is_valid_move(&snap, Direction::East, 4, 4, false));
        assert!(!is_valid_move(&snap, Direction::East, 4, 4, true));
    }

    #[test]
    fn moves_off_the_edge_are_invalid() {
        let snap = snapshot(10, 10, vec![5i32; 100]);
        assert!(!is_valid_move(&snap, Direction::North, 0, 0, false));
        assert!(!is_valid_move(&snap, Direction::West, 0, 0, false));
        assert!(is_valid_move(&snap, Direction::SouthEast, 0, 0, false));
    }

    #[test]
    fn surrounded_player_has_no_free_neighbor() {
        let mut cells = vec![5i32; 100];
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            let idx = (4 + dy) as usize * 10 + (4 + dx) as usize;
            cells[idx] = encode_owner(1);
        }
        let snap = snapshot(10, 10, cells);

        assert!(!has_free_neighbor(&snap, 4, 4));
        assert!(has_free_neighbor(&snap, 0, 0));
    }

    // ========== apply_move ==========

    #[test]
    fn apply_move_transfers_the_reward_and_ownership() {
        let (_dir, mut state) = fresh_state(10, 10, 1);
        seed_board(&mut state, 7);
        place_players(&mut state);

        let (x0, y0) = (state.player(0).x, state.player(0).y);
        let reward = state.cell(x0 + 1, y0);
        assert!(reward > 0);

        apply_move(&mut state, 0, Direction::East);

        let p = state.player(0);
        assert_eq!((p.x, p.y), (x0 + 1, y0));
        assert_eq!(p.score, reward as u32);
        assert_eq!(p.valid_moves, 1);
        assert_eq!(decode_owner(state.cell(x0 + 1, y0)), Some(0));
    }

    #[test]
    fn a_cell_is_never_capturable_twice() {
        let (_dir, mut state) = fresh_state(10, 10, 1);
        seed_board(&mut state, 7);
        place_players(&mut state);

        let (x0, y0) = (state.player(0).x, state.player(0).y);
        assert!(is_valid_move(&state, Direction::East, x0, y0, false));

        apply_move(&mut state, 0, Direction::East);

        // Re-validating a move back onto the captured square fails.
        let p = *state.player(0);
        assert!(!is_valid_move(&state, Direction::West, p.x, p.y, false));
    }

    // ========== Board seeding & placement ==========

    #[test]
    fn seeded_boards_are_reproducible_and_in_range() {
        let (_d1, mut a) = fresh_state(10, 10, 1);
        let (_d2, mut b) = fresh_state(10, 10, 1);
        seed_board(&mut a, 1234);
        seed_board(&mut b, 1234);

        for y in 0..10 {
            for x in 0..10 {
                let v = a.cell(x, y);
                assert!((MIN_CELL_REWARD..=MAX_CELL_REWARD).contains(&v));
                assert_eq!(v, b.cell(x, y), "same seed, same board");
            }
        }

        let (_d3, mut c) = fresh_state(10, 10, 1);
        seed_board(&mut c, 4321);
        let differs = (0..10)
            .flat_map(|y| (0..10).map(move |x| (x, y)))
            .any(|(x, y)| a.cell(x, y) != c.cell(x, y));
        assert!(differs, "different seeds should differ somewhere");
    }

    #[test]
    fn anchors_are_distinct_and_pre_captured() {
        let (_dir, mut state) = fresh_state(10, 10, MAX_PLAYERS);
        seed_board(&mut state, 99);
        place_players(&mut state);

        let mut seen = std::collections::HashSet::new();
        for id in 0..MAX_PLAYERS {
            let p = state.player(id);
            assert!(seen.insert((p.x, p.y)), "anchor collision at slot {id}");
            assert_eq!(decode_owner(state.cell(p.x, p.y)), Some(id));
            assert_eq!(p.score, 0, "spawn cells must not score");
        }
    }

    // ========== determine_winner ==========

    #[test]
    fn highest_score_wins() {
        let players = [slot(10, 5, 0), slot(30, 9, 9), slot(20, 1, 1)];
        assert_eq!(determine_winner(&players), 1);
    }

    #[test]
    fn score_tie_goes_to_fewer_valid_moves() {
        let players = [slot(30, 7, 0), slot(30, 4, 9)];
        assert_eq!(determine_winner(&players), 1);
    }

    #[test]
    fn full_move_tie_goes_to_fewer_invalid_moves() {
        let players = [slot(30, 4, 5), slot(30, 4, 2)];
        assert_eq!(determine_winner(&players), 1);
    }

    #[test]
    fn complete_tie_goes_to_the_lower_id() {
        let players = [slot(30, 4, 2), slot(30, 4, 2), slot(30, 4, 2)];
        assert_eq!(determine_winner(&players), 0);
    }

    #[test]
    fn all_zero_scores_still_produce_a_winner() {
        let players = [slot(0, 0, 3), slot(0, 0, 1)];
        assert_eq!(determine_winner(&players), 1);

        let players = [slot(0, 0, 0)];
        assert_eq!(determine_winner(&players), 0);
    }
}
