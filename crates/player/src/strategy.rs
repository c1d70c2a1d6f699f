//! Greedy move selection over a state snapshot.
//!
//! The reward dominates; two small bonuses nudge the player toward the
//! board center (more future options) and toward destinations with free
//! neighbors (mobility). Pure snapshot arithmetic, no locking.

use arena::engine::{self, Direction};
use arena::state::{BoardView, StateSnapshot};

const REWARD_WEIGHT: i32 = 10;
const CENTER_BONUS_MAX: i32 = 20;
const MOBILITY_BONUS: i32 = 5;

fn evaluate_destination(snapshot: &StateSnapshot, x: i32, y: i32) -> i32 {
    let reward = snapshot.cell(x as u16, y as u16);
    let mut score = reward * REWARD_WEIGHT;

    let center_x = snapshot.width as i32 / 2;
    let center_y = snapshot.height as i32 / 2;
    score += CENTER_BONUS_MAX - ((x - center_x).abs() + (y - center_y).abs());

    let mobility = Direction::ALL
        .iter()
        .filter(|dir| {
            let (dx, dy) = dir.delta();
            engine::is_cell_free(snapshot, x + dx, y + dy)
        })
        .count() as i32;

    score + mobility * MOBILITY_BONUS
}

/// Best-scoring legal direction, or `None` when the player is boxed in.
pub fn choose_move(snapshot: &StateSnapshot, me: usize) -> Option<Direction> {
    let player = &snapshot.players[me];
    let mut best: Option<(Direction, i32)> = None;

    for dir in Direction::ALL {
        if !engine::is_valid_move(snapshot, dir, player.x, player.y, player.is_blocked()) {
            continue;
        }
        let (dx, dy) = dir.delta();
        let score = evaluate_destination(snapshot, player.x as i32 + dx, player.y as i32 + dy);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((dir, score));
        }
    }

    best.map(|(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena::PlayerSlot;
    use arena::engine::encode_owner;

    fn snapshot_with_player(x: u16, y: u16, cells: Vec<i32>) -> StateSnapshot {
        let mut slot = PlayerSlot::zeroed();
        slot.x = x;
        slot.y = y;
        StateSnapshot {
            width: 10,
            height: 10,
            players: vec![slot],
            cells,
            game_over: false,
        }
    }

    #[test]
    fn boxed_in_player_has_no_move() {
        let mut cells = vec![5i32; 100];
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            cells[(4 + dy) as usize * 10 + (4 + dx) as usize] = encode_owner(0);
        }
        let snap = snapshot_with_player(4, 4, cells);

        assert_eq!(choose_move(&snap, 0), None);
    }

    #[test]
    fn the_single_free_neighbor_is_taken() {
        let mut cells = vec![encode_owner(0); 100];
        // Only the cell east of (4, 4) is free.
        cells[4 * 10 + 5] = 3;
        let snap = snapshot_with_player(4, 4, cells);

        assert_eq!(choose_move(&snap, 0), Some(Direction::East));
    }

    #[test]
    fn a_much_larger_reward_wins_over_position() {
        let mut cells = vec![encode_owner(0); 100];
        cells[4 * 10 + 5] = 9; // east: big reward
        cells[4 * 10 + 3] = 1; // west: small reward
        let snap = snapshot_with_player(4, 4, cells);

        assert_eq!(choose_move(&snap, 0), Some(Direction::East));
    }

    #[test]
    fn blocked_flag_suppresses_all_moves() {
        let cells = vec![5i32; 100];
        let mut snap = snapshot_with_player(4, 4, cells);
        snap.players[0].set_blocked();

        assert_eq!(choose_move(&snap, 0), None);
    }

    #[test]
    fn moves_never_leave_the_board() {
        // Corner player on an all-free board: only in-bounds directions
        // may be chosen, and something must be chosen.
        let snap = snapshot_with_player(0, 0, vec![5i32; 100]);
        let dir = choose_move(&snap, 0).expect("free board, must move");
        let (dx, dy) = dir.delta();
        assert!(dx >= 0 && dy >= 0, "chose an off-board direction {dir:?}");
    }
}
