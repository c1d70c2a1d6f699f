//! Plain-text board rendering over a state snapshot.
//!
//! Free cells print their reward digit; captured cells print the owner's
//! letter ('a' for player 0), uppercased where the owner is currently
//! standing.

use arena::engine::{self, decode_owner};
use arena::state::{BoardView, StateSnapshot};
use std::io::Write;

fn owner_letter(owner: usize) -> char {
    (b'a' + owner as u8) as char
}

fn cell_glyph(snapshot: &StateSnapshot, x: u16, y: u16) -> char {
    match decode_owner(snapshot.cell(x, y)) {
        Some(owner) => {
            let standing_here = snapshot
                .players
                .get(owner)
                .is_some_and(|p| p.x == x && p.y == y);
            let letter = owner_letter(owner);
            if standing_here {
                letter.to_ascii_uppercase()
            } else {
                letter
            }
        }
        None => char::from_digit(snapshot.cell(x, y) as u32, 10).unwrap_or('?'),
    }
}

pub fn draw(out: &mut impl Write, snapshot: &StateSnapshot) -> std::io::Result<()> {
    writeln!(out)?;
    for y in 0..snapshot.height {
        for x in 0..snapshot.width {
            write!(out, " {} ", cell_glyph(snapshot, x, y))?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;

    for (id, player) in snapshot.players.iter().enumerate() {
        writeln!(
            out,
            "{} [{}]  score {:>4}  moves {}/{} invalid  {}",
            player.name(),
            owner_letter(id),
            player.score,
            player.valid_moves,
            player.invalid_moves,
            if player.is_blocked() { "blocked" } else { "playing" },
        )?;
    }
    out.flush()
}

pub fn draw_final(out: &mut impl Write, snapshot: &StateSnapshot) -> std::io::Result<()> {
    draw(out, snapshot)?;

    let winner = engine::determine_winner(&snapshot.players);
    let name = snapshot.players[winner].name();
    let score = snapshot.players[winner].score;
    writeln!(out)?;
    writeln!(out, "=== GAME OVER: winner {name} with {score} points ===")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena::PlayerSlot;
    use arena::engine::encode_owner;

    fn snapshot() -> StateSnapshot {
        let mut cells = vec![5i32; 100];
        cells[0] = encode_owner(0); // (0,0) owned by player 0, standing
        cells[1] = encode_owner(1); // (1,0) owned by player 1, not standing

        let mut p0 = PlayerSlot::zeroed();
        p0.set_name("Player0");
        p0.score = 12;
        let mut p1 = PlayerSlot::zeroed();
        p1.set_name("Player1");
        p1.x = 8;
        p1.y = 8;
        p1.score = 3;

        StateSnapshot {
            width: 10,
            height: 10,
            players: vec![p0, p1],
            cells,
            game_over: false,
        }
    }

    #[test]
    fn glyphs_distinguish_rewards_owners_and_positions() {
        let snap = snapshot();
        assert_eq!(cell_glyph(&snap, 0, 0), 'A', "player 0 stands here");
        assert_eq!(cell_glyph(&snap, 1, 0), 'b', "owned, owner elsewhere");
        assert_eq!(cell_glyph(&snap, 2, 0), '5', "free reward cell");
    }

    #[test]
    fn draw_lists_every_player() {
        let snap = snapshot();
        let mut buffer = Vec::new();
        draw(&mut buffer, &snap).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Player0"));
        assert!(text.contains("Player1"));
        assert!(text.contains("score   12"));
    }

    #[test]
    fn final_frame_names_the_winner() {
        let snap = snapshot();
        let mut buffer = Vec::new();
        draw_final(&mut buffer, &snap).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("GAME OVER"));
        assert!(
            text.contains("winner Player0"),
            "highest score must win: {text}"
        );
    }
}
