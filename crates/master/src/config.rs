use anyhow::{Result, bail};
use arena::layout::{MAX_PLAYERS, MIN_BOARD_SIZE};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_WIDTH: u16 = 10;
const DEFAULT_HEIGHT: u16 = 10;
const DEFAULT_DELAY_MS: u64 = 200;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FINAL_VIEW_MS: u64 = 6000;

/// Game orchestrator: owns the shared segments, referees the moves.
#[derive(Parser, Debug, Clone)]
#[command(name = "master", disable_help_flag = true)]
pub struct MasterConfig {
    /// Board width in cells.
    #[arg(short = 'w', long, default_value_t = DEFAULT_WIDTH)]
    pub width: u16,

    /// Board height in cells.
    #[arg(short = 'h', long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u16,

    /// Pause between processed moves, milliseconds.
    #[arg(short = 'd', long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay: u64,

    /// End the game after this many seconds without a valid move.
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Board fill seed; defaults to the wall clock.
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Optional display executable.
    #[arg(short = 'v', long)]
    pub view: Option<PathBuf>,

    /// Player executables, one per player, in slot order.
    #[arg(short = 'p', long, num_args = 1.., required = true)]
    pub players: Vec<PathBuf>,

    /// How long the display gets to render the final board, milliseconds.
    #[arg(long, default_value_t = DEFAULT_FINAL_VIEW_MS)]
    pub final_view_ms: u64,

    #[arg(long, action = clap::ArgAction::Help, help = "Print help")]
    help: Option<bool>,
}

impl MasterConfig {
    /// Clamp dimensions to the playable minimum and reject impossible
    /// rosters. Mirrors what the core enforces, so a bad invocation fails
    /// here with a readable message instead of deep in segment setup.
    pub fn normalized(mut self) -> Result<Self> {
        if self.players.is_empty() {
            bail!("at least one player executable is required");
        }
        if self.players.len() > MAX_PLAYERS {
            bail!(
                "{} players requested, the board supports at most {}",
                self.players.len(),
                MAX_PLAYERS
            );
        }
        self.width = self.width.max(MIN_BOARD_SIZE);
        self.height = self.height.max(MIN_BOARD_SIZE);
        Ok(self)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn final_view_timeout(&self) -> Duration {
        Duration::from_millis(self.final_view_ms)
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
    }
}
