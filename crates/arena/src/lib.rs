pub mod engine;
pub mod errors;
pub mod layout;
pub mod paths;
pub mod semaphore;
pub mod shm;
pub mod state;
pub mod sync;

pub use engine::Direction;
pub use errors::ArenaError;
pub use layout::{MAX_PLAYERS, PlayerSlot, StateHeader};
pub use semaphore::SemaphoreError;
pub use state::{BoardView, GameState, StateReader, StateSnapshot};
pub use sync::{ReadGuard, SyncBlock, SyncHandle, WriteGuard};
