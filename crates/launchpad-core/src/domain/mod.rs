//! Domain model (IDs, task/game records, states, events, errors).

pub mod errors;
pub mod events;
pub mod game;
pub mod ids;
pub mod state;
pub mod task;
pub mod task_type;

pub use self::errors::{ErrorKind, StoreError};
pub use self::events::{EventData, GameEvent};
pub use self::game::{DistributeType, GamePatch, GameRecord, MediaKind, NewGame};
pub use self::ids::{GameId, TaskId, UserId};
pub use self::state::{GameStatus, TaskStatus, UnknownStatus};
pub use self::task::{NewTask, TaskRecord, TaskUpdate};
pub use self::task_type::{TaskType, UnknownTaskType};
