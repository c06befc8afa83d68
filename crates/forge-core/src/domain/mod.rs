//! Domain model (ids, actions, payloads, outcomes, errors).

pub mod action;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod payload;

pub use self::action::{ActionKind, OfflineAction, UnknownActionKind};
pub use self::errors::{QueueError, ReplayError, StorageError};
pub use self::ids::{ActionId, EmptyId};
pub use self::outcome::{SkipReason, SyncOutcome, SyncReport};
pub use self::payload::{ActionPayload, CompleteTask, CreateTask, TaskFields, UpdateTask};
