// SPDX-License-Identifier: GPL-3.0-only
pub mod error;
pub mod models;
pub mod service;
pub mod sqlite;
pub mod traits;

pub use error::QueueError;
pub use models::{ActionRequest, DeadAction, QueuedAction, SyncResult};
pub use service::{OfflineQueue, RetryPolicy, SubmitOutcome};
pub use sqlite::SqliteQueueStore;
pub use traits::QueueStore;
