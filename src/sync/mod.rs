// SPDX-License-Identifier: GPL-3.0-only
pub mod background;
pub mod coordinator;
pub mod notifier;

pub use background::{BackgroundSync, BackgroundSyncError};
pub use coordinator::{SyncCoordinator, SyncPhase};
pub use notifier::{LogNotifier, SyncEvent, SyncNotifier};
