// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod monitor;
pub mod probe;
pub mod traits;

pub use models::{ConnectivityState, EffectiveType};
pub use monitor::ConnectivityMonitor;
pub use probe::HttpProbe;
pub use traits::{ConnectivityProbe, ProbeOutcome};
