// SPDX-License-Identifier: GPL-3.0-only
pub mod client;
pub mod traits;

pub use client::HttpReplayer;
pub use traits::{ReplayError, ReplayResponse, Replayer};
