// SPDX-License-Identifier: GPL-3.0-only
pub mod click;
pub mod payload;
pub mod service;

pub use click::{ClickAction, ClientWindow};
pub use payload::{Notification, NotificationAction, PushError};
pub use service::{NotificationClick, NotificationPlatform, PushDelivery, PushHandler};
