pub mod activity;
pub mod notification;
pub mod usage;

pub use activity::ActivityObserver;
pub use notification::NotificationObserver;
pub use usage::UsageObserver;
