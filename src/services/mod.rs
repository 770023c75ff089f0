pub mod activity;
pub mod channels;
pub mod dispatch;
pub mod notifications;
pub mod rules;
pub mod users;

pub use activity::ActivityLogService;
pub use channels::{ChannelRegistry, ChannelSender, DeliveryResult, EmailSender, TelegramSender};
pub use dispatch::{
    AuditLog, NotificationEngine, NotificationStore, PgBackend, RuleStore, UserDirectory,
};
pub use notifications::NotificationService;
pub use rules::RuleService;
pub use users::UsersService;
