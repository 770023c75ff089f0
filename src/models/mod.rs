pub mod notification;
pub mod rule;
pub mod user;

pub use notification::{
    ChannelCount, DispatchOutcome, ListNotificationsQuery, ModuleCount, NewNotification,
    Notification, NotificationEvent, NotificationStats, NotificationStatus, Recipient,
    StatsFilter, StatusCount,
};
pub use rule::{
    CreateNotificationRule, MessageTemplate, NotificationRule, NotificationRuleRow, Priority,
    RecipientConfig, UpdateNotificationRule,
};
pub use user::{CreateUserRequest, User};
