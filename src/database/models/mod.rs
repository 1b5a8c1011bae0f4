pub mod activity;
pub mod dynamic;
pub mod notification;
pub mod schema;
pub mod user;

pub use activity::{Activity, ActivityType, ActivityView};
pub use dynamic::DynamicData;
pub use notification::{Notification, NotificationType, NotificationView};
pub use schema::{
    AuthConfig, AuthConfigView, EndpointProtection, FieldType, FieldView, LoginFields, Schema, SchemaField,
    SchemaView, Visibility,
};
pub use user::{next_month_start, ApiUsage, ApiUsageView, PlatformUser, PlatformUserView};
