pub use super::campaigns::Entity as Campaigns;
pub use super::notifications::Entity as Notifications;
pub use super::scan_events::Entity as ScanEvents;
pub use super::tokens::Entity as Tokens;
pub use super::users::Entity as Users;
