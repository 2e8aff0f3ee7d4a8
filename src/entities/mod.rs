pub mod prelude;

pub mod campaigns;
pub mod notifications;
pub mod scan_events;
pub mod tokens;
pub mod users;
