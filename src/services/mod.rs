pub mod analytics;
pub mod campaigns;
pub mod icons;
pub mod notifications;
pub mod scans;
pub mod users;
pub mod worker;
