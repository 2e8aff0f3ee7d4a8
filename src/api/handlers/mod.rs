pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod health;
pub mod notifications;
pub mod scan;
pub mod users;
