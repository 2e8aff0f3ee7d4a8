pub mod auth;
pub mod html;
pub mod region;
