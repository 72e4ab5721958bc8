pub mod auth;
pub mod envelope;
pub mod keys;
pub mod message;
pub mod notification;
pub mod user;
