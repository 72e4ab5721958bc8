pub mod chat;
pub mod gateway;
pub mod health;
pub mod keys;
