pub mod crypto_service;
pub mod health_service;
pub mod key_service;
pub mod message_service;
pub mod notification;
pub mod relationship_service;
