pub mod auth;
pub mod chat;
pub mod credentials;
pub mod file_storage;
pub mod profanity;
pub mod purchases;
pub mod site;
pub mod social;
pub mod stickers;
pub mod vip;
