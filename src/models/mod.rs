pub mod chat;
pub mod comment;
pub mod file;
pub mod payment;
pub mod purchase;
pub mod site;
pub mod user;
pub mod vip;
