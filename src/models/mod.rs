pub mod chat;
pub mod join_request;
pub mod message;
pub mod project;
pub mod quote;
pub mod settings;
pub mod user;
