pub mod chat_repo;
pub mod join_request_repo;
pub mod message_repo;
pub mod migrations;
pub mod project_repo;
pub mod quote_repo;
pub mod settings_repo;
pub mod user_repo;
