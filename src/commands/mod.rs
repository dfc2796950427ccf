pub mod chat_commands;
pub mod join_commands;
pub mod profile_commands;
pub mod project_commands;
pub mod quote_commands;
pub mod settings_commands;
