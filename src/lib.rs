pub mod agent;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;

use state::AppState;

/// Initialize the database, storage root and configuration, and return the
/// shared application state.
pub fn init() -> anyhow::Result<AppState> {
    let conn = db::migrations::init_db()?;
    let store_dir = db::migrations::get_store_dir();
    let config = config::AiConfig::from_env();
    log::info!(
        "GardenHub starting (chat model {}, image store {})",
        config.chat_model,
        store_dir.display()
    );
    Ok(AppState::new(conn, config, storage::ImageStore::new(store_dir)))
}
