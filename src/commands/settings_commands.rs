use std::collections::HashMap;

use crate::config::AiConfig;
use crate::db::settings_repo;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn get_settings(state: &AppState) -> AppResult<HashMap<String, String>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let settings = settings_repo::get_all_settings(&state)?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn update_settings(state: &AppState, key: String, value: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || settings_repo::set_setting(&state, &key, &value))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

/// The base config from the environment with `ai.*` settings rows applied on
/// top. Read per turn so settings changes take effect without a restart.
pub fn effective_ai_config(state: &AppState) -> AppResult<AiConfig> {
    let mut config = state.config.clone();
    for (key, value) in settings_repo::ai_overrides(state)? {
        config.apply_override(&key, &value);
    }
    Ok(config)
}
