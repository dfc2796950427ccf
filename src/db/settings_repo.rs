use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::settings::AppSettings;
use crate::state::AppState;

/// Settings rows under this prefix override fields of the AI endpoint
/// configuration (see config::AiConfig::apply_override).
pub const AI_PREFIX: &str = "ai.";

pub fn set_setting(state: &AppState, key: &str, value: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(AppError::InvalidRequest("Settings key is empty".into()));
    }
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now')) \
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub fn get_all_settings(state: &AppState) -> AppResult<Vec<AppSettings>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare("SELECT key, value, updated_at FROM settings ORDER BY key")
        .map_err(|e| AppError::Database(e.to_string()))?;

    let settings = stmt
        .query_map([], |row| {
            Ok(AppSettings {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(settings)
}

/// The `ai.*` rows only, as key/value pairs ready to fold onto a config.
pub fn ai_overrides(state: &AppState) -> AppResult<Vec<(String, String)>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare("SELECT key, value FROM settings WHERE key LIKE ?1 ORDER BY key")
        .map_err(|e| AppError::Database(e.to_string()))?;

    let pairs = stmt
        .query_map(params![format!("{AI_PREFIX}%")], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(pairs)
}
