use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::message::ChatMessage;
use crate::state::AppState;

pub fn save_message(state: &AppState, msg: &ChatMessage) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute(
        "INSERT INTO messages (id, chat_id, role, content_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![msg.id, msg.chat_id, msg.role, msg.content_json, msg.created_at],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub fn get_messages(state: &AppState, chat_id: &str) -> AppResult<Vec<ChatMessage>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare("SELECT id, chat_id, role, content_json, created_at FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC")
        .map_err(|e| AppError::Database(e.to_string()))?;

    let messages = stmt
        .query_map(params![chat_id], |row| {
            Ok(ChatMessage {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                role: row.get(2)?,
                content_json: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(messages)
}

pub fn delete_messages_for_chat(state: &AppState, chat_id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
