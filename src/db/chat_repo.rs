use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::chat::{Chat, CreateChatRequest};
use crate::state::AppState;

fn row_to_chat(row: &rusqlite::Row) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        title: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const CHAT_COLS: &str = "id, user_id, project_id, title, created_at, updated_at";

pub fn create_chat(state: &AppState, user_id: &str, req: CreateChatRequest) -> AppResult<Chat> {
    let id = uuid::Uuid::new_v4().to_string();
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    db.execute(
        "INSERT INTO chats (id, user_id, project_id, title) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, req.project_id, req.title],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    drop(db);
    get_chat(state, &id)
}

pub fn get_chat(state: &AppState, id: &str) -> AppResult<Chat> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {CHAT_COLS} FROM chats WHERE id = ?1"),
        params![id],
        |row| row_to_chat(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("Chat {id} not found")),
        _ => AppError::Database(e.to_string()),
    })
}

pub fn list_chats(state: &AppState, user_id: &str) -> AppResult<Vec<Chat>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare(&format!(
            "SELECT {CHAT_COLS} FROM chats WHERE user_id = ?1 ORDER BY updated_at DESC"
        ))
        .map_err(|e| AppError::Database(e.to_string()))?;

    let chats = stmt
        .query_map(params![user_id], |row| row_to_chat(row))
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(chats)
}

pub fn touch_chat(state: &AppState, id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute(
        "UPDATE chats SET updated_at = datetime('now') WHERE id = ?1",
        params![id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub fn delete_chat(state: &AppState, id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM chats WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
