use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::quote::{Quote, SubmitQuoteRequest};
use crate::state::AppState;

fn row_to_quote(row: &rusqlite::Row) -> rusqlite::Result<Quote> {
    Ok(Quote {
        id: row.get(0)?,
        project_id: row.get(1)?,
        tag: row.get(2)?,
        price_min: row.get(3)?,
        price_max: row.get(4)?,
        note: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const QUOTE_COLS: &str =
    "id, project_id, tag, price_min, price_max, note, created_by, created_at, updated_at";

/// Insert a quote, or update the existing record when the (project_id, tag)
/// pair is already present. The original id and created_at survive updates.
pub fn upsert_quote(state: &AppState, user_id: &str, req: &SubmitQuoteRequest) -> AppResult<Quote> {
    let id = uuid::Uuid::new_v4().to_string();
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    db.execute(
        "INSERT INTO quotes (id, project_id, tag, price_min, price_max, note, created_by) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (project_id, tag) DO UPDATE SET \
             price_min = excluded.price_min, \
             price_max = excluded.price_max, \
             note = excluded.note, \
             created_by = excluded.created_by, \
             updated_at = datetime('now')",
        params![id, req.project_id, req.tag, req.price_min, req.price_max, req.note, user_id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    drop(db);
    get_quote_by_tag(state, &req.project_id, &req.tag)
}

pub fn get_quote(state: &AppState, id: &str) -> AppResult<Quote> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {QUOTE_COLS} FROM quotes WHERE id = ?1"),
        params![id],
        |row| row_to_quote(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("Quote {id} not found")),
        _ => AppError::Database(e.to_string()),
    })
}

pub fn get_quote_by_tag(state: &AppState, project_id: &str, tag: &str) -> AppResult<Quote> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {QUOTE_COLS} FROM quotes WHERE project_id = ?1 AND tag = ?2"),
        params![project_id, tag],
        |row| row_to_quote(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("No quote for project {project_id} tag {tag}"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

pub fn list_quotes_for_project(state: &AppState, project_id: &str) -> AppResult<Vec<Quote>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare(&format!(
            "SELECT {QUOTE_COLS} FROM quotes WHERE project_id = ?1 ORDER BY tag"
        ))
        .map_err(|e| AppError::Database(e.to_string()))?;

    let quotes = stmt
        .query_map(params![project_id], |row| row_to_quote(row))
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(quotes)
}

pub fn delete_quote(state: &AppState, id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM quotes WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
