use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::user::{SignUpRequest, UpdateProfileRequest, User};
use crate::state::AppState;

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: row.get(3)?,
        profession: row.get(4)?,
        phone: row.get(5)?,
        location: row.get(6)?,
        bio: row.get(7)?,
        avatar_url: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const USER_COLS: &str =
    "id, email, display_name, role, profession, phone, location, bio, avatar_url, created_at, updated_at";

pub fn create_user(state: &AppState, req: &SignUpRequest) -> AppResult<User> {
    let id = uuid::Uuid::new_v4().to_string();
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    db.execute(
        "INSERT INTO users (id, email, display_name, role) VALUES (?1, ?2, ?3, ?4)",
        params![id, req.email, req.display_name, req.role],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::InvalidRequest(format!("Email {} is already registered", req.email))
        }
        _ => AppError::Database(e.to_string()),
    })?;

    drop(db);
    get_user(state, &id)
}

pub fn get_user(state: &AppState, id: &str) -> AppResult<User> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
        params![id],
        |row| row_to_user(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("User {id} not found")),
        _ => AppError::Database(e.to_string()),
    })
}

pub fn get_user_by_email(state: &AppState, email: &str) -> AppResult<User> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
        params![email],
        |row| row_to_user(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("No account for {email}"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

pub fn update_user(state: &AppState, id: &str, req: UpdateProfileRequest) -> AppResult<User> {
    let existing = get_user(state, id)?;
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    let display_name = req.display_name.unwrap_or(existing.display_name);
    let profession = req.profession.or(existing.profession);
    let phone = req.phone.or(existing.phone);
    let location = req.location.or(existing.location);
    let bio = req.bio.or(existing.bio);
    let avatar_url = req.avatar_url.or(existing.avatar_url);

    db.execute(
        "UPDATE users SET display_name=?1, profession=?2, phone=?3, location=?4, bio=?5, avatar_url=?6, updated_at=datetime('now') WHERE id=?7",
        params![display_name, profession, phone, location, bio, avatar_url, id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    drop(db);
    get_user(state, id)
}

pub fn delete_user(state: &AppState, id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM users WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
