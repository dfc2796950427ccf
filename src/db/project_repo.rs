use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::project::{CreateProjectRequest, Project, UpdateProjectRequest};
use crate::state::AppState;

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        status: row.get(5)?,
        budget_min: row.get(6)?,
        budget_max: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const PROJECT_COLS: &str =
    "id, owner_id, title, description, location, status, budget_min, budget_max, created_at, updated_at";

pub fn create_project(state: &AppState, owner_id: &str, req: CreateProjectRequest) -> AppResult<Project> {
    let id = uuid::Uuid::new_v4().to_string();
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    db.execute(
        "INSERT INTO projects (id, owner_id, title, description, location, budget_min, budget_max) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, owner_id, req.title, req.description, req.location, req.budget_min, req.budget_max],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    drop(db);
    get_project(state, &id)
}

pub fn get_project(state: &AppState, id: &str) -> AppResult<Project> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"),
        params![id],
        |row| row_to_project(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Project {id} not found"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

pub fn list_projects(state: &AppState, owner_id: Option<&str>, status: Option<&str>) -> AppResult<Vec<Project>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match (owner_id, status) {
        (Some(owner), Some(status)) => (
            format!("SELECT {PROJECT_COLS} FROM projects WHERE owner_id = ?1 AND status = ?2 ORDER BY created_at DESC"),
            vec![Box::new(owner.to_string()), Box::new(status.to_string())],
        ),
        (Some(owner), None) => (
            format!("SELECT {PROJECT_COLS} FROM projects WHERE owner_id = ?1 ORDER BY created_at DESC"),
            vec![Box::new(owner.to_string())],
        ),
        (None, Some(status)) => (
            format!("SELECT {PROJECT_COLS} FROM projects WHERE status = ?1 ORDER BY created_at DESC"),
            vec![Box::new(status.to_string())],
        ),
        (None, None) => (
            format!("SELECT {PROJECT_COLS} FROM projects ORDER BY created_at DESC"),
            vec![],
        ),
    };

    let mut stmt = db.prepare(&sql).map_err(|e| AppError::Database(e.to_string()))?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let projects = stmt
        .query_map(params_refs.as_slice(), |row| row_to_project(row))
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(projects)
}

pub fn update_project(state: &AppState, id: &str, req: UpdateProjectRequest) -> AppResult<Project> {
    let existing = get_project(state, id)?;
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    let title = req.title.unwrap_or(existing.title);
    let description = req.description.unwrap_or(existing.description);
    let location = req.location.or(existing.location);
    let status = req.status.unwrap_or(existing.status);
    let budget_min = req.budget_min.or(existing.budget_min);
    let budget_max = req.budget_max.or(existing.budget_max);

    db.execute(
        "UPDATE projects SET title=?1, description=?2, location=?3, status=?4, budget_min=?5, budget_max=?6, updated_at=datetime('now') WHERE id=?7",
        params![title, description, location, status, budget_min, budget_max, id],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;

    drop(db);
    get_project(state, id)
}

pub fn delete_project(state: &AppState, id: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM projects WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
