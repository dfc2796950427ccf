use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::join_request::{JoinRequest, JOIN_PENDING};
use crate::state::AppState;

fn row_to_join_request(row: &rusqlite::Row) -> rusqlite::Result<JoinRequest> {
    Ok(JoinRequest {
        id: row.get(0)?,
        project_id: row.get(1)?,
        professional_id: row.get(2)?,
        message: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const JOIN_COLS: &str = "id, project_id, professional_id, message, status, created_at, updated_at";

pub fn create_join_request(
    state: &AppState,
    project_id: &str,
    professional_id: &str,
    message: Option<&str>,
) -> AppResult<JoinRequest> {
    let id = uuid::Uuid::new_v4().to_string();
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;

    db.execute(
        "INSERT INTO join_requests (id, project_id, professional_id, message) VALUES (?1, ?2, ?3, ?4)",
        params![id, project_id, professional_id, message],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::InvalidRequest(format!(
                "Professional {professional_id} already requested to join project {project_id}"
            ))
        }
        _ => AppError::Database(e.to_string()),
    })?;

    drop(db);
    get_join_request(state, &id)
}

pub fn get_join_request(state: &AppState, id: &str) -> AppResult<JoinRequest> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.query_row(
        &format!("SELECT {JOIN_COLS} FROM join_requests WHERE id = ?1"),
        params![id],
        |row| row_to_join_request(row),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Join request {id} not found"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

pub fn list_join_requests_for_project(state: &AppState, project_id: &str) -> AppResult<Vec<JoinRequest>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare(&format!(
            "SELECT {JOIN_COLS} FROM join_requests WHERE project_id = ?1 ORDER BY created_at ASC"
        ))
        .map_err(|e| AppError::Database(e.to_string()))?;

    let requests = stmt
        .query_map(params![project_id], |row| row_to_join_request(row))
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(requests)
}

/// Transition a pending request to accepted or rejected. The status guard
/// lives in the UPDATE itself so concurrent resolves cannot both win.
pub fn resolve_join_request(state: &AppState, id: &str, status: &str) -> AppResult<JoinRequest> {
    let changed = {
        let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        db.execute(
            "UPDATE join_requests SET status = ?1, updated_at = datetime('now') \
             WHERE id = ?2 AND status = ?3",
            params![status, id, JOIN_PENDING],
        )
        .map_err(|e| AppError::Database(e.to_string()))?
    };

    if changed == 0 {
        // Missing row surfaces as NotFound; an existing row was resolved.
        let existing = get_join_request(state, id)?;
        return Err(AppError::InvalidRequest(format!(
            "Join request {id} is already {}",
            existing.status
        )));
    }
    get_join_request(state, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{project_repo, user_repo};
    use crate::models::join_request::{JOIN_ACCEPTED, JOIN_REJECTED};
    use crate::models::project::CreateProjectRequest;
    use crate::models::user::SignUpRequest;
    use crate::state::AppState;

    fn seeded() -> (AppState, String, String) {
        let state = AppState::for_tests();
        let owner = user_repo::create_user(
            &state,
            &SignUpRequest {
                email: "owner@example.com".into(),
                display_name: "Owner".into(),
                role: "owner".into(),
            },
        )
        .unwrap();
        let pro = user_repo::create_user(
            &state,
            &SignUpRequest {
                email: "pro@example.com".into(),
                display_name: "Pro".into(),
                role: "professional".into(),
            },
        )
        .unwrap();
        let project = project_repo::create_project(
            &state,
            &owner.id,
            CreateProjectRequest {
                title: "Terrace".into(),
                description: String::new(),
                location: None,
                budget_min: None,
                budget_max: None,
            },
        )
        .unwrap();
        (state, project.id, pro.id)
    }

    #[test]
    fn second_resolve_of_the_same_request_loses() {
        let (state, project_id, pro_id) = seeded();
        let request = create_join_request(&state, &project_id, &pro_id, None).unwrap();

        let accepted = resolve_join_request(&state, &request.id, JOIN_ACCEPTED).unwrap();
        assert_eq!(accepted.status, JOIN_ACCEPTED);

        // The losing resolve must not overwrite; the guard is in the UPDATE.
        let err = resolve_join_request(&state, &request.id, JOIN_REJECTED).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(get_join_request(&state, &request.id).unwrap().status, JOIN_ACCEPTED);
    }

    #[test]
    fn resolving_a_missing_request_is_not_found() {
        let (state, _project_id, _pro_id) = seeded();
        let err = resolve_join_request(&state, "nope", JOIN_ACCEPTED).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
