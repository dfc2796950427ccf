use crate::auth;
use crate::db::{join_request_repo, project_repo};
use crate::error::{AppError, AppResult};
use crate::models::join_request::{JoinRequest, SubmitJoinRequest, JOIN_ACCEPTED, JOIN_REJECTED};
use crate::models::user::ROLE_PROFESSIONAL;
use crate::state::AppState;

pub async fn submit_join_request(
    state: &AppState,
    token: String,
    req: SubmitJoinRequest,
) -> AppResult<JoinRequest> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        if user.role != ROLE_PROFESSIONAL {
            return Err(AppError::InvalidRequest(
                "Only professionals can request to join a project".into(),
            ));
        }
        let _ = project_repo::get_project(&state, &req.project_id)?;
        join_request_repo::create_join_request(
            &state,
            &req.project_id,
            &user.id,
            req.message.as_deref(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Join requests for a project, visible to its owner only.
pub async fn list_join_requests(
    state: &AppState,
    token: String,
    project_id: String,
) -> AppResult<Vec<JoinRequest>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let project = project_repo::get_project(&state, &project_id)?;
        if project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Project {project_id} is not owned by the signed-in user"
            )));
        }
        join_request_repo::list_join_requests_for_project(&state, &project_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn accept_join_request(state: &AppState, token: String, id: String) -> AppResult<JoinRequest> {
    resolve(state, token, id, JOIN_ACCEPTED).await
}

pub async fn reject_join_request(state: &AppState, token: String, id: String) -> AppResult<JoinRequest> {
    resolve(state, token, id, JOIN_REJECTED).await
}

async fn resolve(state: &AppState, token: String, id: String, status: &'static str) -> AppResult<JoinRequest> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let request = join_request_repo::get_join_request(&state, &id)?;
        let project = project_repo::get_project(&state, &request.project_id)?;
        if project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Join request {id} belongs to a project the signed-in user does not own"
            )));
        }
        join_request_repo::resolve_join_request(&state, &id, status)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::join_request::JOIN_PENDING;
    use crate::models::project::CreateProjectRequest;
    use crate::models::user::SignUpRequest;

    async fn token(state: &AppState, role: &str) -> String {
        crate::commands::profile_commands::sign_up(
            state,
            SignUpRequest {
                email: format!("{}@example.com", uuid::Uuid::new_v4()),
                display_name: "Someone".into(),
                role: role.into(),
            },
        )
        .await
        .unwrap()
        .token
    }

    async fn setup() -> (AppState, String, String, String) {
        let state = AppState::for_tests();
        let owner = token(&state, "owner").await;
        let pro = token(&state, "professional").await;
        let project = crate::commands::project_commands::create_project(
            &state,
            owner.clone(),
            CreateProjectRequest {
                title: "Terrace".into(),
                description: String::new(),
                location: None,
                budget_min: None,
                budget_max: None,
            },
        )
        .await
        .unwrap();
        (state, owner, pro, project.id)
    }

    #[tokio::test]
    async fn submit_accept_flow() {
        let (state, owner, pro, project_id) = setup().await;
        let request = submit_join_request(
            &state,
            pro,
            SubmitJoinRequest {
                project_id: project_id.clone(),
                message: Some("I can do the stonework".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(request.status, JOIN_PENDING);

        let accepted = accept_join_request(&state, owner.clone(), request.id).await.unwrap();
        assert_eq!(accepted.status, "accepted");

        let listed = list_join_requests(&state, owner, project_id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn owners_cannot_submit_join_requests() {
        let (state, owner, _pro, project_id) = setup().await;
        let err = submit_join_request(
            &state,
            owner,
            SubmitJoinRequest { project_id, message: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn resolved_requests_cannot_flip() {
        let (state, owner, pro, project_id) = setup().await;
        let request = submit_join_request(
            &state,
            pro,
            SubmitJoinRequest { project_id, message: None },
        )
        .await
        .unwrap();

        reject_join_request(&state, owner.clone(), request.id.clone()).await.unwrap();
        let err = accept_join_request(&state, owner, request.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn duplicate_request_is_rejected() {
        let (state, _owner, pro, project_id) = setup().await;
        submit_join_request(
            &state,
            pro.clone(),
            SubmitJoinRequest { project_id: project_id.clone(), message: None },
        )
        .await
        .unwrap();
        let err = submit_join_request(
            &state,
            pro,
            SubmitJoinRequest { project_id, message: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
