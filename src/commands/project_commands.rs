use crate::agent::pixels;
use crate::auth;
use crate::db::project_repo;
use crate::error::{AppError, AppResult};
use crate::models::project::{self, CreateProjectRequest, Project, UpdateProjectRequest};
use crate::state::AppState;

pub async fn create_project(
    state: &AppState,
    token: String,
    req: CreateProjectRequest,
) -> AppResult<Project> {
    if req.title.trim().is_empty() {
        return Err(AppError::validation("title", "Title is required"));
    }
    if let (Some(min), Some(max)) = (req.budget_min, req.budget_max) {
        if min > max {
            return Err(AppError::validation("budget_min", "Budget range is inverted"));
        }
    }

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        project_repo::create_project(&state, &user.id, req)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn get_project(state: &AppState, id: String) -> AppResult<Project> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || project_repo::get_project(&state, &id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn list_projects(
    state: &AppState,
    owner_id: Option<String>,
    status: Option<String>,
) -> AppResult<Vec<Project>> {
    if let Some(s) = status.as_deref() {
        if !project::is_valid_status(s) {
            return Err(AppError::InvalidRequest(format!("Unknown status {s}")));
        }
    }

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        project_repo::list_projects(&state, owner_id.as_deref(), status.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn update_project(
    state: &AppState,
    token: String,
    id: String,
    req: UpdateProjectRequest,
) -> AppResult<Project> {
    if let Some(s) = req.status.as_deref() {
        if !project::is_valid_status(s) {
            return Err(AppError::InvalidRequest(format!("Unknown status {s}")));
        }
    }

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let project = project_repo::get_project(&state, &id)?;
        if project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Project {id} is not owned by the signed-in user"
            )));
        }
        project_repo::update_project(&state, &id, req)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Delete the project row (quotes and join requests cascade) and its images.
pub async fn delete_project(state: &AppState, token: String, id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let project = project_repo::get_project(&state, &id)?;
        if project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Project {id} is not owned by the signed-in user"
            )));
        }
        project_repo::delete_project(&state, &id)?;
        state.store.delete_namespace("projects", &id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Store a gallery image under the project's namespace and return its URL.
pub async fn upload_project_image(
    state: &AppState,
    token: String,
    id: String,
    bytes: Vec<u8>,
) -> AppResult<String> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let project = project_repo::get_project(&state, &id)?;
        if project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Project {id} is not owned by the signed-in user"
            )));
        }

        let img = pixels::decode(&bytes)?;
        let img = pixels::fit_within(img, state.config.max_image_dim);
        let png = pixels::encode_png(&img)?;
        let file = format!("photo-{}.png", uuid::Uuid::new_v4());
        state.store.put("projects", &id, &file, &png)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::SignUpRequest;

    async fn owner_token(state: &AppState) -> String {
        crate::commands::profile_commands::sign_up(
            state,
            SignUpRequest {
                email: format!("{}@example.com", uuid::Uuid::new_v4()),
                display_name: "Owner".into(),
                role: "owner".into(),
            },
        )
        .await
        .unwrap()
        .token
    }

    fn project_req(title: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            title: title.into(),
            description: "backyard redo".into(),
            location: Some("Haifa".into()),
            budget_min: Some(10_000),
            budget_max: Some(40_000),
        }
    }

    #[tokio::test]
    async fn create_list_and_filter_by_status() {
        let state = AppState::for_tests();
        let token = owner_token(&state).await;

        let p = create_project(&state, token.clone(), project_req("Backyard")).await.unwrap();
        assert_eq!(p.status, project::STATUS_OPEN);

        update_project(
            &state,
            token.clone(),
            p.id.clone(),
            UpdateProjectRequest {
                status: Some(project::STATUS_IN_PROGRESS.into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let open = list_projects(&state, None, Some(project::STATUS_OPEN.into())).await.unwrap();
        assert!(open.is_empty());
        let in_progress = list_projects(&state, None, Some(project::STATUS_IN_PROGRESS.into()))
            .await
            .unwrap();
        assert_eq!(in_progress.len(), 1);
    }

    #[tokio::test]
    async fn only_the_owner_can_update() {
        let state = AppState::for_tests();
        let owner = owner_token(&state).await;
        let stranger = owner_token(&state).await;

        let p = create_project(&state, owner, project_req("Front yard")).await.unwrap();
        let err = update_project(
            &state,
            stranger,
            p.id,
            UpdateProjectRequest {
                title: Some("hijacked".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn inverted_budget_is_rejected() {
        let state = AppState::for_tests();
        let token = owner_token(&state).await;
        let mut req = project_req("Bad budget");
        req.budget_min = Some(50_000);
        req.budget_max = Some(10_000);
        let err = create_project(&state, token, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_removes_row_and_images() {
        let state = AppState::for_tests();
        let token = owner_token(&state).await;
        let p = create_project(&state, token.clone(), project_req("Gone soon")).await.unwrap();

        let url = upload_project_image(
            &state,
            token.clone(),
            p.id.clone(),
            pixels::placeholder_png(64, 64),
        )
        .await
        .unwrap();
        assert!(state.store.get(&url).is_ok());

        delete_project(&state, token, p.id.clone()).await.unwrap();
        assert!(state.store.get(&url).is_err());
        assert!(get_project(&state, p.id).await.is_err());
    }
}
