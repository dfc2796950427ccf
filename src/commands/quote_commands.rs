use crate::auth;
use crate::db::{project_repo, quote_repo};
use crate::error::{AppError, AppResult};
use crate::models::quote::{Quote, SubmitQuoteRequest};
use crate::state::AppState;

/// Submit a quote for a project role tag. A second submission for the same
/// (project_id, tag) pair updates the existing record in place.
pub async fn submit_quote(
    state: &AppState,
    token: String,
    req: SubmitQuoteRequest,
) -> AppResult<Quote> {
    if req.tag.trim().is_empty() {
        return Err(AppError::validation("tag", "A role tag is required"));
    }
    if req.price_min < 0 || req.price_max < req.price_min {
        return Err(AppError::validation("price_min", "Price range is invalid"));
    }

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        // Submitting against a missing project is a 404, not a dangling row.
        let _ = project_repo::get_project(&state, &req.project_id)?;
        quote_repo::upsert_quote(&state, &user.id, &req)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn list_quotes(state: &AppState, project_id: String) -> AppResult<Vec<Quote>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || quote_repo::list_quotes_for_project(&state, &project_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn withdraw_quote(state: &AppState, token: String, quote_id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        let quote = quote_repo::get_quote(&state, &quote_id)?;
        let project = project_repo::get_project(&state, &quote.project_id)?;
        if quote.created_by != user.id && project.owner_id != user.id {
            return Err(AppError::InvalidRequest(format!(
                "Quote {quote_id} can only be withdrawn by its author or the project owner"
            )));
        }
        quote_repo::delete_quote(&state, &quote_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::CreateProjectRequest;
    use crate::models::user::SignUpRequest;

    async fn setup() -> (AppState, String, String) {
        let state = AppState::for_tests();
        let token = crate::commands::profile_commands::sign_up(
            &state,
            SignUpRequest {
                email: "owner@example.com".into(),
                display_name: "Owner".into(),
                role: "owner".into(),
            },
        )
        .await
        .unwrap()
        .token;
        let project = crate::commands::project_commands::create_project(
            &state,
            token.clone(),
            CreateProjectRequest {
                title: "Garden".into(),
                description: String::new(),
                location: None,
                budget_min: None,
                budget_max: None,
            },
        )
        .await
        .unwrap();
        (state, token, project.id)
    }

    fn quote_req(project_id: &str, tag: &str, min: i64, max: i64) -> SubmitQuoteRequest {
        SubmitQuoteRequest {
            project_id: project_id.into(),
            tag: tag.into(),
            price_min: min,
            price_max: max,
            note: None,
        }
    }

    #[tokio::test]
    async fn resubmitting_same_tag_updates_in_place() {
        let (state, token, project_id) = setup().await;

        let first = submit_quote(&state, token.clone(), quote_req(&project_id, "gardener", 100, 200))
            .await
            .unwrap();
        let second = submit_quote(&state, token.clone(), quote_req(&project_id, "gardener", 150, 300))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.price_min, 150);
        let all = list_quotes(&state, project_id).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn different_tags_coexist() {
        let (state, token, project_id) = setup().await;
        submit_quote(&state, token.clone(), quote_req(&project_id, "gardener", 100, 200))
            .await
            .unwrap();
        submit_quote(&state, token.clone(), quote_req(&project_id, "electrician", 500, 900))
            .await
            .unwrap();
        assert_eq!(list_quotes(&state, project_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn quote_for_missing_project_is_not_found() {
        let (state, token, _project_id) = setup().await;
        let err = submit_quote(&state, token, quote_req("no-such-project", "gardener", 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn inverted_price_range_is_rejected() {
        let (state, token, project_id) = setup().await;
        let err = submit_quote(&state, token, quote_req(&project_id, "gardener", 300, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn withdraw_deletes_the_quote() {
        let (state, token, project_id) = setup().await;
        let quote = submit_quote(&state, token.clone(), quote_req(&project_id, "gardener", 1, 2))
            .await
            .unwrap();
        withdraw_quote(&state, token, quote.id).await.unwrap();
        assert!(list_quotes(&state, project_id).await.unwrap().is_empty());
    }
}
