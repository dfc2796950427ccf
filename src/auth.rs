use rusqlite::params;

use crate::db::user_repo;
use crate::error::{AppError, AppResult};
use crate::models::user::{SignUpRequest, User};
use crate::state::AppState;

/// Session lifetime. Tokens past this age resolve as signed-out.
const SESSION_DAYS: i64 = 30;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Create an account and sign it in. Credential verification is handled by
/// the external identity provider in front of this service; here a session
/// is keyed purely by its opaque token.
pub fn sign_up(state: &AppState, req: &SignUpRequest) -> AppResult<AuthSession> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(AppError::validation("email", "A valid email is required"));
    }
    if req.display_name.trim().is_empty() {
        return Err(AppError::validation("display_name", "Display name is required"));
    }

    let user = user_repo::create_user(state, req)?;
    let token = issue_token(state, &user.id)?;
    Ok(AuthSession { token, user })
}

pub fn sign_in(state: &AppState, email: &str) -> AppResult<AuthSession> {
    let user = user_repo::get_user_by_email(state, email)
        .map_err(|_| AppError::Unauthenticated(format!("No account for {email}")))?;
    let token = issue_token(state, &user.id)?;
    Ok(AuthSession { token, user })
}

pub fn sign_out(state: &AppState, token: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Resolve a session token to its user. Missing or expired tokens surface as
/// Unauthenticated so callers can redirect to sign-in.
pub fn current_user(state: &AppState, token: &str) -> AppResult<User> {
    let user_id: String = {
        let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        db.query_row(
            "SELECT user_id FROM auth_sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::Unauthenticated("Session expired or unknown".into())
            }
            _ => AppError::Database(e.to_string()),
        })?
    };
    user_repo::get_user(state, &user_id)
}

fn issue_token(state: &AppState, user_id: &str) -> AppResult<String> {
    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute(
        "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, expires_at],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up_req(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            display_name: "Noa".into(),
            role: "owner".into(),
        }
    }

    #[test]
    fn sign_up_then_resolve_token() {
        let state = AppState::for_tests();
        let session = sign_up(&state, &sign_up_req("noa@example.com")).unwrap();
        let user = current_user(&state, &session.token).unwrap();
        assert_eq!(user.email, "noa@example.com");
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let state = AppState::for_tests();
        let err = current_user(&state, "nope").unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn sign_out_invalidates_token() {
        let state = AppState::for_tests();
        let session = sign_up(&state, &sign_up_req("dan@example.com")).unwrap();
        sign_out(&state, &session.token).unwrap();
        assert!(current_user(&state, &session.token).is_err());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let state = AppState::for_tests();
        sign_up(&state, &sign_up_req("noa@example.com")).unwrap();
        let err = sign_up(&state, &sign_up_req("noa@example.com")).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn bad_email_is_a_field_validation_error() {
        let state = AppState::for_tests();
        let err = sign_up(&state, &sign_up_req("not-an-email")).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "email"));
    }
}
