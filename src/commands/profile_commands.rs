use crate::agent::pixels;
use crate::auth::{self, AuthSession};
use crate::db::user_repo;
use crate::error::{AppError, AppResult};
use crate::models::user::{SignUpRequest, UpdateProfileRequest, User};
use crate::state::AppState;

/// Longest edge kept for avatar images.
const AVATAR_MAX_DIM: u32 = 512;

pub async fn sign_up(state: &AppState, req: SignUpRequest) -> AppResult<AuthSession> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || auth::sign_up(&state, &req))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn sign_in(state: &AppState, email: String) -> AppResult<AuthSession> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || auth::sign_in(&state, &email))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn sign_out(state: &AppState, token: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || auth::sign_out(&state, &token))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn get_profile(state: &AppState, token: String) -> AppResult<User> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || auth::current_user(&state, &token))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn update_profile(
    state: &AppState,
    token: String,
    req: UpdateProfileRequest,
) -> AppResult<User> {
    if let Some(phone) = req.phone.as_deref() {
        validate_phone(phone)?;
    }

    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        user_repo::update_user(&state, &user.id, req)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Normalize the uploaded image to a bounded PNG, store it under the user's
/// namespace, and point the profile at it.
pub async fn upload_avatar(state: &AppState, token: String, bytes: Vec<u8>) -> AppResult<User> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;

        let img = pixels::decode(&bytes)?;
        let img = pixels::fit_within(img, AVATAR_MAX_DIM);
        let png = pixels::encode_png(&img)?;

        let url = state.store.put("avatars", &user.id, "avatar.png", &png)?;
        user_repo::update_user(
            &state,
            &user.id,
            UpdateProfileRequest {
                avatar_url: Some(url),
                ..Default::default()
            },
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Accept digits with optional +, spaces, and dashes; 9 to 13 digits total.
fn validate_phone(phone: &str) -> AppResult<()> {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let shape_ok = trimmed
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (c == '+' && i == 0));

    if !shape_ok || digits.len() < 9 || digits.len() > 13 {
        return Err(AppError::validation(
            "phone",
            format!("{phone:?} is not a valid phone number"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_up(state: &AppState) -> AuthSession {
        auth::sign_up(
            state,
            &SignUpRequest {
                email: "gila@example.com".into(),
                display_name: "Gila".into(),
                role: "professional".into(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn profile_update_round_trip() {
        let state = AppState::for_tests();
        let session = signed_up(&state);
        let user = update_profile(
            &state,
            session.token.clone(),
            UpdateProfileRequest {
                profession: Some("landscaper".into()),
                phone: Some("052-123-4567".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(user.profession.as_deref(), Some("landscaper"));
        assert_eq!(user.phone.as_deref(), Some("052-123-4567"));
    }

    #[tokio::test]
    async fn malformed_phone_is_a_field_error() {
        let state = AppState::for_tests();
        let session = signed_up(&state);
        let err = update_profile(
            &state,
            session.token.clone(),
            UpdateProfileRequest {
                phone: Some("call me".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "phone"));
    }

    #[tokio::test]
    async fn avatar_upload_is_resized_and_linked() {
        let state = AppState::for_tests();
        let session = signed_up(&state);
        let big = pixels::placeholder_png(2048, 1024);

        let user = upload_avatar(&state, session.token.clone(), big).await.unwrap();
        let url = user.avatar_url.expect("avatar url set");
        let stored = state.store.get(&url).unwrap();
        let img = pixels::decode(&stored).unwrap();
        let (w, h) = image::GenericImageView::dimensions(&img);
        assert!(w <= AVATAR_MAX_DIM && h <= AVATAR_MAX_DIM);
    }

    #[test]
    fn phone_validation_accepts_international_shapes() {
        assert!(validate_phone("+972 52 123 4567").is_ok());
        assert!(validate_phone("0521234567").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("phone: 0521234567").is_err());
    }
}
