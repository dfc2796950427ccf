use tokio_util::sync::CancellationToken;

use crate::agent::chat_client::{ChatCompleter, HttpChatClient};
use crate::agent::dispatcher::{self, AgentReply};
use crate::agent::image_client::{HttpImageClient, ImageBackend};
use crate::agent::pixels;
use crate::agent::resolver::ImageResolver;
use crate::agent::AgentAction;
use crate::auth;
use crate::commands::settings_commands;
use crate::config::AiConfig;
use crate::db::{chat_repo, message_repo};
use crate::error::{AppError, AppResult};
use crate::models::chat::{Chat, CreateChatRequest};
use crate::models::message::{ChatContent, ChatMessage, ROLE_ASSISTANT, ROLE_USER};
use crate::state::AppState;

pub async fn create_chat(state: &AppState, token: String, req: CreateChatRequest) -> AppResult<Chat> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        chat_repo::create_chat(&state, &user.id, req)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn list_chats(state: &AppState, token: String) -> AppResult<Vec<Chat>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let user = auth::current_user(&state, &token)?;
        chat_repo::list_chats(&state, &user.id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn get_messages(state: &AppState, token: String, chat_id: String) -> AppResult<Vec<ChatMessage>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let _ = owned_chat(&state, &token, &chat_id)?;
        message_repo::get_messages(&state, &chat_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn delete_chat(state: &AppState, token: String, chat_id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let _ = owned_chat(&state, &token, &chat_id)?;
        message_repo::delete_messages_for_chat(&state, &chat_id)?;
        chat_repo::delete_chat(&state, &chat_id)?;
        state.store.delete_namespace("chats", &chat_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Run one design-chat turn against the production HTTP backends.
pub async fn send_turn(
    state: &AppState,
    token: String,
    chat_id: String,
    text: String,
    uploads: Vec<Vec<u8>>,
) -> AppResult<ChatMessage> {
    let config = load_effective_config(state).await?;
    let chat_backend = HttpChatClient::new(state.http.clone(), &config);
    let image_backend = HttpImageClient::new(state.http.clone(), &config);
    run_guarded_turn(state, token, chat_id, text, uploads, &chat_backend, &image_backend, config)
        .await
}

/// Same as [`send_turn`] with the endpoint seams injected. Tests drive this
/// with scripted fakes.
pub async fn send_turn_with(
    state: &AppState,
    token: String,
    chat_id: String,
    text: String,
    uploads: Vec<Vec<u8>>,
    chat_backend: &dyn ChatCompleter,
    image_backend: &dyn ImageBackend,
) -> AppResult<ChatMessage> {
    let config = load_effective_config(state).await?;
    run_guarded_turn(state, token, chat_id, text, uploads, chat_backend, image_backend, config)
        .await
}

async fn load_effective_config(state: &AppState) -> AppResult<AiConfig> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || settings_commands::effective_ai_config(&state))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

#[allow(clippy::too_many_arguments)]
async fn run_guarded_turn(
    state: &AppState,
    token: String,
    chat_id: String,
    text: String,
    uploads: Vec<Vec<u8>>,
    chat_backend: &dyn ChatCompleter,
    image_backend: &dyn ImageBackend,
    config: AiConfig,
) -> AppResult<ChatMessage> {
    if text.trim().is_empty() && uploads.is_empty() {
        return Err(AppError::validation("text", "Message is empty"));
    }

    // Normalize uploads up front so a bad file surfaces as a field error
    // before anything is persisted.
    let mut normalized_uploads = Vec::with_capacity(uploads.len());
    for bytes in &uploads {
        let img = pixels::decode(bytes)
            .map_err(|e| AppError::validation("image", e.to_string()))?;
        normalized_uploads.push(pixels::encode_png(&pixels::fit_within(img, config.max_image_dim))?);
    }

    let (user_id, history) = {
        let state = state.clone();
        let token = token.clone();
        let chat_id = chat_id.clone();
        tokio::task::spawn_blocking(move || -> AppResult<(String, Vec<ChatMessage>)> {
            let chat = owned_chat(&state, &token, &chat_id)?;
            let history = message_repo::get_messages(&state, &chat_id)?;
            Ok((chat.user_id, history))
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
    };
    log::info!(
        "send_turn: chat_id={}, user_id={}, text_len={}, uploads={}",
        chat_id,
        user_id,
        text.len(),
        normalized_uploads.len()
    );

    // One turn per chat at a time; the token also serves cancel_turn.
    let cancel = CancellationToken::new();
    {
        let mut turns = state.active_turns.lock().await;
        if turns.contains_key(&chat_id) {
            return Err(AppError::InvalidRequest(format!(
                "Chat {chat_id} already has a turn in flight"
            )));
        }
        turns.insert(chat_id.clone(), cancel.clone());
    }

    let result = run_turn_inner(
        state,
        &chat_id,
        &text,
        normalized_uploads,
        &config,
        chat_backend,
        image_backend,
        history,
        cancel.clone(),
    )
    .await;

    state.active_turns.lock().await.remove(&chat_id);
    result
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_inner(
    state: &AppState,
    chat_id: &str,
    text: &str,
    uploads: Vec<Vec<u8>>,
    config: &AiConfig,
    chat_backend: &dyn ChatCompleter,
    image_backend: &dyn ImageBackend,
    history: Vec<ChatMessage>,
    cancel: CancellationToken,
) -> AppResult<ChatMessage> {
    // Persist the user's turn, uploads included, before calling upstream.
    let mut user_parts = Vec::new();
    if !text.trim().is_empty() {
        user_parts.push(ChatContent::text(text));
    }
    for png in &uploads {
        let file = format!("upload-{}.png", uuid::Uuid::new_v4());
        let url = state.store.put("chats", chat_id, &file, png)?;
        user_parts.push(ChatContent::image(url));
    }
    let user_msg = ChatMessage::new(chat_id, ROLE_USER, &user_parts);
    save_message(state, &user_msg).await?;

    let resolver = ImageResolver::new(
        state.store.clone(),
        state.http.clone(),
        state.image_cache.clone(),
    );

    let reply: AgentReply = tokio::select! {
        _ = cancel.cancelled() => {
            log::info!("Turn cancelled for chat {}", chat_id);
            AgentReply {
                action: AgentAction::Chat,
                text: "The turn was cancelled.".to_string(),
                image_png: None,
            }
        }
        reply = dispatcher::run_turn(
            chat_backend,
            image_backend,
            &resolver,
            config,
            &history,
            text,
            &uploads,
        ) => reply,
    };

    let mut assistant_parts = vec![ChatContent::text(&reply.text)];
    if let Some(png) = &reply.image_png {
        let file = format!("design-{}.png", uuid::Uuid::new_v4());
        let url = state.store.put("chats", chat_id, &file, png)?;
        assistant_parts.push(ChatContent::image(url));
    }
    let assistant_msg = ChatMessage::new(chat_id, ROLE_ASSISTANT, &assistant_parts);
    save_message(state, &assistant_msg).await?;

    Ok(assistant_msg)
}

/// Cancel the in-flight turn for a chat, if any. A no-op otherwise.
pub async fn cancel_turn(state: &AppState, token: String, chat_id: String) -> AppResult<()> {
    {
        let state = state.clone();
        let token = token.clone();
        let chat_id = chat_id.clone();
        tokio::task::spawn_blocking(move || owned_chat(&state, &token, &chat_id).map(|_| ()))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
    }

    let turns = state.active_turns.lock().await;
    if let Some(cancel) = turns.get(&chat_id) {
        cancel.cancel();
        log::info!("Cancellation requested for chat {}", chat_id);
    }
    Ok(())
}

fn owned_chat(state: &AppState, token: &str, chat_id: &str) -> AppResult<Chat> {
    let user = auth::current_user(state, token)?;
    let chat = chat_repo::get_chat(state, chat_id)?;
    if chat.user_id != user.id {
        return Err(AppError::NotFound(format!("Chat {chat_id} not found")));
    }
    Ok(chat)
}

async fn save_message(state: &AppState, msg: &ChatMessage) -> AppResult<()> {
    let state = state.clone();
    let msg = msg.clone();
    tokio::task::spawn_blocking(move || {
        message_repo::save_message(&state, &msg)?;
        chat_repo::touch_chat(&state, &msg.chat_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{FakeChat, FakeImages};
    use crate::models::user::SignUpRequest;

    async fn setup() -> (AppState, String, String) {
        let state = AppState::for_tests();
        let token = crate::commands::profile_commands::sign_up(
            &state,
            SignUpRequest {
                email: "noa@example.com".into(),
                display_name: "Noa".into(),
                role: "owner".into(),
            },
        )
        .await
        .unwrap()
        .token;
        let chat = create_chat(
            &state,
            token.clone(),
            CreateChatRequest { project_id: None, title: "Backyard ideas".into() },
        )
        .await
        .unwrap();
        (state, token, chat.id)
    }

    #[tokio::test]
    async fn generate_turn_persists_both_messages_and_the_image() {
        let (state, token, chat_id) = setup().await;
        let chat_backend = FakeChat::replies(vec![Ok(
            r#"{"action":"generate_image","prompt":"a rose garden"}"#.into(),
        )]);
        let image_backend = FakeImages::ok(b"fresh png".to_vec());

        let assistant = send_turn_with(
            &state,
            token.clone(),
            chat_id.clone(),
            "draw me a rose garden".into(),
            vec![],
            &chat_backend,
            &image_backend,
        )
        .await
        .unwrap();

        let url = assistant.last_image_url().expect("assistant turn has an image");
        assert!(url.starts_with("store://chats/"));
        assert_eq!(state.store.get(&url).unwrap(), b"fresh png");

        let messages = get_messages(&state, token, chat_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ROLE_USER);
        assert_eq!(messages[1].role, ROLE_ASSISTANT);
    }

    #[tokio::test]
    async fn classifier_outage_still_persists_a_text_reply() {
        let (state, token, chat_id) = setup().await;
        let chat_backend = FakeChat::replies(vec![
            Err("classifier down".into()),
            Ok("Let's talk plants instead.".into()),
        ]);
        let image_backend = FakeImages::failing("down");

        let assistant = send_turn_with(
            &state,
            token,
            chat_id,
            "תוסיף לה עצים".into(),
            vec![],
            &chat_backend,
            &image_backend,
        )
        .await
        .unwrap();
        assert!(assistant.last_image_url().is_none());
        assert_eq!(assistant.text(), "Let's talk plants instead.");
    }

    #[tokio::test]
    async fn uploads_are_stored_on_the_user_message() {
        let (state, token, chat_id) = setup().await;
        let chat_backend = FakeChat::replies(vec![
            Ok(r#"{"action":"edit_image","prompt":"add a fountain"}"#.into()),
        ]);
        let image_backend = FakeImages::ok(b"edited".to_vec());
        let upload = pixels::placeholder_png(64, 64);

        send_turn_with(
            &state,
            token.clone(),
            chat_id.clone(),
            "add a fountain".into(),
            vec![upload],
            &chat_backend,
            &image_backend,
        )
        .await
        .unwrap();

        let messages = get_messages(&state, token, chat_id).await.unwrap();
        let user_url = messages[0].last_image_url().expect("upload stored on user turn");
        assert!(state.store.get(&user_url).is_ok());
    }

    #[tokio::test]
    async fn non_image_upload_is_a_field_error() {
        let (state, token, chat_id) = setup().await;
        let chat_backend = FakeChat::always("unused");
        let image_backend = FakeImages::ok(vec![]);

        let err = send_turn_with(
            &state,
            token,
            chat_id,
            "here is a picture".into(),
            vec![b"definitely not an image".to_vec()],
            &chat_backend,
            &image_backend,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "image"));
    }

    #[tokio::test]
    async fn second_concurrent_turn_is_rejected() {
        let (state, token, chat_id) = setup().await;
        state
            .active_turns
            .lock()
            .await
            .insert(chat_id.clone(), CancellationToken::new());

        let chat_backend = FakeChat::always("unused");
        let image_backend = FakeImages::ok(vec![]);
        let err = send_turn_with(
            &state,
            token,
            chat_id,
            "hello".into(),
            vec![],
            &chat_backend,
            &image_backend,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn cancel_turn_fires_the_active_token() {
        let (state, token, chat_id) = setup().await;
        let cancel = CancellationToken::new();
        state
            .active_turns
            .lock()
            .await
            .insert(chat_id.clone(), cancel.clone());

        cancel_turn(&state, token, chat_id).await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn strangers_cannot_read_a_chat() {
        let (state, _token, chat_id) = setup().await;
        let stranger = crate::commands::profile_commands::sign_up(
            &state,
            SignUpRequest {
                email: "other@example.com".into(),
                display_name: "Other".into(),
                role: "owner".into(),
            },
        )
        .await
        .unwrap()
        .token;

        let err = get_messages(&state, stranger, chat_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
