use base64::Engine;
use serde_json::json;

use crate::agent::chat_client::{ChatCompleter, CompletionRequest, WireMessage};
use crate::agent::classifier::{self, AgentAction, AgentDecision};
use crate::agent::image_client::{ImageBackend, ImageOptions};
use crate::agent::pixels;
use crate::agent::resolver::ImageResolver;
use crate::config::AiConfig;
use crate::models::message::{ChatMessage, ROLE_SYSTEM, ROLE_USER};

const ASSISTANT_SYSTEM_PROMPT: &str = "\
You are GardenHub's design assistant. You help property owners plan gardens, \
yards, and outdoor construction: plantings, paths, decks, pergolas, \
irrigation, lighting. Answer in the user's language, concretely and briefly.";

/// The outcome of one design-chat turn. `image_png` is set when the action
/// produced pixels; `text` is always set, even when every upstream call
/// failed.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub action: AgentAction,
    pub text: String,
    pub image_png: Option<Vec<u8>>,
}

/// Classify the turn and dispatch it. Infallible by design: image failures
/// degrade to a plain chat reply and chat failures degrade to a static
/// apology, so the caller always has something to show the user.
pub async fn run_turn(
    chat: &dyn ChatCompleter,
    images: &dyn ImageBackend,
    resolver: &ImageResolver,
    config: &AiConfig,
    history: &[ChatMessage],
    user_text: &str,
    uploads: &[Vec<u8>],
) -> AgentReply {
    let decision =
        classifier::classify(chat, config, history, user_text, uploads.len()).await;
    log::info!(
        "Turn classified: action={:?}, ref={:?}, second_ref={:?}",
        decision.action,
        decision.image_reference_index,
        decision.second_image_reference_index
    );
    dispatch(chat, images, resolver, config, history, user_text, uploads, decision).await
}

async fn dispatch(
    chat: &dyn ChatCompleter,
    images: &dyn ImageBackend,
    resolver: &ImageResolver,
    config: &AiConfig,
    history: &[ChatMessage],
    user_text: &str,
    uploads: &[Vec<u8>],
    decision: AgentDecision,
) -> AgentReply {
    let prompt = decision
        .prompt
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| user_text.to_string());

    match decision.action {
        AgentAction::Chat => AgentReply {
            action: AgentAction::Chat,
            text: plain_chat(chat, config, history, user_text, None).await,
            image_png: None,
        },

        AgentAction::ChatWithImageRef => {
            let image = match reference_bytes(resolver, history, decision.image_reference_index, uploads, 0).await {
                Some(bytes) => bytes,
                None => {
                    // Normalization should have degraded this already.
                    return AgentReply {
                        action: AgentAction::Chat,
                        text: plain_chat(chat, config, history, user_text, None).await,
                        image_png: None,
                    };
                }
            };
            AgentReply {
                action: AgentAction::ChatWithImageRef,
                text: plain_chat(chat, config, history, user_text, Some(&image)).await,
                image_png: None,
            }
        }

        AgentAction::GenerateImage => {
            if prompt.trim().is_empty() {
                return AgentReply {
                    action: AgentAction::Chat,
                    text: plain_chat(chat, config, history, user_text, None).await,
                    image_png: None,
                };
            }
            match images.generate(prompt, ImageOptions::from_config(config)).await {
                Ok(bytes) => AgentReply {
                    action: AgentAction::GenerateImage,
                    text: caption(&decision, "Here is the design I generated."),
                    image_png: Some(bytes),
                },
                Err(e) => {
                    log::warn!("Image generation failed, degrading to chat: {}", e);
                    chat_after_image_failure(chat, config, history, user_text, &e.to_string()).await
                }
            }
        }

        AgentAction::EditImage => {
            let source = match reference_bytes(resolver, history, decision.image_reference_index, uploads, 0).await {
                Some(bytes) => bytes,
                None => {
                    return AgentReply {
                        action: AgentAction::Chat,
                        text: plain_chat(chat, config, history, user_text, None).await,
                        image_png: None,
                    };
                }
            };
            match edit_with(images, config, prompt, vec![source]).await {
                Ok(bytes) => AgentReply {
                    action: AgentAction::EditImage,
                    text: caption(&decision, "Here is the edited design."),
                    image_png: Some(bytes),
                },
                Err(e) => {
                    log::warn!("Image edit failed, degrading to chat: {}", e);
                    chat_after_image_failure(chat, config, history, user_text, &e).await
                }
            }
        }

        AgentAction::CreateWithDualImages => {
            // References first (structure before inspiration, index order),
            // then fresh uploads fill whatever is still missing.
            let mut sources: Vec<Vec<u8>> = Vec::new();
            for idx in [decision.image_reference_index, decision.second_image_reference_index] {
                if sources.len() == 2 {
                    break;
                }
                if let Some(bytes) = reference_bytes(resolver, history, idx, &[], 0).await {
                    sources.push(bytes);
                }
            }
            for upload in uploads {
                if sources.len() == 2 {
                    break;
                }
                sources.push(upload.clone());
            }

            if sources.len() < 2 {
                log::warn!("Dual-image turn short on sources, degrading to chat");
                return AgentReply {
                    action: AgentAction::Chat,
                    text: plain_chat(chat, config, history, user_text, None).await,
                    image_png: None,
                };
            }

            let composite_prompt = format!(
                "Combine the two reference images into one new design. The first \
                 image supplies the layout and structure; the second supplies the \
                 style and inspiration. {prompt}"
            );
            match edit_with(images, config, composite_prompt, sources).await {
                Ok(bytes) => AgentReply {
                    action: AgentAction::CreateWithDualImages,
                    text: caption(&decision, "Here is the combined design."),
                    image_png: Some(bytes),
                },
                Err(e) => {
                    log::warn!("Dual-image composite failed, degrading to chat: {}", e);
                    chat_after_image_failure(chat, config, history, user_text, &e).await
                }
            }
        }
    }
}

fn caption(decision: &AgentDecision, fallback: &str) -> String {
    decision
        .explanation
        .clone()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Pick the image for a single-reference action: the freshest upload wins,
/// otherwise the resolved history reference.
async fn reference_bytes(
    resolver: &ImageResolver,
    history: &[ChatMessage],
    index: Option<usize>,
    uploads: &[Vec<u8>],
    upload_slot: usize,
) -> Option<Vec<u8>> {
    if let Some(upload) = uploads.get(upload_slot) {
        return Some(upload.clone());
    }
    let url = history.get(index?)?.last_image_url()?;
    Some(resolver.resolve(&url).await)
}

/// Normalize every input and call the edit endpoint. Returns a plain error
/// string so callers can log and degrade uniformly.
async fn edit_with(
    images: &dyn ImageBackend,
    config: &AiConfig,
    prompt: String,
    sources: Vec<Vec<u8>>,
) -> Result<Vec<u8>, String> {
    let mut prepared = Vec::with_capacity(sources.len());
    for bytes in &sources {
        prepared.push(pixels::prepare_for_edit(bytes, config).map_err(|e| e.to_string())?);
    }
    images
        .edit(prompt, prepared, ImageOptions::from_config(config))
        .await
        .map_err(|e| e.to_string())
}

/// Plain chat completion over the conversation. `reference_image` attaches
/// the image being discussed as an inline data URL part on the final user
/// message. Never fails; the static apology is the floor.
async fn plain_chat(
    chat: &dyn ChatCompleter,
    config: &AiConfig,
    history: &[ChatMessage],
    user_text: &str,
    reference_image: Option<&[u8]>,
) -> String {
    let mut messages = vec![WireMessage::text(ROLE_SYSTEM, ASSISTANT_SYSTEM_PROMPT)];
    for msg in history {
        let text = msg.text();
        if !text.is_empty() {
            messages.push(WireMessage::text(&msg.role, text));
        }
    }
    match reference_image {
        Some(bytes) => {
            let data_url = format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            );
            messages.push(WireMessage::parts(
                ROLE_USER,
                json!([
                    { "type": "text", "text": user_text },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ]),
            ));
        }
        None => messages.push(WireMessage::text(ROLE_USER, user_text)),
    }

    let request = CompletionRequest {
        model: config.chat_model.clone(),
        messages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        json_object: false,
    };

    match chat.complete(request).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("Chat completion failed: {}", e);
            "Sorry, I could not reach the design assistant just now. Please try again.".to_string()
        }
    }
}

async fn chat_after_image_failure(
    chat: &dyn ChatCompleter,
    config: &AiConfig,
    history: &[ChatMessage],
    user_text: &str,
    error: &str,
) -> AgentReply {
    let note = format!(
        "{user_text}\n\n(Note: image generation failed upstream ({error}); \
         answer in text and suggest what to try instead.)"
    );
    AgentReply {
        action: AgentAction::Chat,
        text: plain_chat(chat, config, history, &note, None).await,
        image_png: None,
    }
}
