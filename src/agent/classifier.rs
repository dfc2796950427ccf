use serde::{Deserialize, Serialize};

use crate::agent::chat_client::{ChatCompleter, CompletionRequest, WireMessage};
use crate::config::AiConfig;
use crate::models::message::{ChatMessage, ROLE_SYSTEM, ROLE_USER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    Chat,
    GenerateImage,
    EditImage,
    ChatWithImageRef,
    CreateWithDualImages,
}

/// Per-turn classifier output. Indices point into the conversation history at
/// the message holding the referenced image. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecision {
    pub action: AgentAction,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "imageReferenceIndex")]
    pub image_reference_index: Option<usize>,
    #[serde(default, alias = "secondImageReferenceIndex")]
    pub second_image_reference_index: Option<usize>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl AgentDecision {
    pub fn chat(explanation: impl Into<String>) -> Self {
        AgentDecision {
            action: AgentAction::Chat,
            prompt: None,
            image_reference_index: None,
            second_image_reference_index: None,
            explanation: Some(explanation.into()),
        }
    }
}

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You route turns of a garden-design chat. Reply with a single JSON object:\n\
{\"action\": \"chat\" | \"generate_image\" | \"edit_image\" | \"chat_with_image_ref\" | \"create_with_dual_images\",\n \
\"prompt\": string, \"image_reference_index\": number, \"second_image_reference_index\": number, \"explanation\": string}\n\
Actions:\n\
- chat: plain text reply, no image work.\n\
- generate_image: create a brand new design image from the prompt.\n\
- edit_image: modify one existing image from the conversation.\n\
- chat_with_image_ref: answer a question about an existing image.\n\
- create_with_dual_images: combine two images, the first supplies layout \
(structure), the second supplies style (inspiration).\n\
Indices refer to the numbered history below. Only messages marked [image] \
hold images. Omit an index when the user means the most recent image.";

/// Decide what to do with the current turn. Never fails: any network or
/// parse problem falls back to a plain chat decision carrying the reason.
pub async fn classify(
    chat: &dyn ChatCompleter,
    config: &AiConfig,
    history: &[ChatMessage],
    user_text: &str,
    uploaded_images: usize,
) -> AgentDecision {
    let request = CompletionRequest {
        model: config.classifier_model.clone(),
        messages: vec![
            WireMessage::text(ROLE_SYSTEM, CLASSIFIER_SYSTEM_PROMPT),
            WireMessage::text(
                ROLE_USER,
                format!(
                    "History:\n{}\nUploaded with this turn: {} image(s)\nUser message: {}",
                    history_digest(history),
                    uploaded_images,
                    user_text
                ),
            ),
        ],
        temperature: 0.0,
        max_tokens: 300,
        json_object: true,
    };

    let decision = match chat.complete(request).await {
        Ok(raw) => match parse_decision(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("Classifier output unparsable, falling back to chat: {}", e);
                AgentDecision::chat(format!("Classifier output unparsable: {e}"))
            }
        },
        Err(e) => {
            log::warn!("Classifier call failed, falling back to chat: {}", e);
            AgentDecision::chat(format!("Classifier unavailable: {e}"))
        }
    };

    normalize(decision, history, user_text, uploaded_images)
}

/// One numbered line per message so the model can cite indices back.
fn history_digest(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return "(empty)".into();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let marker = if message_has_image(msg) { " [image]" } else { "" };
            let mut text = msg.text();
            if text.chars().count() > 160 {
                text = text.chars().take(160).collect::<String>() + "…";
            }
            format!("{i}: {}{marker}: {text}", msg.role)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_decision(raw: &str) -> Result<AgentDecision, serde_json::Error> {
    // Models occasionally wrap the object in a code fence despite the
    // response-format constraint.
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
    serde_json::from_str(trimmed)
}

pub fn message_has_image(msg: &ChatMessage) -> bool {
    msg.last_image_url().is_some()
}

/// Index of the most recent message holding an image, assistant-generated or
/// user-uploaded, latest by position.
pub fn latest_image_index(history: &[ChatMessage]) -> Option<usize> {
    history.iter().rposition(message_has_image)
}

/// Enforce the degradation rules: indices must point at image-bearing
/// messages, omitted indices default to the most recent image, and actions
/// that imply images the conversation does not have degrade to something
/// that can actually run.
fn normalize(
    mut decision: AgentDecision,
    history: &[ChatMessage],
    user_text: &str,
    uploaded_images: usize,
) -> AgentDecision {
    let valid = |idx: Option<usize>| {
        idx.filter(|&i| history.get(i).map(message_has_image).unwrap_or(false))
    };
    decision.image_reference_index = valid(decision.image_reference_index);
    decision.second_image_reference_index = valid(decision.second_image_reference_index);

    if decision.prompt.as_deref().map(str::trim).unwrap_or("").is_empty() {
        decision.prompt = Some(user_text.to_string());
    }

    let latest = latest_image_index(history);
    let has_prompt = !user_text.trim().is_empty()
        || decision.prompt.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false);

    match decision.action {
        AgentAction::Chat | AgentAction::GenerateImage => decision,
        AgentAction::EditImage | AgentAction::ChatWithImageRef => {
            if decision.image_reference_index.is_none() && uploaded_images == 0 {
                decision.image_reference_index = latest;
            }
            if decision.image_reference_index.is_none() && uploaded_images == 0 {
                // Nothing to reference anywhere.
                decision.action = if decision.action == AgentAction::EditImage && has_prompt {
                    AgentAction::GenerateImage
                } else {
                    AgentAction::Chat
                };
                decision.explanation
                    .get_or_insert_with(|| "No image in the conversation to reference".into());
            }
            decision
        }
        AgentAction::CreateWithDualImages => {
            let mut refs: Vec<usize> = decision
                .image_reference_index
                .into_iter()
                .chain(decision.second_image_reference_index)
                .collect();
            refs.dedup();

            // Fill missing references from history, newest first, skipping
            // indices already taken.
            let mut candidates: Vec<usize> = history
                .iter()
                .enumerate()
                .filter(|(i, msg)| message_has_image(msg) && !refs.contains(i))
                .map(|(i, _)| i)
                .collect();
            while refs.len() + uploaded_images < 2 {
                match candidates.pop() {
                    Some(i) => refs.push(i),
                    None => break,
                }
            }

            let available = refs.len() + uploaded_images;
            if available >= 2 {
                refs.sort_unstable();
                let mut it = refs.into_iter();
                decision.image_reference_index = it.next();
                decision.second_image_reference_index = it.next();
                decision
            } else if available == 1 {
                decision.action = AgentAction::EditImage;
                decision.image_reference_index = refs.first().copied();
                decision.second_image_reference_index = None;
                decision.explanation
                    .get_or_insert_with(|| "Only one reference image available".into());
                decision
            } else {
                decision.action = if has_prompt { AgentAction::GenerateImage } else { AgentAction::Chat };
                decision.image_reference_index = None;
                decision.second_image_reference_index = None;
                decision.explanation
                    .get_or_insert_with(|| "No reference images available".into());
                decision
            }
        }
    }
}
