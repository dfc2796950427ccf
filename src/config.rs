use serde::{Deserialize, Serialize};

/// Configuration for the external chat and image endpoints plus the image
/// sanitization limits. Values come from the environment; individual keys can
/// be overridden through the settings table (see commands::settings_commands).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub chat_base_url: String,
    pub image_base_url: String,
    pub chat_model: String,
    pub classifier_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub image_size: String,
    pub image_quality: String,
    /// Longest allowed edge for any image sent upstream, in pixels.
    pub max_image_dim: u32,
    /// Payload ceiling for encoded image uploads, in bytes.
    pub max_payload_bytes: usize,
    /// Allowed width/height ratio band for edit inputs.
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            api_key: None,
            chat_base_url: "https://api.openai.com/v1".into(),
            image_base_url: "https://api.openai.com/v1".into(),
            chat_model: "gpt-4o".into(),
            classifier_model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 1024,
            image_size: "1024x1024".into(),
            image_quality: "medium".into(),
            max_image_dim: 1024,
            max_payload_bytes: 9 * 1024 * 1024,
            min_aspect: 0.4,
            max_aspect: 2.5,
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        let mut config = AiConfig::default();
        config.api_key = std::env::var("GARDENHUB_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        if let Ok(url) = std::env::var("GARDENHUB_CHAT_BASE_URL") {
            config.chat_base_url = url;
        }
        if let Ok(url) = std::env::var("GARDENHUB_IMAGE_BASE_URL") {
            config.image_base_url = url;
        }
        if let Ok(model) = std::env::var("GARDENHUB_CHAT_MODEL") {
            config.chat_model = model;
        }
        config
    }

    /// Apply a settings-table override. Unknown keys and unparsable values
    /// are ignored so a stray row cannot break startup.
    pub fn apply_override(&mut self, key: &str, value: &str) {
        match key {
            "ai.chat_model" => self.chat_model = value.to_string(),
            "ai.classifier_model" => self.classifier_model = value.to_string(),
            "ai.image_size" => self.image_size = value.to_string(),
            "ai.image_quality" => self.image_quality = value.to_string(),
            "ai.temperature" => {
                if let Ok(v) = value.parse() {
                    self.temperature = v;
                }
            }
            "ai.max_tokens" => {
                if let Ok(v) = value.parse() {
                    self.max_tokens = v;
                }
            }
            "ai.max_image_dim" => {
                if let Ok(v) = value.parse() {
                    self.max_image_dim = v;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_known_keys_only() {
        let mut config = AiConfig::default();
        config.apply_override("ai.chat_model", "gpt-5");
        config.apply_override("ai.temperature", "0.2");
        config.apply_override("ai.temperature", "not-a-number");
        config.apply_override("unrelated", "x");
        assert_eq!(config.chat_model, "gpt-5");
        assert_eq!(config.temperature, 0.2);
    }
}
