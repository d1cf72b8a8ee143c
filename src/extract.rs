use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Structured summary of an introduction conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl PersonDetails {
    /// Join workplace, context and details into the stored context string.
    /// Parts are trimmed, empty ones omitted.
    pub fn synthesized_context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(w) = trimmed(&self.workplace) {
            parts.push(format!("Workplace: {w}"));
        }
        if let Some(c) = trimmed(&self.context) {
            parts.push(format!("Context: {c}"));
        }
        if let Some(d) = trimmed(&self.details) {
            parts.push(format!("Details: {d}"));
        }
        parts.join(" | ")
    }
}

fn trimmed(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, conversation: &str) -> anyhow::Result<PersonDetails>;
}

const SYSTEM_PROMPT: &str = "You extract facts about a person from a short conversation. \
Reply with a single JSON object with the keys name, workplace, context and details. \
Use null for anything the conversation does not say. Reply with the JSON object only.";

/// [`Extractor`] backed by an Ollama chat model.
pub struct OllamaExtractor {
    ollama: Ollama,
    model: String,
}

impl OllamaExtractor {
    pub fn new(ollama: Ollama, model: impl Into<String>) -> Self {
        Self {
            ollama,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Extractor for OllamaExtractor {
    async fn extract(&self, conversation: &str) -> anyhow::Result<PersonDetails> {
        let req = ChatMessageRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::new(MessageRole::System, SYSTEM_PROMPT.into()),
                ChatMessage::new(MessageRole::User, conversation.to_string()),
            ],
        );
        let mut stream = self.ollama.send_chat_messages_stream(req).await?;
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(resp) => out.push_str(&resp.message.content),
                Err(_) => break,
            }
        }
        debug!(response = %out, "extraction response");
        Ok(parse_details(&out))
    }
}

/// Parse the model's reply, degrading to empty fields on anything
/// malformed rather than failing the collection exit.
fn parse_details(raw: &str) -> PersonDetails {
    let cleaned = strip_fences(raw);
    match serde_json::from_str::<PersonDetails>(cleaned) {
        Ok(details) => normalize(details),
        Err(e) => {
            warn!(error = %e, "unparseable extraction reply");
            PersonDetails::default()
        }
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn normalize(mut details: PersonDetails) -> PersonDetails {
    for field in [
        &mut details.name,
        &mut details.workplace,
        &mut details.context,
        &mut details.details,
    ] {
        if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
            *field = None;
        }
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = r#"{"name":"Mark","workplace":"Acme","context":null,"details":null}"#;
        let fenced = format!("```json\n{plain}\n```");
        let expected = PersonDetails {
            name: Some("Mark".into()),
            workplace: Some("Acme".into()),
            ..Default::default()
        };
        assert_eq!(parse_details(plain), expected);
        assert_eq!(parse_details(&fenced), expected);
    }

    #[test]
    fn malformed_reply_degrades_to_empty_fields() {
        assert_eq!(parse_details("I couldn't find anything."), PersonDetails::default());
        assert_eq!(parse_details(""), PersonDetails::default());
        assert_eq!(parse_details("[1, 2, 3]"), PersonDetails::default());
    }

    #[test]
    fn blank_strings_normalize_to_none() {
        let details = parse_details(r#"{"name":"  ","workplace":"Acme"}"#);
        assert_eq!(details.name, None);
        assert_eq!(details.workplace, Some("Acme".into()));
    }

    #[test]
    fn context_synthesis_omits_empty_parts() {
        let details = PersonDetails {
            name: Some("Mark".into()),
            workplace: Some(" Acme ".into()),
            context: None,
            details: Some("likes rust".into()),
        };
        assert_eq!(
            details.synthesized_context(),
            "Workplace: Acme | Details: likes rust"
        );
        assert_eq!(PersonDetails::default().synthesized_context(), "");
    }
}
