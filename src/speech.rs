use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
pub trait Speech: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// Coqui-style HTTP TTS output.
pub struct CoquiSpeech {
    client: reqwest::Client,
    base_url: String,
    speaker_id: String,
    language_id: String,
}

impl CoquiSpeech {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        speaker_id: impl Into<String>,
        language_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            speaker_id: speaker_id.into(),
            language_id: language_id.into(),
        }
    }
}

#[async_trait]
impl Speech for CoquiSpeech {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/api/tts?text={}&speaker_id={}&style_wav=&language_id={}",
            self.base_url,
            urlencoding::encode(text),
            self.speaker_id,
            self.language_id
        );
        self.client.get(&url).send().await?.error_for_status()?;
        debug!(%text, "spoke");
        Ok(())
    }
}

/// Speak without blocking the caller.
///
/// The spawned task is intentionally never awaited; its only effect on
/// failure is a log entry, so a down TTS server can't stall transcript
/// handling.
pub fn speak_detached(speech: &Arc<dyn Speech>, text: impl Into<String>) {
    let speech = speech.clone();
    let text = text.into();
    tokio::spawn(async move {
        if let Err(e) = speech.speak(&text).await {
            warn!(error = %e, %text, "speech output failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    #[tokio::test]
    async fn encodes_text_into_tts_query() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/tts")
                .query_param("text", "This is Mark.")
                .query_param("speaker_id", "p330");
            then.status(200).body(b"RIFF");
        });
        let speech = CoquiSpeech::new(reqwest::Client::new(), server.base_url(), "p330", "");
        speech.speak("This is Mark.").await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn detached_speak_survives_failures() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/tts");
            then.status(500);
        });
        let speech: Arc<dyn Speech> =
            Arc::new(CoquiSpeech::new(reqwest::Client::new(), server.base_url(), "p330", ""));
        speak_detached(&speech, "hello");
        // Nothing to assert beyond "does not panic or block".
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
