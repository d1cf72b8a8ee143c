use async_trait::async_trait;
use tracing::debug;

/// Coarse capture fidelity hint. Speculative captures use the cheaper
/// settings so a wrong guess costs less on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoQuality {
    Low,
    Medium,
    High,
}

impl PhotoQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A captured frame, JPEG bytes plus a label for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub label: String,
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture(&self, quality: PhotoQuality) -> anyhow::Result<Photo>;
}

/// Camera exposed over HTTP by the wearable bridge.
pub struct HttpCamera {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCamera {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Camera for HttpCamera {
    async fn capture(&self, quality: PhotoQuality) -> anyhow::Result<Photo> {
        let url = format!("{}/capture?quality={}", self.base_url, quality.as_str());
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?.to_vec();
        debug!(quality = quality.as_str(), len = bytes.len(), "captured photo");
        Ok(Photo {
            bytes,
            label: format!("capture-{}", quality.as_str()),
        })
    }
}
