use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::Photo;

/// A stored person as the backend reports it. Read-only on this side;
/// the agent only issues requests that make the backend create, update
/// or delete records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub conversation_context: Option<String>,
    #[serde(default)]
    pub first_met_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub times_met: i64,
}

/// Outcome of a recognition request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recognition {
    pub recognized: bool,
    #[serde(default)]
    pub person: Option<PersonRecord>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn create(
        &self,
        photo: &Photo,
        user_id: &str,
        name: Option<&str>,
        context: &str,
    ) -> anyhow::Result<()>;

    /// Case-insensitive partial match on the backend side.
    async fn search(&self, name: &str, user_id: &str) -> anyhow::Result<Option<PersonRecord>>;

    /// Returns false when nobody by that name exists for the user.
    async fn delete(&self, name: &str, user_id: &str) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, photo: &Photo, user_id: &str) -> anyhow::Result<Recognition>;
}

/// HTTP client for the Visage backend.
pub struct VisageBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl VisageBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }
}

async fn fail_with_body(what: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::anyhow!("{what} failed: {status}: {body}")
}

#[async_trait]
impl PersonStore for VisageBackend {
    async fn create(
        &self,
        photo: &Photo,
        user_id: &str,
        name: Option<&str>,
        context: &str,
    ) -> anyhow::Result<()> {
        let form = [
            ("image_data", BASE64.encode(&photo.bytes)),
            ("name", name.unwrap_or_default().to_string()),
            ("conversation_context", context.to_string()),
            ("user_id", user_id.to_string()),
        ];
        let resp = self
            .client
            .post(self.api("/workflow1/first-meeting"))
            .bearer_auth(&self.auth_token)
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(fail_with_body("create", resp).await);
        }
        debug!(name = name.unwrap_or("<unnamed>"), "person saved");
        Ok(())
    }

    async fn search(&self, name: &str, user_id: &str) -> anyhow::Result<Option<PersonRecord>> {
        let resp = self
            .client
            .get(self.api("/people/search"))
            .bearer_auth(&self.auth_token)
            .query(&[("name", name), ("user_id", user_id)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(fail_with_body("search", resp).await);
        }
        Ok(Some(resp.json::<PersonRecord>().await?))
    }

    async fn delete(&self, name: &str, user_id: &str) -> anyhow::Result<bool> {
        let resp = self
            .client
            .delete(self.api(&format!("/people/{}", urlencoding::encode(name))))
            .bearer_auth(&self.auth_token)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(fail_with_body("delete", resp).await);
        }
        debug!(%name, "person deleted");
        Ok(true)
    }
}

#[async_trait]
impl Recognizer for VisageBackend {
    async fn recognize(&self, photo: &Photo, user_id: &str) -> anyhow::Result<Recognition> {
        let form = [
            ("image_data", BASE64.encode(&photo.bytes)),
            ("user_id", user_id.to_string()),
        ];
        let resp = self
            .client
            .post(self.api("/workflow2/recognize"))
            .bearer_auth(&self.auth_token)
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(fail_with_body("recognize", resp).await);
        }
        Ok(resp.json::<Recognition>().await?)
    }
}
