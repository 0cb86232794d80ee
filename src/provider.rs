use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, error};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Prediction failed: {0}")] Failed(String),
    #[error("Malformed output: {0}")] Malformed(String),
    #[error("Prediction still running after {0} polls")] PollLimit(u32),
}

/// API token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Trimmed token, or `None` when blank.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn expose(&self) -> &str { &self.0 }

    /// First eight characters followed by an ellipsis.
    pub fn masked(&self) -> String {
        let head: String = self.0.chars().take(8).collect();
        format!("{head}...")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, PredictionStatus::Failed | PredictionStatus::Canceled)
    }

    pub fn is_terminal(self) -> bool {
        self == PredictionStatus::Succeeded || self.is_failure()
    }
}

/// The shapes a provider's `output` field is known to take.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PredictionOutput {
    Text(String),
    List(Vec<PredictionOutput>),
    File { url: String },
    Other(Value),
}

impl PredictionOutput {
    /// Single artifact reference: a bare string, a `{url}` object, or the
    /// first element of a list of either.
    pub fn artifact_url(&self) -> Option<String> {
        match self {
            PredictionOutput::Text(s) | PredictionOutput::File { url: s } => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            PredictionOutput::List(items) => items.first().and_then(PredictionOutput::artifact_url),
            PredictionOutput::Other(_) => None,
        }
    }

    /// Text models stream tokens as a list of fragments; join them.
    pub fn joined_text(&self) -> Option<String> {
        match self {
            PredictionOutput::Text(s) => Some(s.clone()),
            PredictionOutput::List(items) => items.iter().map(PredictionOutput::joined_text).collect(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => format!("status {:?}", self.status),
            Some(other) => other.to_string(),
        }
    }
}

/// How often and how long to re-fetch a running prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self { interval, max_attempts }
    }

    pub const fn generation() -> Self {
        Self::new(Duration::from_millis(1500), Some(400))
    }

    pub const fn critique() -> Self {
        Self::new(Duration::from_millis(500), Some(240))
    }
}

/// Submit-and-poll contract shared by the image and text models.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn create_prediction(&self, credential: &Credential, model: &str, input: Value) -> Result<Prediction, ProviderError>;

    async fn get_prediction(&self, credential: &Credential, id: &str) -> Result<Prediction, ProviderError>;
}

/// Re-fetches `prediction` until it reaches a terminal status.
/// Success returns the final prediction; a reported failure is an error.
pub async fn wait_for_prediction(
    api: &dyn PredictionApi,
    credential: &Credential,
    mut prediction: Prediction,
    policy: &PollPolicy,
) -> Result<Prediction, ProviderError> {
    let mut attempts = 0u32;
    loop {
        match prediction.status {
            PredictionStatus::Succeeded => return Ok(prediction),
            s if s.is_failure() => return Err(ProviderError::Failed(prediction.error_message())),
            _ => {}
        }
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(ProviderError::PollLimit(attempts));
        }
        tokio::time::sleep(policy.interval).await;
        attempts += 1;
        prediction = api.get_prediction(credential, &prediction.id).await?;
    }
}

// Shortens long data URIs so request bodies stay readable in logs.
fn truncate_data_uris_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for val in map.values_mut() {
                truncate_data_uris_in_json(val);
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_data_uris_in_json(val);
            }
        }
        Value::String(s) if s.starts_with("data:") && s.len() > 100 => {
            *s = preview(s, 50);
        }
        _ => {}
    }
}

pub fn preview(s: &str, max: usize) -> String {
    if s.len() > max {
        let cut = (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...[{} chars total]", &s[..cut], s.len())
    } else {
        s.to_string()
    }
}

/// HTTP client for a Replicate-compatible prediction API.
pub struct ReplicateClient {
    client: Client,
    base_url: String,
}

impl ReplicateClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn read_prediction(&self, response: reqwest::Response, what: &str) -> Result<Prediction, ProviderError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Http(e.to_string()))?;
        if !status.is_success() {
            error!("❌ {} returned {}: {}", what, status, preview(&body, 500));
            return Err(ProviderError::Http(format!("status={} body={}", status, body)));
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(format!("parse error: {}: {}", e, preview(&body, 200))))
    }
}

#[async_trait]
impl PredictionApi for ReplicateClient {
    async fn create_prediction(&self, credential: &Credential, model: &str, input: Value) -> Result<Prediction, ProviderError> {
        let url = format!("{}/models/{}/predictions", self.base_url, model);
        let body = serde_json::json!({ "input": input });

        let mut logged = body.clone();
        truncate_data_uris_in_json(&mut logged);
        info!("📤 POST {} body: {}", url, logged);

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Token {}", credential.expose()))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let prediction = self.read_prediction(response, model).await?;
        info!("📥 {} accepted prediction {} ({:?})", model, prediction.id, prediction.status);
        Ok(prediction)
    }

    async fn get_prediction(&self, credential: &Credential, id: &str) -> Result<Prediction, ProviderError> {
        let url = format!("{}/predictions/{}", self.base_url, id);
        let response = self.client
            .get(&url)
            .header("Authorization", format!("Token {}", credential.expose()))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        self.read_prediction(response, "poll").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(json: &str) -> PredictionOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn artifact_url_normalizes_known_shapes() {
        assert_eq!(output(r#""https://a/x.png""#).artifact_url().as_deref(), Some("https://a/x.png"));
        assert_eq!(output(r#"{"url":"https://a/y.png"}"#).artifact_url().as_deref(), Some("https://a/y.png"));
        assert_eq!(output(r#"["https://a/1.png","https://a/2.png"]"#).artifact_url().as_deref(), Some("https://a/1.png"));
        assert_eq!(output(r#"[{"url":"https://a/z.png"}]"#).artifact_url().as_deref(), Some("https://a/z.png"));
        assert_eq!(output(r#"{"images":[]}"#).artifact_url(), None);
        assert_eq!(output("[]").artifact_url(), None);
        assert_eq!(output(r#""  ""#).artifact_url(), None);
    }

    #[test]
    fn joined_text_concatenates_fragments() {
        assert_eq!(output(r#"["{\"rat", "ing\": 9}"]"#).joined_text().as_deref(), Some(r#"{"rating": 9}"#));
        assert_eq!(output("42").joined_text(), None);
    }

    #[test]
    fn unknown_statuses_are_not_terminal() {
        let p: Prediction = serde_json::from_str(r#"{"id":"p1","status":"queued"}"#).unwrap();
        assert_eq!(p.status, PredictionStatus::Unknown);
        assert!(!p.status.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
    }

    #[test]
    fn credential_is_redacted() {
        let c = Credential::new("  r8_abcdefghijklmnop ").unwrap();
        assert_eq!(c.expose(), "r8_abcdefghijklmnop");
        assert_eq!(format!("{:?}", c), r#"Credential("r8_abcde...")"#);
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn data_uris_are_truncated_for_logging() {
        let long = format!("data:image/jpeg;base64,{}", "A".repeat(500));
        let mut v = serde_json::json!({"input": {"image_input": [long], "prompt": "rose"}});
        truncate_data_uris_in_json(&mut v);
        let shown = v["input"]["image_input"][0].as_str().unwrap();
        assert!(shown.ends_with("[523 chars total]"));
        assert_eq!(v["input"]["prompt"], "rose");
    }
}
