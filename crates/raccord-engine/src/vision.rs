use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::images::NormalizedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_validation_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.5-flash",
        }
    }

    pub fn default_decision_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Gemini => "gemini-3-pro-preview",
        }
    }

    fn default_api_base(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

/// API access for the external vision model. Absent credentials make every
/// model-backed check fail open.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub provider: Provider,
    pub api_key: String,
    pub api_base: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Credentials {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            api_key: api_key.into(),
            api_base: None,
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: api_key.into(),
            api_base: None,
        }
    }

    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// OpenAI keys win over Gemini keys when both are configured.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let openai_key = first_non_empty(&lookup, &["OPENAI_API_KEY", "OPENAI_API_KEY_BACKUP"]);
        if let Some(api_key) = openai_key {
            return Some(Self {
                provider: Provider::OpenAi,
                api_key,
                api_base: first_non_empty(&lookup, &["OPENAI_API_BASE", "OPENAI_BASE_URL"]),
            });
        }
        let api_key = first_non_empty(&lookup, &["GEMINI_API_KEY", "GOOGLE_API_KEY"])?;
        Some(Self {
            provider: Provider::Gemini,
            api_key,
            api_base: first_non_empty(&lookup, &["GEMINI_API_BASE"]),
        })
    }

    pub fn api_base(&self) -> String {
        let raw = self
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(self.provider.default_api_base());
        let mut base = raw.trim_end_matches('/').to_string();
        if self.provider == Provider::OpenAi {
            if let Ok(parsed) = reqwest::Url::parse(&base) {
                if parsed.path().trim().is_empty() || parsed.path() == "/" {
                    base = format!("{base}/v1");
                }
            }
        }
        base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    Image(NormalizedImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub parts: Vec<RequestPart>,
    pub max_output_tokens: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionReply {
    pub text: String,
    pub model: String,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

/// One blocking round trip to a vision-capable model.
pub trait VisionClient: Send + Sync {
    fn complete(&self, credentials: &Credentials, request: &VisionRequest) -> Result<VisionReply>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpVisionClient {
    http: HttpClient,
}

impl HttpVisionClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn complete_openai(
        &self,
        credentials: &Credentials,
        request: &VisionRequest,
    ) -> Result<VisionReply> {
        let endpoint = format!("{}/responses", credentials.api_base());
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&credentials.api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(request.timeout)
            .json(&openai_payload(request))
            .send()
            .with_context(|| format!("OpenAI request failed ({endpoint})"))?;
        let parsed = read_json_reply("OpenAI", response)?;
        let text = extract_openai_output_text(&parsed);
        if text.is_empty() {
            bail!("OpenAI returned no output text");
        }
        Ok(VisionReply {
            text,
            model: request.model.clone(),
            input_tokens: read_usage(&parsed, &["usage", "input_tokens"]),
            output_tokens: read_usage(&parsed, &["usage", "output_tokens"]),
        })
    }

    fn complete_gemini(
        &self,
        credentials: &Credentials,
        request: &VisionRequest,
    ) -> Result<VisionReply> {
        let endpoint = gemini_endpoint(&credentials.api_base(), &request.model);
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", credentials.api_key.as_str())
            .timeout(request.timeout)
            .json(&gemini_payload(request))
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let parsed = read_json_reply("Gemini", response)?;
        let text = extract_gemini_output_text(&parsed);
        if text.is_empty() {
            bail!("Gemini returned no output text");
        }
        Ok(VisionReply {
            text,
            model: request.model.clone(),
            input_tokens: read_usage(&parsed, &["usageMetadata", "promptTokenCount"]),
            output_tokens: read_usage(&parsed, &["usageMetadata", "candidatesTokenCount"]),
        })
    }
}

impl VisionClient for HttpVisionClient {
    fn complete(&self, credentials: &Credentials, request: &VisionRequest) -> Result<VisionReply> {
        match credentials.provider {
            Provider::OpenAi => self.complete_openai(credentials, request),
            Provider::Gemini => self.complete_gemini(credentials, request),
        }
    }
}

fn first_non_empty(lookup: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(*key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Model override, then the first non-empty env key, then the default.
pub fn resolve_model(override_model: Option<&str>, env_keys: &[&str], default: &str) -> String {
    override_model
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| first_non_empty(&|key: &str| env::var(key).ok(), env_keys))
        .unwrap_or_else(|| default.to_string())
}

fn openai_payload(request: &VisionRequest) -> Value {
    let content: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => json!({
                "type": "input_text",
                "text": text,
            }),
            RequestPart::Image(image) => json!({
                "type": "input_image",
                "image_url": image.data_url(),
            }),
        })
        .collect();
    json!({
        "model": request.model,
        "input": [{
            "role": "user",
            "content": content,
        }],
        "max_output_tokens": request.max_output_tokens,
    })
}

fn gemini_endpoint(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn gemini_payload(request: &VisionRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime,
                    "data": image.base64(),
                }
            }),
        })
        .collect();
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "maxOutputTokens": request.max_output_tokens,
            "responseMimeType": "application/json",
        },
    })
}

fn read_json_reply(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{provider} reply unreadable"))?;
    if !status.is_success() {
        bail!(
            "{provider} rejected the request (HTTP {}): {}",
            status.as_u16(),
            clip_chars(body.trim(), 512)
        );
    }
    serde_json::from_str(&body).with_context(|| format!("{provider} reply is not JSON"))
}

fn extract_openai_output_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }
    }

    let mut parts: Vec<String> = Vec::new();
    let rows = response
        .get("output")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for row in rows {
        let content = row
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for chunk in content {
            let kind = chunk.get("type").and_then(Value::as_str).unwrap_or_default();
            if !matches!(kind, "output_text" | "text") {
                continue;
            }
            if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    parts.push(text.trim().to_string());
                }
            }
        }
    }
    parts.join("\n").trim().to_string()
}

fn extract_gemini_output_text(response: &Value) -> String {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

fn read_usage(payload: &Value, path: &[&str]) -> Option<i64> {
    let mut cursor = payload;
    for key in path {
        cursor = cursor.get(*key)?;
    }
    cursor.as_i64().filter(|value| *value >= 0)
}

/// One-line `outer: inner` rendering of an error chain for event payloads.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let rendered = format!("{err:#}");
    let line = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
    clip_chars(&line, max_chars)
}

fn clip_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &value[..cut]),
        None => value.to_string(),
    }
}
