//! REST client for the Gemini `generativelanguage` API.
//!
//! Documents are sent inline (base64) alongside the instruction text, so
//! no separate upload or cleanup round-trip is needed.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use slides_core::upload::UploadedFile;

use crate::error::GenerateError;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One model call: the documents followed by the instruction.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub files: &'a [UploadedFile],
    pub prompt: &'a str,
}

/// Language-model seam: size the request, then generate markup text.
#[async_trait]
pub trait MarkupModel: Send + Sync + 'static {
    async fn count_tokens(&self, request: ModelRequest<'_>) -> Result<u64, GenerateError>;

    async fn generate(&self, request: ModelRequest<'_>) -> Result<String, GenerateError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    InlineData(InlineBlob<'a>),
    Text(&'a str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineBlob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn contents(request: ModelRequest<'_>) -> [Content<'_>; 1] {
    let mut parts: Vec<Part<'_>> = request
        .files
        .iter()
        .map(|f| {
            Part::InlineData(InlineBlob {
                mime_type: &f.content_type,
                data: base64::engine::general_purpose::STANDARD.encode(&f.data),
            })
        })
        .collect();
    parts.push(Part::Text(request.prompt));
    [Content {
        role: "user",
        parts,
    }]
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one Gemini model.
pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Every call made through the client is abandoned after
    /// `request_timeout`.
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        max_output_tokens: u32,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            max_output_tokens,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{method}",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &GenerateBody<'_>,
    ) -> Result<T, GenerateError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, method, "Gemini API error");
            return Err(GenerateError::Upstream(format!(
                "model API error ({})",
                status.as_u16()
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarkupModel for GeminiClient {
    async fn count_tokens(&self, request: ModelRequest<'_>) -> Result<u64, GenerateError> {
        let body = GenerateBody {
            contents: contents(request),
            generation_config: None,
        };
        let counted: CountTokensResponse = self.post("countTokens", &body).await?;
        Ok(counted.total_tokens)
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<String, GenerateError> {
        let body = GenerateBody {
            contents: contents(request),
            generation_config: Some(GenerationConfig {
                max_output_tokens: self.max_output_tokens,
            }),
        };
        let response: GenerateResponse = self.post("generateContent", &body).await?;
        response
            .first_text()
            .ok_or_else(|| GenerateError::Upstream("model returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn request_body_inlines_files_before_prompt() {
        let files = [file("a.md", "text/plain", b"hi")];
        let body = GenerateBody {
            contents: contents(ModelRequest {
                files: &files,
                prompt: "make slides",
            }),
            generation_config: Some(GenerationConfig {
                max_output_tokens: 4096,
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "text/plain");
        assert_eq!(parts[0]["inlineData"]["data"], "aGk=");
        assert_eq!(parts[1]["text"], "make slides");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn count_body_has_no_generation_config() {
        let body = GenerateBody {
            contents: contents(ModelRequest {
                files: &[],
                prompt: "p",
            }),
            generation_config: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn parses_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"```md\n# A\n```"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("```md\n# A\n```"));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(parsed.first_text().is_none());
        let blocked: GenerateResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(blocked.first_text().is_none());
    }

    #[test]
    fn parses_token_count() {
        let parsed: CountTokensResponse = serde_json::from_str(r#"{"totalTokens":1234}"#).unwrap();
        assert_eq!(parsed.total_tokens, 1234);
    }

    #[test]
    fn endpoint_joins_model_and_method() {
        let client = GeminiClient::new(
            "https://example.test/v1beta/".into(),
            "k".into(),
            DEFAULT_MODEL.into(),
            4096,
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(
            client.endpoint("countTokens"),
            "https://example.test/v1beta/models/gemini-1.5-flash:countTokens"
        );
    }
}
