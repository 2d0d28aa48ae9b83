use super::MultimodalModel;
use crate::common::FrameSet;
use crate::config::Configuration;
use crate::error::InferenceError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Instruction first, then every frame in order, all in one user turn
fn build_request<'a>(instruction: &'a str, frames: &'a FrameSet) -> GenerateRequest<'a> {
    let parts = std::iter::once(Part::Text { text: instruction })
        .chain(frames.iter().map(|frame| Part::InlineData {
            inline_data: InlineData {
                mime_type: frame.mime_type(),
                data: STANDARD.encode(frame.data()),
            },
        }))
        .collect();
    GenerateRequest {
        contents: vec![Content { parts }],
    }
}

fn response_text(response: GenerateResponse) -> Result<String, InferenceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

/// Gemini `generateContent` over REST
#[derive(Debug, Clone)]
pub struct GeminiModel {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_configuration(
        configuration: &Configuration,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self::new(
            http_client,
            configuration.api_base_url.clone(),
            configuration.model.clone(),
            api_key,
        ))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl MultimodalModel for GeminiModel {
    async fn generate(&self, instruction: &str, frames: &FrameSet) -> Result<String, InferenceError> {
        let body = serde_json::to_vec(&build_request(instruction, frames))?;

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let response_text_body = response.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: response_text_body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text_body)?;
        response_text(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
