use super::{MultimodalModel, DESCRIPTION_PROMPT};
use crate::common::{Description, FrameSet};
use crate::config::Configuration;
use crate::error::ItemError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

const RAW_SNIPPET_CHARS: usize = 300;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Drop one leading fence line (```` ``` ```` or ```` ```json ````) and one trailing fence line
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }

    let body = match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => return "",
    };
    let body = body.trim_end();
    match body.rfind('\n') {
        Some(newline) if body[newline + 1..].trim_start().starts_with("```") => &body[..newline],
        None if body.trim_start().starts_with("```") => "",
        _ => body,
    }
}

pub fn parse_description(text: &str) -> Result<Description, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

fn snippet(text: &str) -> String {
    text.chars().take(RAW_SNIPPET_CHARS).collect()
}

/// Turns a frame set into a validated description, re-asking the model when its answer
/// does not parse
#[derive(Clone)]
pub struct DescriptionClient {
    model: Arc<dyn MultimodalModel>,
    instruction: String,
    parse_retries: u32,
    retry_backoff: Duration,
}

impl DescriptionClient {
    pub fn new(model: Arc<dyn MultimodalModel>) -> Self {
        Self {
            model,
            instruction: DESCRIPTION_PROMPT.to_string(),
            parse_retries: 1,
            retry_backoff: Duration::ZERO,
        }
    }

    pub fn from_configuration(model: Arc<dyn MultimodalModel>, configuration: &Configuration) -> Self {
        Self::new(model)
            .with_parse_retries(configuration.parse_retries)
            .with_retry_backoff(configuration.retry_backoff())
    }

    pub fn with_parse_retries(mut self, parse_retries: u32) -> Self {
        self.parse_retries = parse_retries;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        if self.retry_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    pub async fn describe(&self, frames: &FrameSet) -> Result<Description, ItemError> {
        let attempts = self.parse_retries.saturating_add(1);
        let mut last_reason = String::new();
        let mut last_text = String::new();

        for attempt in 1..=attempts {
            // Transport and service errors are not retried
            let text = self.model.generate(&self.instruction, frames).await?;

            match parse_description(&text) {
                Ok(description) => return Ok(description),
                Err(e) if attempt < attempts => {
                    warn!("JSON parse error (retrying, attempt {}/{}): {}", attempt, attempts, e);
                    let delay = self.backoff_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    last_reason = e.to_string();
                    last_text = text;
                }
                Err(e) => {
                    error!("JSON parse error (giving up after {} attempts): {}", attempts, e);
                    error!("Raw response: {}", snippet(&text));
                    last_reason = e.to_string();
                    last_text = text;
                }
            }
        }

        Err(ItemError::ResponseParse {
            attempts,
            reason: last_reason,
            snippet: snippet(&last_text),
        })
    }
}
