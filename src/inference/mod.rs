pub mod client;
pub mod gemini;
pub mod prompt;

pub use client::{parse_description, strip_code_fence, DescriptionClient};
pub use gemini::GeminiModel;
pub use prompt::DESCRIPTION_PROMPT;

use crate::common::FrameSet;
use crate::error::InferenceError;
use async_trait::async_trait;

/// A service that answers an instruction plus ordered images with free text
#[async_trait]
pub trait MultimodalModel: Send + Sync {
    async fn generate(&self, instruction: &str, frames: &FrameSet) -> Result<String, InferenceError>;
    fn name(&self) -> &str;
}
