use super::context::JobContext;
use super::outcome::JobStage;
use super::processing_step::{ProcessingStep, StepFlow};
use crate::error::ItemError;
use crate::inference::DescriptionClient;
use crate::locator::{Located, MediaLocator};
use crate::sampler::{SamplerTable, SamplingSettings};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Resolves the item's source reference to readable media
pub struct LocateStep {
    locator: Arc<dyn MediaLocator>,
}

impl LocateStep {
    pub fn new(locator: Arc<dyn MediaLocator>) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl ProcessingStep for LocateStep {
    async fn process(&self, context: &mut JobContext) -> Result<StepFlow, ItemError> {
        match self.locator.locate(&context.item).await? {
            Located::Media(media) => {
                context.media = Some(media);
                Ok(StepFlow::Continue)
            }
            Located::Removed { landing } => {
                info!("Item {} was removed upstream", context.item.id);
                context.removed_landing = Some(landing);
                Ok(StepFlow::Removed)
            }
        }
    }

    fn name(&self) -> &'static str {
        "locate"
    }

    fn stage(&self) -> JobStage {
        JobStage::Locate
    }
}

/// Picks the sampler registered for the item's format and samples the located media
pub struct SampleStep {
    samplers: SamplerTable,
    settings: SamplingSettings,
}

impl SampleStep {
    pub fn new(samplers: SamplerTable, settings: SamplingSettings) -> Self {
        Self { samplers, settings }
    }
}

#[async_trait]
impl ProcessingStep for SampleStep {
    async fn process(&self, context: &mut JobContext) -> Result<StepFlow, ItemError> {
        let media = context
            .media
            .take()
            .ok_or_else(|| ItemError::FrameExtraction("no media was located".to_string()))?;
        let format = context.item.format;
        let sampler = self.samplers.get(format).ok_or_else(|| {
            ItemError::FrameExtraction(format!("no sampler registered for {}", format.as_str()))
        })?;

        let frames = sampler.sample(&media, self.settings).await?;
        if frames.is_empty() {
            return Err(ItemError::FrameExtraction(format!(
                "{} produced no frames from {}",
                sampler.name(),
                media.describe()
            )));
        }

        context.frames = Some(frames);
        Ok(StepFlow::Continue)
    }

    fn name(&self) -> &'static str {
        "sample"
    }

    fn stage(&self) -> JobStage {
        JobStage::Sample
    }
}

/// Asks the model for a structured description of the sampled frames
pub struct DescribeStep {
    client: DescriptionClient,
}

impl DescribeStep {
    pub fn new(client: DescriptionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProcessingStep for DescribeStep {
    async fn process(&self, context: &mut JobContext) -> Result<StepFlow, ItemError> {
        let frames = context
            .frames
            .take()
            .ok_or_else(|| ItemError::FrameExtraction("no frames were sampled".to_string()))?;
        context.description = Some(self.client.describe(&frames).await?);
        Ok(StepFlow::Continue)
    }

    fn name(&self) -> &'static str {
        "describe"
    }

    fn stage(&self) -> JobStage {
        JobStage::Describe
    }
}
