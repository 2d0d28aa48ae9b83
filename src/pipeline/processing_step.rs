use super::context::JobContext;
use super::outcome::{JobStage, Outcome};
use crate::common::DescriptionRecord;
use crate::error::ItemError;
use async_trait::async_trait;

/// Whether the job should keep going after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    /// Upstream took the media down; stop without counting a failure
    Removed,
}

/// Chain of Responsibility pattern for the per-item job
#[async_trait]
pub trait ProcessingStep: Send + Sync {
    async fn process(&self, context: &mut JobContext) -> Result<StepFlow, ItemError>;
    fn name(&self) -> &'static str;
    fn stage(&self) -> JobStage;
}

/// A pipeline that runs one item through a chain of steps.
/// Steps run strictly in order and the first error ends the job.
#[derive(Default)]
pub struct ProcessingPipeline {
    steps: Vec<Box<dyn ProcessingStep>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: Box<dyn ProcessingStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub async fn process(&self, context: &mut JobContext) -> Outcome {
        for step in &self.steps {
            tracing::debug!("Processing step: {}", step.name());
            match step.process(context).await {
                Ok(StepFlow::Continue) => {}
                Ok(StepFlow::Removed) => return Outcome::Removed,
                Err(error) => return Outcome::failed(step.stage(), error),
            }
        }

        match context.description.take() {
            Some(description) => {
                Outcome::Success(Box::new(DescriptionRecord::new(&context.item, description)))
            }
            None => Outcome::failed(
                JobStage::Job,
                ItemError::Aborted("pipeline finished without a description".to_string()),
            ),
        }
    }
}
