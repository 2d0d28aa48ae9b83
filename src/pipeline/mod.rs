pub mod context;
pub mod instrumented_step;
pub mod outcome;
pub mod processing_step;
pub mod service;
pub mod steps;

pub use context::{JobContext, StageTimings};
pub use instrumented_step::{InstrumentedStep, StepInstrumentation};
pub use outcome::{JobReport, JobStage, Outcome};
pub use processing_step::{ProcessingPipeline, ProcessingStep, StepFlow};
pub use service::ItemJobService;
pub use steps::{DescribeStep, LocateStep, SampleStep};

use crate::inference::DescriptionClient;
use crate::locator::MediaLocator;
use crate::sampler::{SamplerTable, SamplingSettings};
use std::sync::Arc;

/// locate → sample → describe, each step instrumented
pub fn describe_pipeline(
    locator: Arc<dyn MediaLocator>,
    samplers: SamplerTable,
    settings: SamplingSettings,
    client: DescriptionClient,
) -> ProcessingPipeline {
    ProcessingPipeline::new()
        .add_step(Box::new(LocateStep::new(locator).instrumented()))
        .add_step(Box::new(SampleStep::new(samplers, settings).instrumented()))
        .add_step(Box::new(DescribeStep::new(client).instrumented()))
}
