use super::context::JobContext;
use super::outcome::JobStage;
use super::processing_step::{ProcessingStep, StepFlow};
use crate::error::ItemError;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, instrument};

/// A wrapper that instruments a ProcessingStep with a span, timing and outcome logging
pub struct InstrumentedStep<S> {
    inner: S,
}

impl<S> InstrumentedStep<S> {
    pub fn new(step: S) -> Self {
        Self { inner: step }
    }
}

#[async_trait]
impl<S> ProcessingStep for InstrumentedStep<S>
where
    S: ProcessingStep,
{
    #[instrument(skip(self, context), fields(step = self.inner.name(), item = %context.item.id))]
    async fn process(&self, context: &mut JobContext) -> Result<StepFlow, ItemError> {
        let start = Instant::now();
        debug!("Starting step: {}", self.inner.name());

        let result = self.inner.process(context).await;

        let duration = start.elapsed();
        context.timings.record(self.inner.stage(), duration);

        match &result {
            Ok(flow) => debug!(
                "Completed step '{}' ({:?}) in {}ms",
                self.inner.name(),
                flow,
                duration.as_millis()
            ),
            Err(e) => debug!(
                "Step '{}' failed after {}ms: {}",
                self.inner.name(),
                duration.as_millis(),
                e
            ),
        }

        result
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn stage(&self) -> JobStage {
        self.inner.stage()
    }
}

/// Extension trait to easily wrap steps with instrumentation
pub trait StepInstrumentation: Sized {
    fn instrumented(self) -> InstrumentedStep<Self>;
}

impl<S> StepInstrumentation for S
where
    S: ProcessingStep,
{
    fn instrumented(self) -> InstrumentedStep<Self> {
        InstrumentedStep::new(self)
    }
}
