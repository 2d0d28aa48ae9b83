use super::context::JobContext;
use super::outcome::{JobReport, JobStage, Outcome};
use super::processing_step::ProcessingPipeline;
use crate::common::Item;
use crate::error::ItemError;
use futures::task::{Context, Poll};
use futures::Future;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::Service;

/// Runs one item end to end on its own task.
///
/// Never fails: every error, deadline and worker panic becomes an [`Outcome::Failed`]
/// tied to the item it came from.
#[derive(Clone)]
pub struct ItemJobService {
    pipeline: Arc<ProcessingPipeline>,
    job_timeout: Option<Duration>,
}

impl ItemJobService {
    pub fn new(pipeline: Arc<ProcessingPipeline>) -> Self {
        Self {
            pipeline,
            job_timeout: None,
        }
    }

    pub fn with_job_timeout(mut self, job_timeout: Option<Duration>) -> Self {
        self.job_timeout = job_timeout;
        self
    }
}

impl Service<Item> for ItemJobService {
    type Response = JobReport;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, item: Item) -> Self::Future {
        let pipeline = self.pipeline.clone();
        let job_timeout = self.job_timeout;
        let item_id = item.id.clone();

        Box::pin(async move {
            let started = Instant::now();
            let job = tokio::spawn(async move {
                let mut context = JobContext::new(item);
                let outcome = match job_timeout {
                    Some(limit) => {
                        match tokio::time::timeout(limit, pipeline.process(&mut context)).await {
                            Ok(outcome) => outcome,
                            Err(_) => Outcome::failed(JobStage::Job, ItemError::JobTimeout(limit)),
                        }
                    }
                    None => pipeline.process(&mut context).await,
                };
                (outcome, context.timings)
            });

            let (outcome, timings) = match job.await {
                Ok(finished) => finished,
                Err(e) => (
                    Outcome::failed(JobStage::Job, ItemError::Aborted(e.to_string())),
                    Default::default(),
                ),
            };

            Ok(JobReport {
                item_id,
                outcome,
                timings,
                elapsed: started.elapsed(),
            })
        })
    }
}
