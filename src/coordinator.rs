use crate::{
    catalog::Catalog,
    common::Item,
    config::Configuration,
    error::{AppError, ItemError},
    output::{OutputSink, SkipSet},
    pipeline::{ItemJobService, JobReport, JobStage, Outcome, ProcessingPipeline},
    progress::{tally, LogProgress, ProgressReporter, RunCounters, RunSummary, StageTotals},
};
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tower::{ServiceBuilder, ServiceExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Mutable run state; only the aggregation section touches it
struct RunState {
    counters: RunCounters,
    stages: StageTotals,
    reporter: ProgressReporter,
}

/// Drives a bounded pool of item jobs over one catalog and folds their results into
/// the output sink, the counters and the catalog's `described` flags.
pub struct WorkCoordinator {
    configuration: Configuration,
    pipeline: Arc<ProcessingPipeline>,
    limit: Option<usize>,
    force: bool,
    cancel_token: CancellationToken,
}

impl WorkCoordinator {
    pub fn builder(configuration: Configuration) -> CoordinatorBuilder {
        CoordinatorBuilder::new(configuration)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Pending items minus the skip-set (and duplicates), capped at the limit.
    /// Returns the queue and how many pending items were left out before the cap.
    fn schedule(&self, pending: Vec<Item>, skip: &SkipSet) -> (Vec<Item>, usize) {
        let before = pending.len();
        let mut seen = HashSet::new();
        let mut queue: Vec<Item> = pending
            .into_iter()
            .filter(|item| !skip.contains(&item.id) && seen.insert(item.id.clone()))
            .collect();
        let skipped = before - queue.len();

        if let Some(limit) = self.limit {
            queue.truncate(limit);
        }
        (queue, skipped)
    }

    pub async fn run<W>(
        &self,
        catalog: &mut dyn Catalog,
        skip: &SkipSet,
        sink: &mut OutputSink<W>,
    ) -> RunSummary
    where
        W: AsyncWrite + Unpin + Send,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", catalog = %catalog.name(), run_id = %run_id);
        self.drive(run_id, catalog, skip, sink).instrument(span).await
    }

    async fn drive<W>(
        &self,
        run_id: Uuid,
        catalog: &mut dyn Catalog,
        skip: &SkipSet,
        sink: &mut OutputSink<W>,
    ) -> RunSummary
    where
        W: AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let pending = catalog.pending_items(self.force);
        let total = pending.len();
        let (queue, skipped) = self.schedule(pending, skip);
        let scheduled = queue.len();

        if skipped > 0 {
            info!("{} items already described", skipped);
        }
        info!(
            "{} items to describe with {} workers",
            scheduled, self.configuration.workers
        );

        let mut state = RunState {
            counters: RunCounters::default(),
            stages: StageTotals::default(),
            reporter: ProgressReporter::new(self.configuration.progress_interval, scheduled)
                .add_observer(Box::new(LogProgress)),
        };

        if scheduled > 0 {
            let service = ServiceBuilder::new()
                .concurrency_limit(self.configuration.workers)
                .service(
                    ItemJobService::new(self.pipeline.clone())
                        .with_job_timeout(self.configuration.job_timeout()),
                );

            // Stop admitting on shutdown; jobs already admitted still drain
            let requests =
                stream::iter(queue).take_until(self.cancel_token.clone().cancelled_owned());
            let reports = service.call_all(requests).unordered();
            tokio::pin!(reports);

            while let Some(report) = reports.next().await {
                match report {
                    Ok(report) => Self::aggregate(report, catalog, sink, &mut state).await,
                    Err(e) => {
                        error!("Job service failed: {}", e);
                        break;
                    }
                }
            }
        }

        let interrupted = state.counters.completed() < scheduled;
        if interrupted {
            warn!(
                "Stopped early: {} of {} scheduled items completed",
                state.counters.completed(),
                scheduled
            );
        }

        RunSummary {
            run_id,
            catalog: catalog.name().to_string(),
            total,
            skipped,
            scheduled,
            counters: state.counters,
            stages: state.stages,
            elapsed: started.elapsed(),
            interrupted,
        }
    }

    /// The aggregation section: entered once per completed job, in completion order.
    /// A success is written and flushed before it is counted.
    async fn aggregate<W>(
        report: JobReport,
        catalog: &mut dyn Catalog,
        sink: &mut OutputSink<W>,
        state: &mut RunState,
    ) where
        W: AsyncWrite + Unpin + Send,
    {
        let JobReport {
            item_id,
            outcome,
            timings,
            elapsed,
        } = report;

        let outcome = match outcome {
            Outcome::Success(record) => match sink.append(&record).await {
                Ok(()) => {
                    catalog.mark_described(&item_id);
                    Outcome::Success(record)
                }
                Err(e) => Outcome::failed(JobStage::Output, ItemError::Output(e)),
            },
            other => other,
        };

        match &outcome {
            Outcome::Success(_) => {
                state.stages.add(&timings);
                debug!("Described {} in {}ms", item_id, elapsed.as_millis());
            }
            Outcome::Removed => debug!("Removed {}", item_id),
            Outcome::Failed { stage, error } => {
                warn!("Item {} failed at {}: {}", item_id, stage, error)
            }
        }

        tally(&mut state.counters, &outcome);
        state.reporter.on_completion(&state.counters);
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    pipeline: Option<ProcessingPipeline>,
    limit: Option<usize>,
    force: bool,
    cancel_token: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            pipeline: None,
            limit: None,
            force: false,
            cancel_token: None,
        }
    }

    // Sets the worker count, this will override the default configuration.
    pub fn workers(mut self, workers: usize) -> Self {
        self.configuration.workers = workers;
        self
    }

    // Sets the progress reporting interval, this will override the default configuration.
    pub fn progress_interval(mut self, progress_interval: usize) -> Self {
        self.configuration.progress_interval = progress_interval;
        self
    }

    // Sets the whole-job deadline, this will override the default configuration.
    pub fn job_timeout(mut self, job_timeout: Option<Duration>) -> Self {
        self.configuration.job_timeout_secs = job_timeout.map(|timeout| timeout.as_secs().max(1));
        self
    }

    /// Cap on scheduled items; zero means no cap
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|&limit| limit > 0);
        self
    }

    /// Schedule described items again
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = Some(cancel_token);
        self
    }

    pub fn pipeline(mut self, pipeline: ProcessingPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn build(self) -> Result<WorkCoordinator, AppError> {
        let pipeline = self
            .pipeline
            .ok_or(AppError::InvalidConfig("Pipeline not set".to_string()))?;
        self.configuration
            .validate()
            .map_err(AppError::InvalidConfig)?;

        Ok(WorkCoordinator {
            configuration: self.configuration,
            pipeline: Arc::new(pipeline),
            limit: self.limit,
            force: self.force,
            cancel_token: self.cancel_token.unwrap_or_default(),
        })
    }
}
