use crate::pipeline::{Outcome, StageTimings};
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// Completion counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub succeeded: usize,
    pub removed: usize,
    pub failed: usize,
}

impl RunCounters {
    pub fn completed(&self) -> usize {
        self.succeeded + self.removed + self.failed
    }

    pub fn merge(&mut self, other: &RunCounters) {
        self.succeeded += other.succeeded;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Point-in-time view handed to progress observers
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub counters: RunCounters,
    pub scheduled: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completed items per second
    pub fn rate(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.counters.completed() as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Observer pattern for run progress
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot);
}

/// Logs a cumulative summary line
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        info!(
            "Progress: {}/{} | success: {}, removed: {}, failed: {} | {:.2} items/s",
            snapshot.counters.completed(),
            snapshot.scheduled,
            snapshot.counters.succeeded,
            snapshot.counters.removed,
            snapshot.counters.failed,
            snapshot.rate()
        );
    }
}

/// Emits a snapshot after every `interval`th completion and after the last one
pub struct ProgressReporter {
    interval: usize,
    scheduled: usize,
    started: Instant,
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl ProgressReporter {
    pub fn new(interval: usize, scheduled: usize) -> Self {
        Self {
            interval: interval.max(1),
            scheduled,
            started: Instant::now(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Called once per completion, after the counters were updated
    pub fn on_completion(&mut self, counters: &RunCounters) {
        let completed = counters.completed();
        if completed % self.interval != 0 && completed != self.scheduled {
            return;
        }

        let snapshot = ProgressSnapshot {
            counters: *counters,
            scheduled: self.scheduled,
            elapsed: self.elapsed(),
        };
        for observer in &mut self.observers {
            observer.on_progress(&snapshot);
        }
    }
}

/// Cumulative stage time across completed jobs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTotals {
    pub locate: Duration,
    pub sample: Duration,
    pub describe: Duration,
    pub jobs: usize,
}

impl StageTotals {
    pub fn add(&mut self, timings: &StageTimings) {
        self.locate += timings.locate;
        self.sample += timings.sample;
        self.describe += timings.describe;
        self.jobs += 1;
    }

    fn average(total: Duration, jobs: usize) -> Duration {
        match u32::try_from(jobs) {
            Ok(jobs) if jobs > 0 => total / jobs,
            _ => Duration::ZERO,
        }
    }

    pub fn average_locate(&self) -> Duration {
        Self::average(self.locate, self.jobs)
    }

    pub fn average_sample(&self) -> Duration {
        Self::average(self.sample, self.jobs)
    }

    pub fn average_describe(&self) -> Duration {
        Self::average(self.describe, self.jobs)
    }
}

/// Final accounting for one catalog run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub catalog: String,
    pub total: usize,
    pub skipped: usize,
    pub scheduled: usize,
    pub counters: RunCounters,
    pub stages: StageTotals,
    pub elapsed: Duration,
    /// True when shutdown stopped admission before the queue drained
    pub interrupted: bool,
}

impl RunSummary {
    pub fn rate(&self) -> f64 {
        ProgressSnapshot {
            counters: self.counters,
            scheduled: self.scheduled,
            elapsed: self.elapsed,
        }
        .rate()
    }

    pub fn log(&self) {
        info!(
            "Done {} [{}]: success: {}, removed: {}, failed: {} ({} skipped, {} of {} scheduled) in {:.1}s, {:.2} items/s",
            self.catalog,
            self.run_id,
            self.counters.succeeded,
            self.counters.removed,
            self.counters.failed,
            self.skipped,
            self.counters.completed(),
            self.scheduled,
            self.elapsed.as_secs_f64(),
            self.rate()
        );
        if self.stages.jobs > 0 {
            info!(
                "Average stage time: locate {}ms, sample {}ms, describe {}ms",
                self.stages.average_locate().as_millis(),
                self.stages.average_sample().as_millis(),
                self.stages.average_describe().as_millis()
            );
        }
    }
}

/// Count an outcome into the run counters
pub fn tally(counters: &mut RunCounters, outcome: &Outcome) {
    match outcome {
        Outcome::Success(_) => counters.succeeded += 1,
        Outcome::Removed => counters.removed += 1,
        Outcome::Failed { .. } => counters.failed += 1,
    }
}
