use super::context::StageTimings;
use crate::common::{DescriptionRecord, ItemId};
use crate::error::ItemError;
use std::time::Duration;

/// Where in a job a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Locate,
    Sample,
    Describe,
    /// Job-level failures: timeout or a crashed worker
    Job,
    Output,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Locate => "locate",
            JobStage::Sample => "sample",
            JobStage::Describe => "describe",
            JobStage::Job => "job",
            JobStage::Output => "output",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of one processing attempt
#[derive(Debug)]
pub enum Outcome {
    Success(Box<DescriptionRecord>),
    Removed,
    Failed { stage: JobStage, error: ItemError },
}

impl Outcome {
    pub fn failed(stage: JobStage, error: ItemError) -> Self {
        Outcome::Failed { stage, error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// What a worker hands back to the coordinator for one item
#[derive(Debug)]
pub struct JobReport {
    pub item_id: ItemId,
    pub outcome: Outcome,
    pub timings: StageTimings,
    pub elapsed: Duration,
}
