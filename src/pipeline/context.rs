use super::outcome::JobStage;
use crate::common::{Description, FrameSet, Item, LocatedMedia};
use std::time::Duration;

/// Context object that flows through the job pipeline.
/// Contains everything produced for a single item so far.
#[derive(Debug)]
pub struct JobContext {
    pub item: Item,
    pub media: Option<LocatedMedia>,
    pub frames: Option<FrameSet>,
    pub description: Option<Description>,
    /// Where a removed item's fetch ended up
    pub removed_landing: Option<String>,
    pub timings: StageTimings,
}

impl JobContext {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            media: None,
            frames: None,
            description: None,
            removed_landing: None,
            timings: StageTimings::default(),
        }
    }
}

/// Time spent in each stage of one job
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub locate: Duration,
    pub sample: Duration,
    pub describe: Duration,
}

impl StageTimings {
    pub fn record(&mut self, stage: JobStage, duration: Duration) {
        match stage {
            JobStage::Locate => self.locate = duration,
            JobStage::Sample => self.sample = duration,
            JobStage::Describe => self.describe = duration,
            JobStage::Job | JobStage::Output => {}
        }
    }
}
