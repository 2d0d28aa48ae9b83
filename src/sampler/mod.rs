pub mod animated;
pub mod encode;
pub mod plan;
pub mod video;

pub use animated::AnimatedImageSampler;
pub use plan::{sample_indices, sample_timestamps};
pub use video::VideoSampler;

use crate::common::{FrameSet, LocatedMedia, MediaFormat};
use crate::config::Configuration;
use crate::error::ItemError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingSettings {
    pub frame_count: usize,
    pub max_dimension: u32,
}

impl From<&Configuration> for SamplingSettings {
    fn from(configuration: &Configuration) -> Self {
        Self {
            frame_count: configuration.frame_count,
            max_dimension: configuration.max_frame_dimension,
        }
    }
}

/// Produces an ordered, bounded set of encoded stills from one piece of media.
/// Each call is an independent sampling pass.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample(
        &self,
        media: &LocatedMedia,
        settings: SamplingSettings,
    ) -> Result<FrameSet, ItemError>;
    fn name(&self) -> &'static str;
}

/// Format tag to sampler strategy
#[derive(Clone, Default)]
pub struct SamplerTable {
    samplers: IndexMap<MediaFormat, Arc<dyn FrameSampler>>,
}

impl SamplerTable {
    pub fn new() -> Self {
        Self {
            samplers: IndexMap::new(),
        }
    }

    /// GIF/still decoding in-process, video through ffmpeg
    pub fn standard(configuration: &Configuration) -> Self {
        Self::new()
            .with_sampler(MediaFormat::ImageSequence, Arc::new(AnimatedImageSampler::new()))
            .with_sampler(
                MediaFormat::Video,
                Arc::new(VideoSampler::new(
                    configuration.ffmpeg_path.clone(),
                    configuration.ffprobe_path.clone(),
                    configuration.decode_timeout(),
                )),
            )
    }

    pub fn with_sampler(mut self, format: MediaFormat, sampler: Arc<dyn FrameSampler>) -> Self {
        self.samplers.insert(format, sampler);
        self
    }

    pub fn get(&self, format: MediaFormat) -> Option<Arc<dyn FrameSampler>> {
        self.samplers.get(&format).cloned()
    }

    pub fn formats(&self) -> impl Iterator<Item = MediaFormat> + '_ {
        self.samplers.keys().copied()
    }
}

impl std::fmt::Debug for SamplerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.samplers.iter().map(|(format, sampler)| (format.as_str(), sampler.name())))
            .finish()
    }
}
