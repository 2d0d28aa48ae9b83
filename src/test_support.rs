//! Stub collaborators for exercising the job pipeline without network or decoders

use crate::common::{
    EncodedFrame, FrameOrigin, FrameSet, Item, ItemId, LocatedMedia, MediaFormat, SourceRef,
};
use crate::error::{InferenceError, ItemError};
use crate::inference::MultimodalModel;
use crate::locator::{Located, MediaLocator};
use crate::sampler::{FrameSampler, SamplingSettings};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn description_json(literal: &str) -> String {
    format!(
        r#"{{"literal":"{}","source":"unknown","mood":"funny","action":"jumping","context":"reaction","tags":["cat","jump"]}}"#,
        literal
    )
}

pub fn remote_item(id: &str) -> Item {
    Item::new(
        id,
        SourceRef::Remote(format!("https://media.example.com/{}.gif", id)),
        MediaFormat::ImageSequence,
    )
    .with_caption(format!("caption for {}", id))
}

/// Replays queued responses in order, then keeps answering with `fallback`
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, InferenceError>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MultimodalModel for ScriptedModel {
    async fn generate(&self, _instruction: &str, _frames: &FrameSet) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => self.fallback.clone().ok_or(InferenceError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands back the item id as bytes; selected ids are reported removed or missing
#[derive(Default)]
pub struct StubLocator {
    removed: HashSet<ItemId>,
    missing: HashSet<ItemId>,
}

impl StubLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn removing(mut self, id: &str) -> Self {
        self.removed.insert(ItemId::from(id));
        self
    }

    pub fn missing(mut self, id: &str) -> Self {
        self.missing.insert(ItemId::from(id));
        self
    }
}

#[async_trait]
impl MediaLocator for StubLocator {
    async fn locate(&self, item: &Item) -> Result<Located, ItemError> {
        if self.removed.contains(&item.id) {
            return Ok(Located::Removed {
                landing: "https://assets.example.com/images/media_violation/x.png".to_string(),
            });
        }
        if self.missing.contains(&item.id) {
            return Err(ItemError::Network("connection refused".to_string()));
        }
        Ok(Located::Media(LocatedMedia::Bytes {
            data: Bytes::from(item.id.as_str().to_string()),
            url: item.id.as_str().to_string(),
        }))
    }
}

/// Produces `frame_count` one-byte frames; media whose payload is in `failing` errors,
/// and `panicking` payloads panic the worker
#[derive(Default)]
pub struct StubSampler {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
}

impl StubSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl FrameSampler for StubSampler {
    async fn sample(
        &self,
        media: &LocatedMedia,
        settings: SamplingSettings,
    ) -> Result<FrameSet, ItemError> {
        let payload = String::from_utf8_lossy(&media.read_bytes().await.unwrap()).to_string();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(&payload) {
            panic!("decoder crashed on {}", payload);
        }
        if self.failing.contains(&payload) {
            return Err(ItemError::FrameExtraction(format!("corrupt media {}", payload)));
        }
        Ok(FrameSet::new(
            (0..settings.frame_count)
                .map(|i| EncodedFrame::new(vec![i as u8], 1, 1, FrameOrigin::Index(i)))
                .collect(),
        ))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
