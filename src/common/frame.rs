use bytes::Bytes;

pub const FRAME_MIME_TYPE: &str = "image/png";

/// Where in the source a sampled frame came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOrigin {
    Index(usize),
    Timestamp(f64),
}

/// A still image, PNG encoded and already resized
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    data: Bytes,
    width: u32,
    height: u32,
    origin: FrameOrigin,
}

impl EncodedFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, origin: FrameOrigin) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            origin,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn origin(&self) -> FrameOrigin {
        self.origin
    }

    pub fn mime_type(&self) -> &'static str {
        FRAME_MIME_TYPE
    }
}

/// Ordered frames sampled from one item, in chronological order
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    frames: Vec<EncodedFrame>,
}

impl FrameSet {
    pub fn new(frames: Vec<EncodedFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncodedFrame> {
        self.frames.iter()
    }

    /// Source frame indices, for frames sampled from discrete sequences
    pub fn indices(&self) -> Vec<usize> {
        self.frames
            .iter()
            .filter_map(|frame| match frame.origin {
                FrameOrigin::Index(index) => Some(index),
                FrameOrigin::Timestamp(_) => None,
            })
            .collect()
    }
}
