pub mod description;
pub mod frame;
pub mod item;
pub mod media;

pub use description::{Description, DescriptionRecord, OneOrMany};
pub use frame::{EncodedFrame, FrameOrigin, FrameSet};
pub use item::{Item, ItemId, MediaFormat, SourceRef};
pub use media::LocatedMedia;
