use bytes::Bytes;
use std::path::PathBuf;

/// Readable form of an item once the locator has resolved it
#[derive(Debug, Clone)]
pub enum LocatedMedia {
    Bytes { data: Bytes, url: String },
    File(PathBuf),
}

impl LocatedMedia {
    /// Load the media into memory, reading from disk for local files
    pub async fn read_bytes(&self) -> std::io::Result<Bytes> {
        match self {
            LocatedMedia::Bytes { data, .. } => Ok(data.clone()),
            LocatedMedia::File(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LocatedMedia::Bytes { data, url } => format!("{} ({} bytes)", url, data.len()),
            LocatedMedia::File(path) => path.display().to_string(),
        }
    }
}
