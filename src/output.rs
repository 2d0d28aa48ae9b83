use crate::common::{DescriptionRecord, ItemId};
use crate::error::AppError;
use std::collections::HashSet;
use std::io;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

/// How an existing output file is treated when the sink opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Keep prior records and add to the end (resume)
    Append,
    /// Start from an empty file (fresh or forced runs)
    Truncate,
}

/// Newline-delimited JSON sink; every record is flushed before `append` returns
pub struct OutputSink<W> {
    writer: W,
    written: usize,
}

/// True when the file exists, is non-empty and its last byte is not a newline
async fn ends_mid_line(path: &Path) -> io::Result<bool> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

impl OutputSink<File> {
    pub async fn open(path: &Path, mode: OpenMode) -> Result<Self, AppError> {
        let output_error = |source| AppError::Output {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(output_error)?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OpenMode::Append => options.append(true),
            OpenMode::Truncate => options.write(true).truncate(true),
        };
        let torn = mode == OpenMode::Append && ends_mid_line(path).await.map_err(output_error)?;
        let mut file = options.open(path).await.map_err(output_error)?;

        // a partial record left by an interrupted run must not swallow the next one
        if torn {
            warn!("{} ends with an incomplete line, starting a new one", path.display());
            file.write_all(b"\n").await.map_err(output_error)?;
            file.flush().await.map_err(output_error)?;
        }

        debug!("Opened output {} ({:?})", path.display(), mode);
        Ok(Self::new(file))
    }
}

impl<W> OutputSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
        }
    }

    pub async fn append(&mut self, record: &DescriptionRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub async fn close(mut self) -> io::Result<W> {
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

/// Identities that already have a record and are not scheduled again
#[derive(Debug, Clone, Default)]
pub struct SkipSet {
    ids: HashSet<ItemId>,
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ItemId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ItemId> for SkipSet {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Identity of one output line: `id`, or `url` for records written without one
fn record_identity(line: &str) -> Option<ItemId> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value
        .get("id")
        .or_else(|| value.get("url"))
        .and_then(|identity| identity.as_str())
        .map(ItemId::from)
}

/// Scan an existing output file; a missing file is an empty skip-set
pub async fn load_skip_set(path: &Path) -> Result<SkipSet, AppError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No existing output at {}", path.display());
            return Ok(SkipSet::new());
        }
        Err(source) => {
            return Err(AppError::Output {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut skip = SkipSet::new();
    let mut malformed = 0usize;
    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await.map_err(|source| AppError::Output {
        path: path.to_path_buf(),
        source,
    })? {
        if line.trim().is_empty() {
            continue;
        }
        match record_identity(&line) {
            Some(id) => {
                skip.insert(id);
            }
            None => malformed += 1,
        }
    }

    if malformed > 0 {
        warn!("Skipped {} malformed lines in {}", malformed, path.display());
    }
    info!("Resuming: {} items already described in {}", skip.len(), path.display());
    Ok(skip)
}
