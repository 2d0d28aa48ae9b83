use super::{first_positions, Catalog};
use crate::common::{Item, ItemId, MediaFormat, SourceRef};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DESCRIPTIONS_FILE: &str = "descriptions.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub source: String,
    #[serde(default)]
    pub items: Vec<ManifestEntry>,
    /// Fields written by the scrapers that this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    #[serde(default)]
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub described: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestEntry {
    /// Entries without a local file cannot be sampled and never count as located
    fn to_item(&self, source_dir: &Path) -> Item {
        let format = MediaFormat::from_tag(self.format.as_deref().unwrap_or("gif"));
        let source_ref = SourceRef::Local(source_dir.join(self.local_file.as_deref().unwrap_or_default()));
        let located = self.downloaded && self.local_file.is_some();

        Item::new(self.id.as_str(), source_ref, format)
            .with_origin_url(self.original_url.clone())
            .with_caption(self.title.clone().unwrap_or_default())
            .with_attribution(self.page_url.clone())
            .with_status(located, self.described)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestStats {
    pub total: usize,
    pub downloaded: usize,
    pub described: usize,
}

/// One `sources/<name>/manifest.json` and the items it lists
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    dir: PathBuf,
    manifest: Manifest,
    positions: HashMap<ItemId, usize>,
}

impl ManifestCatalog {
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Read {
            path: path.clone(),
            source,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&text).map_err(|source| CatalogError::Parse { path, source })?;
        Ok(Self::new(dir, manifest))
    }

    pub fn new(dir: &Path, manifest: Manifest) -> Self {
        let positions = first_positions(
            manifest
                .items
                .iter()
                .map(|entry| ItemId::from(entry.id.as_str())),
        );
        Self {
            dir: dir.to_path_buf(),
            manifest,
            positions,
        }
    }

    pub fn descriptions_path(&self) -> PathBuf {
        self.dir.join(DESCRIPTIONS_FILE)
    }

    pub fn stats(&self) -> ManifestStats {
        let items = &self.manifest.items;
        ManifestStats {
            total: items.len(),
            downloaded: items.iter().filter(|entry| entry.downloaded).count(),
            described: items.iter().filter(|entry| entry.described).count(),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            "=== {} === ({} items, {} downloaded, {} described)",
            self.manifest.source, stats.total, stats.downloaded, stats.described
        );
    }
}

impl Catalog for ManifestCatalog {
    fn name(&self) -> &str {
        &self.manifest.source
    }

    fn items(&self) -> Vec<Item> {
        self.manifest
            .items
            .iter()
            .map(|entry| entry.to_item(&self.dir))
            .collect()
    }

    fn mark_described(&mut self, id: &ItemId) -> bool {
        match self.positions.get(id) {
            Some(&position) => {
                self.manifest.items[position].described = true;
                true
            }
            None => false,
        }
    }

    /// Write to a sibling temp file, then rename it over the manifest
    fn persist(&self) -> Result<(), CatalogError> {
        let path = self.dir.join(MANIFEST_FILE);
        let write_error = |source| CatalogError::Write {
            path: path.clone(),
            source,
        };

        let temp = NamedTempFile::new_in(&self.dir).map_err(write_error)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.manifest)
                .map_err(|e| write_error(e.into()))?;
            writer.flush().map_err(write_error)?;
        }
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(&path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

/// Source directories under `sources_dir` holding a manifest, sorted by name.
/// Directories starting with `_` are ignored.
pub fn find_sources(sources_dir: &Path, filter: Option<&str>) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = match std::fs::read_dir(sources_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CatalogError::Read {
                path: sources_dir.to_path_buf(),
                source,
            })
        }
    };

    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CatalogError::Read {
            path: sources_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if !path.is_dir() || name.starts_with('_') {
            continue;
        }
        if filter.is_some_and(|wanted| wanted != name) {
            continue;
        }
        if path.join(MANIFEST_FILE).is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}
