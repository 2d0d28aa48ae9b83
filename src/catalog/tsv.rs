use super::{first_positions, Catalog};
use crate::common::{Item, ItemId, MediaFormat, SourceRef};
use crate::config::DomainRewrite;
use crate::error::CatalogError;
use crate::locator::rewrite_legacy_url;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// TGIF-style catalog: one `url<TAB>caption` pair per line.
/// The (rewritten) URL is the item's identity.
#[derive(Debug, Clone)]
pub struct TsvCatalog {
    name: String,
    items: Vec<Item>,
    positions: HashMap<ItemId, usize>,
}

impl TsvCatalog {
    pub fn load(path: &Path, rewrites: &[DomainRewrite]) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::parse(name, &text, rewrites))
    }

    pub fn parse(name: impl Into<String>, text: &str, rewrites: &[DomainRewrite]) -> Self {
        let mut skipped = 0usize;
        let items: Vec<Item> = text
            .lines()
            .filter_map(|line| {
                let parsed = parse_line(line, rewrites);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();

        if skipped > 0 {
            debug!("Skipped {} TSV lines without a url and caption", skipped);
        }
        Self {
            name: name.into(),
            positions: first_positions(items.iter().map(|item| item.id.clone())),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn parse_line(line: &str, rewrites: &[DomainRewrite]) -> Option<Item> {
    let (url, caption) = line.trim().split_once('\t')?;
    if url.is_empty() {
        return None;
    }

    let url = rewrite_legacy_url(url, rewrites);
    let format = MediaFormat::from_reference(&url);
    Some(Item::new(url.clone(), SourceRef::parse(&url), format).with_caption(caption))
}

impl Catalog for TsvCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&self) -> Vec<Item> {
        self.items.clone()
    }

    fn mark_described(&mut self, id: &ItemId) -> bool {
        match self.positions.get(id) {
            Some(&position) => {
                self.items[position].described = true;
                true
            }
            None => false,
        }
    }

    /// Status lives in the output file alone
    fn persist(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn lines_split_on_first_tab_only() {
        let catalog = TsvCatalog::parse(
            "tgif",
            "https://38.media.tumblr.com/x/tumblr_a.gif\ta cat\tjumps\n\
             no tab here\n\
             \n\
             https://example.com/clip.mp4\ta clip\n",
            &Configuration::default().legacy_domains,
        );

        let items = catalog.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "https://64.media.tumblr.com/x/tumblr_a.gif");
        assert_eq!(items[0].origin_url, "https://64.media.tumblr.com/x/tumblr_a.gif");
        assert_eq!(items[0].caption, "a cat\tjumps");
        assert_eq!(items[0].format, MediaFormat::ImageSequence);
        assert_eq!(items[1].format, MediaFormat::Video);
        assert!(items.iter().all(|item| item.located && !item.described));
    }

    #[test]
    fn marking_flags_the_first_of_repeated_urls() {
        let mut catalog = TsvCatalog::parse(
            "tgif",
            "https://example.com/a.gif\tfirst\n\
             https://example.com/b.gif\tother\n\
             https://example.com/a.gif\tsecond\n",
            &[],
        );

        assert!(catalog.mark_described(&ItemId::from("https://example.com/a.gif")));
        assert!(!catalog.mark_described(&ItemId::from("https://example.com/absent.gif")));

        let described: Vec<_> = catalog.items().iter().map(|item| item.described).collect();
        assert_eq!(described, vec![true, false, false]);
    }

    #[test]
    fn load_names_catalog_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tgif-v1.0.tsv");
        std::fs::write(&path, "https://example.com/a.gif\tcaption\n").unwrap();

        let catalog = TsvCatalog::load(&path, &[]).unwrap();
        assert_eq!(catalog.name(), "tgif-v1.0");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TsvCatalog::load(&dir.path().join("absent.tsv"), &[]),
            Err(CatalogError::Read { .. })
        ));
    }
}
