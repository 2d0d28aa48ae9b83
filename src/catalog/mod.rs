pub mod manifest;
pub mod tsv;

pub use manifest::{find_sources, ManifestCatalog, ManifestStats};
pub use tsv::TsvCatalog;

use crate::common::{Item, ItemId};
use crate::error::CatalogError;
use std::collections::HashMap;

/// Position of each identity; a repeated identity keeps its first position,
/// matching the occurrence the coordinator schedules
fn first_positions(ids: impl IntoIterator<Item = ItemId>) -> HashMap<ItemId, usize> {
    let mut positions = HashMap::new();
    for (position, id) in ids.into_iter().enumerate() {
        positions.entry(id).or_insert(position);
    }
    positions
}

/// Source of items and sink for their `described` flag
pub trait Catalog: Send {
    fn name(&self) -> &str;

    fn items(&self) -> Vec<Item>;

    /// Returns false when the catalog has no item with this id
    fn mark_described(&mut self, id: &ItemId) -> bool;

    /// Write status changes back to durable storage
    fn persist(&self) -> Result<(), CatalogError>;

    /// Items that are located and, unless forced, not yet described
    fn pending_items(&self, force: bool) -> Vec<Item> {
        self.items()
            .into_iter()
            .filter(|item| item.is_pending(force))
            .collect()
    }
}
