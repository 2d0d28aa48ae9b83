use super::{Located, MediaLocator};
use crate::common::{Item, LocatedMedia, SourceRef};
use crate::error::ItemError;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct LocalLocator;

impl LocalLocator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaLocator for LocalLocator {
    async fn locate(&self, item: &Item) -> Result<Located, ItemError> {
        let path = match &item.source_ref {
            SourceRef::Local(path) => path,
            SourceRef::Remote(url) => {
                return Err(ItemError::Network(format!(
                    "Local locator cannot fetch {}",
                    url
                )))
            }
        };

        match tokio::fs::try_exists(path).await {
            Ok(true) => Ok(Located::Media(LocatedMedia::File(path.clone()))),
            _ => Err(ItemError::NotFound(path.clone())),
        }
    }
}
