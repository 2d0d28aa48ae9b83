pub mod http;
pub mod local;

pub use http::HttpLocator;
pub use local::LocalLocator;

use crate::common::{Item, LocatedMedia, SourceRef};
use crate::config::{Configuration, DomainRewrite};
use crate::error::ItemError;
use async_trait::async_trait;

/// Result of resolving an item's source reference
#[derive(Debug, Clone)]
pub enum Located {
    Media(LocatedMedia),
    /// Upstream took the content down; `landing` is where the fetch ended up
    Removed { landing: String },
}

#[async_trait]
pub trait MediaLocator: Send + Sync {
    async fn locate(&self, item: &Item) -> Result<Located, ItemError>;
}

/// Apply every configured host rewrite to a remote reference
pub fn rewrite_legacy_url(url: &str, rewrites: &[DomainRewrite]) -> String {
    rewrites
        .iter()
        .fold(url.to_string(), |url, rewrite| url.replace(&rewrite.from, &rewrite.to))
}

/// Whether a resolved location is a moderation tombstone
pub fn is_tombstone(location: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| location.contains(marker.as_str()))
}

/// Routes remote references over HTTP and local ones to the filesystem
#[derive(Debug, Clone)]
pub struct SourceLocator {
    http: HttpLocator,
    local: LocalLocator,
}

impl SourceLocator {
    pub fn new(http: HttpLocator, local: LocalLocator) -> Self {
        Self { http, local }
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(HttpLocator::new(configuration)?, LocalLocator::new()))
    }
}

#[async_trait]
impl MediaLocator for SourceLocator {
    async fn locate(&self, item: &Item) -> Result<Located, ItemError> {
        match &item.source_ref {
            SourceRef::Remote(_) => self.http.locate(item).await,
            SourceRef::Local(_) => self.local.locate(item).await,
        }
    }
}
