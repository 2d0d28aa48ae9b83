use super::{is_tombstone, rewrite_legacy_url, Located, MediaLocator};
use crate::common::{Item, LocatedMedia, SourceRef};
use crate::config::{Configuration, DomainRewrite};
use crate::error::ItemError;
use async_trait::async_trait;
use tracing::{debug, info};

/// Fetches remote media, classifying moderation redirects as removals
#[derive(Debug, Clone)]
pub struct HttpLocator {
    client: reqwest::Client,
    rewrites: Vec<DomainRewrite>,
    removal_markers: Vec<String>,
}

impl HttpLocator {
    pub fn new(configuration: &Configuration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(configuration.fetch_timeout())
            .user_agent(configuration.user_agent.clone())
            .build()?;
        Ok(Self::with_client(
            client,
            configuration.legacy_domains.clone(),
            configuration.removal_markers.clone(),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        rewrites: Vec<DomainRewrite>,
        removal_markers: Vec<String>,
    ) -> Self {
        Self {
            client,
            rewrites,
            removal_markers,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<Located, ItemError> {
        let url = rewrite_legacy_url(url, &self.rewrites);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ItemError::Network(e.to_string()))?;

        let landing = response.url().as_str().to_string();
        if is_tombstone(&landing, &self.removal_markers) {
            info!("Skipping removed media: {} (landed on {})", url, landing);
            return Ok(Located::Removed { landing });
        }

        let response = response
            .error_for_status()
            .map_err(|e| ItemError::Network(e.to_string()))?;
        let data = response
            .bytes()
            .await
            .map_err(|e| ItemError::Network(e.to_string()))?;

        Ok(Located::Media(LocatedMedia::Bytes { data, url }))
    }
}

#[async_trait]
impl MediaLocator for HttpLocator {
    async fn locate(&self, item: &Item) -> Result<Located, ItemError> {
        match &item.source_ref {
            SourceRef::Remote(url) => self.fetch(url).await,
            SourceRef::Local(path) => Err(ItemError::NotFound(path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MediaFormat;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 responder: `/ok.gif` serves bytes, `/removed.gif` redirects to a
    /// tombstone, anything else is a 404
    async fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buffer = vec![0u8; 4096];
                    let mut read = 0;
                    while read < buffer.len() {
                        match stream.read(&mut buffer[read..]).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => read += n,
                        }
                        if buffer[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buffer[..read]);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    let response = match path.as_str() {
                        "/ok.gif" => {
                            "HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nGIF89a"
                                .to_string()
                        }
                        "/removed.gif" => "HTTP/1.1 302 Found\r\nLocation: /images/media_violation/guidelines.png\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
                        p if p.starts_with("/images/media_violation/") => {
                            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nPNG!"
                                .to_string()
                        }
                        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string(),
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        addr
    }

    fn locator() -> HttpLocator {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpLocator::with_client(
            client,
            Configuration::default().legacy_domains,
            vec!["/images/media_violation/".to_string()],
        )
    }

    fn remote_item(url: String) -> Item {
        Item::new(url.clone(), SourceRef::Remote(url), MediaFormat::ImageSequence)
    }

    #[tokio::test]
    async fn reachable_media_is_fetched() {
        let addr = spawn_server().await;
        let located = locator()
            .locate(&remote_item(format!("http://{}/ok.gif", addr)))
            .await
            .unwrap();
        match located {
            Located::Media(LocatedMedia::Bytes { data, .. }) => assert_eq!(&data[..], b"GIF89a"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn redirect_to_tombstone_is_removed() {
        let addr = spawn_server().await;
        let located = locator()
            .locate(&remote_item(format!("http://{}/removed.gif", addr)))
            .await
            .unwrap();
        assert!(matches!(located, Located::Removed { landing } if landing.contains("media_violation")));
    }

    #[tokio::test]
    async fn http_error_is_a_network_failure() {
        let addr = spawn_server().await;
        let result = locator()
            .locate(&remote_item(format!("http://{}/missing.gif", addr)))
            .await;
        assert!(matches!(result, Err(ItemError::Network(_))));
    }
}
