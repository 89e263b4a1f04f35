//! Document retrieval
//!
//! Charters are published at `<host>/.well-known/dao.toml`; proposals live at
//! any URL, including `ipfs://` addresses resolved through a gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{GovernanceError, GovernanceResult};

/// Path of the charter under a DAO's host
pub const CHARTER_PATH: &str = "/.well-known/dao.toml";

/// Source of charter and proposal documents
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the raw bytes at `location`
    async fn fetch(&self, location: &str) -> GovernanceResult<Vec<u8>>;
}

/// Expand a DAO host into its charter URL. Locations that already name a
/// `.toml` file are used as given.
pub fn charter_url(location: &str) -> String {
    let trimmed = location.trim().trim_end_matches('/');
    if trimmed.ends_with(".toml") {
        return trimmed.to_string();
    }
    let base = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    format!("{}{}", base, CHARTER_PATH)
}

/// Fetches documents over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    http: reqwest::Client,
    ipfs_gateway: String,
}

impl HttpDocumentFetcher {
    /// Fetcher resolving `ipfs://` locations through `ipfs_gateway`
    pub fn new(ipfs_gateway: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            ipfs_gateway: ipfs_gateway.trim_end_matches('/').to_string(),
        }
    }

    /// The URL actually requested for `location`
    pub fn resolve(&self, location: &str) -> String {
        match location.strip_prefix("ipfs://") {
            Some(path) => format!("{}/ipfs/{}", self.ipfs_gateway, path),
            None => location.to_string(),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, location: &str) -> GovernanceResult<Vec<u8>> {
        let url = self.resolve(location);
        debug!("Fetching document {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GovernanceError::external("documents", format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(GovernanceError::external(
                "documents",
                format!("{} returned {}", url, response.status()),
            ));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| GovernanceError::external("documents", format!("{}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}

/// In-memory document store for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    documents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `content` at `location`
    pub async fn publish(&self, location: &str, content: impl Into<Vec<u8>>) {
        let mut documents = self.documents.write().await;
        documents.insert(location.to_string(), content.into());
    }
}

#[async_trait]
impl DocumentFetcher for MemoryFetcher {
    async fn fetch(&self, location: &str) -> GovernanceResult<Vec<u8>> {
        let documents = self.documents.read().await;
        documents
            .get(location)
            .cloned()
            .ok_or_else(|| GovernanceError::external("documents", format!("{} not found", location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn test_charter_url() {
        assert_eq!(charter_url("dao.example.org"), "https://dao.example.org/.well-known/dao.toml");
        assert_eq!(charter_url("http://localhost:8000/"), "http://localhost:8000/.well-known/dao.toml");
        assert_eq!(charter_url("https://cdn.example.org/dao.toml"), "https://cdn.example.org/dao.toml");
    }

    #[test]
    fn test_ipfs_resolution() {
        let fetcher = HttpDocumentFetcher::new("https://gateway.example/");
        assert_eq!(fetcher.resolve("ipfs://QmHash"), "https://gateway.example/ipfs/QmHash");
        assert_eq!(fetcher.resolve("https://a.b/p.toml"), "https://a.b/p.toml");
    }

    #[test]
    fn test_memory_fetcher() {
        block_on(async {
            let fetcher = MemoryFetcher::new();
            fetcher.publish("ipfs://QmHash", "VOTING_TOKEN = \"x\"").await;
            assert_eq!(fetcher.fetch("ipfs://QmHash").await.unwrap(), b"VOTING_TOKEN = \"x\"".to_vec());
            assert!(matches!(
                fetcher.fetch("ipfs://missing").await,
                Err(GovernanceError::ExternalService { .. })
            ));
        });
    }
}
