//! Remote documents: the modpack manifest and the server snapshot.

use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::manifest::{ModpackManifest, ServerSnapshot};
use crate::utils::{InstallerError, Result};

/// Where the installer gets its two remote documents from
pub trait RemoteSource: Send + Sync {
    fn fetch_manifest(&self) -> impl Future<Output = Result<ModpackManifest>> + Send;

    fn fetch_snapshot(&self) -> impl Future<Output = Result<ServerSnapshot>> + Send;
}

/// Fetches both documents as JSON over HTTP
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    manifest_url: String,
    snapshot_url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, config: &SourceConfig) -> Self {
        Self {
            client,
            manifest_url: config.manifest_url.clone(),
            snapshot_url: config.snapshot_url.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, document: &str, url: &str) -> Result<T> {
        debug!("Fetching {} from {}", document, url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InstallerError::fetch(document, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::fetch(document, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| InstallerError::fetch(document, e))?;
        serde_json::from_slice(&body)
            .map_err(|e| InstallerError::fetch(document, format!("invalid JSON: {}", e)))
    }
}

impl RemoteSource for HttpSource {
    async fn fetch_manifest(&self) -> Result<ModpackManifest> {
        let manifest: ModpackManifest = self.get_json("manifest", &self.manifest_url).await?;
        info!("Fetched manifest: {}", manifest);
        Ok(manifest)
    }

    async fn fetch_snapshot(&self) -> Result<ServerSnapshot> {
        let snapshot: ServerSnapshot = self.get_json("snapshot", &self.snapshot_url).await?;
        info!("Fetched snapshot: {} entries", snapshot.len());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::SAMPLE_JSON;
    use crate::transfer::downloader::tests::spawn_server;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    fn source_for(base: &str) -> HttpSource {
        HttpSource::new(
            reqwest::Client::new(),
            &SourceConfig {
                manifest_url: format!("{}/manifest.json", base),
                snapshot_url: format!("{}/file_info", base),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_both_documents() {
        let app = Router::new()
            .route("/manifest.json", get(|| async { SAMPLE_JSON }))
            .route(
                "/file_info",
                get(|| async {
                    r#"{"timestamp": 1700000000, "files": [
                        {"path": "config/ui/opts.json", "modified": 1000, "size": 3}
                    ]}"#
                }),
            );
        let base = spawn_server(app).await;
        let source = source_for(&base);

        let manifest = source.fetch_manifest().await.unwrap();
        assert_eq!(manifest.modpack_info.version, "2.1");

        let snapshot = source.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.lookup("config/ui/opts.json").is_some());
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_failure() {
        let app = Router::new().route(
            "/manifest.json",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = spawn_server(app).await;

        let err = source_for(&base).fetch_manifest().await.unwrap_err();
        match err {
            InstallerError::Fetch { document, reason } => {
                assert_eq!(document, "manifest");
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_fetch_failure() {
        let app = Router::new().route("/file_info", get(|| async { "<html>oops</html>" }));
        let base = spawn_server(app).await;

        match source_for(&base).fetch_snapshot().await.unwrap_err() {
            InstallerError::Fetch { document, reason } => {
                assert_eq!(document, "snapshot");
                assert!(reason.starts_with("invalid JSON"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
