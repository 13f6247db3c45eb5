//! GitHub releases and source archives.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use super::{ReleasesProvider, VersionFinder};
use crate::http::HttpClient;
use crate::release::ReleaseVersion;
use crate::runtime::Runtime;

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        pub tag_name: String,
    }
}

/// Resolves and downloads GitHub release tags.
///
/// Archives are the tag's source tarball, which GitHub packs under a single
/// `<name>-<version-without-v>/` directory.
pub struct GitHubProvider<R: Runtime> {
    runtime: Arc<R>,
    http_client: HttpClient,
    api_url: String,
    archive_url: String,
}

impl<R: Runtime> GitHubProvider<R> {
    pub fn new(runtime: Arc<R>, http_client: HttpClient, api_url: &str, archive_url: &str) -> Self {
        Self {
            runtime,
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            archive_url: archive_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }

    fn tarball_url(&self, release: &ReleaseVersion) -> String {
        format!(
            "{}/{}/{}/archive/refs/tags/{}.tar.gz",
            self.archive_url,
            release.organization(),
            release.name(),
            release.version()
        )
    }
}

#[async_trait]
impl<R: Runtime + 'static> ReleasesProvider for GitHubProvider<R> {
    #[tracing::instrument(skip(self))]
    async fn download(&self, release: &ReleaseVersion, dest_dir: &Path) -> Result<()> {
        let url = self.tarball_url(release);
        let archive = dest_dir.join(format!(
            "{}-{}.tar.gz",
            release.name(),
            release.version_without_v()
        ));

        info!("Downloading {} from {}...", release, url);
        let bytes = self
            .http_client
            .download(&url, || self.runtime.create_file(&archive))
            .await
            .with_context(|| format!("Failed to download {}", release))?;
        debug!("Saved {} bytes to {:?}", bytes, archive);
        Ok(())
    }
}

#[async_trait]
impl<R: Runtime + 'static> VersionFinder for GitHubProvider<R> {
    #[tracing::instrument(skip(self))]
    async fn latest(&self, organization: &str, name: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, organization, name
        );
        debug!("Fetching latest release from {}...", url);
        let release: api::Release = self.http_client.get_json(&url).await?;
        if release.tag_name.is_empty() {
            anyhow::bail!("latest release of {}/{} has no tag", organization, name);
        }
        Ok(release.tag_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use reqwest::Client;
    use std::time::Duration;
    use tempfile::tempdir;

    fn provider(url: &str) -> GitHubProvider<RealRuntime> {
        let http = HttpClient::new(Client::new()).with_retry_delay(Duration::from_millis(1));
        GitHubProvider::new(Arc::new(RealRuntime), http, url, &format!("{}/", url))
    }

    #[test]
    fn test_tarball_url() {
        let provider = provider("https://github.example");
        let release = ReleaseVersion::new("acme", "cli", "v1.2.3");

        assert_eq!(provider.archive_url(), "https://github.example");
        assert_eq!(
            provider.tarball_url(&release),
            "https://github.example/acme/cli/archive/refs/tags/v1.2.3.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_latest_reads_tag_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/cli/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tag_name": "v2.0.0", "name": "Release 2.0"}"#)
            .create_async()
            .await;

        let version = provider(&server.url()).latest("acme", "cli").await.unwrap();

        mock.assert_async().await;
        assert_eq!(version, "v2.0.0");
    }

    #[tokio::test]
    async fn test_latest_without_releases_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/cli/releases/latest")
            .with_status(404)
            .create_async()
            .await;

        assert!(provider(&server.url()).latest("acme", "cli").await.is_err());
    }

    #[tokio::test]
    async fn test_download_writes_named_archive() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/cli/archive/refs/tags/v1.2.3.tar.gz")
            .with_status(200)
            .with_body("tarball bytes")
            .create_async()
            .await;
        let dir = tempdir().unwrap();

        provider(&server.url())
            .download(&ReleaseVersion::new("acme", "cli", "v1.2.3"), dir.path())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cli-1.2.3.tar.gz")).unwrap(),
            "tarball bytes"
        );
    }
}
