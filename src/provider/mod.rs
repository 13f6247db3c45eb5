//! Collaborators that fetch releases from a package host.

mod github;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::release::ReleaseVersion;

pub use github::GitHubProvider;

/// Downloads the archive of a release.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleasesProvider: Send + Sync {
    /// Place exactly one archive file for `release` into `dest_dir`.
    async fn download(&self, release: &ReleaseVersion, dest_dir: &Path) -> Result<()>;
}

/// Looks up the most recent release of a package.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionFinder: Send + Sync {
    /// Tag of the latest release, e.g. `v1.2.3`.
    async fn latest(&self, organization: &str, name: &str) -> Result<String>;
}
