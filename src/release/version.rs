use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};

use super::ReleaseAsset;
use crate::archive::ArchiveExtractor;
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::manifest::{DEFAULT_MANIFEST, Manifest, Registry, same_version};
use crate::provider::{ReleasesProvider, VersionFinder};
use crate::runtime::Runtime;

/// Version keyword resolved through a [`VersionFinder`].
pub const LATEST: &str = "latest";

/// One release of a package and the queries about its installed state.
///
/// Releases install into `<root>/<organization>-<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    organization: String,
    name: String,
    version: String,
    manifest_file_name: String,
}

impl ReleaseVersion {
    pub fn new(organization: &str, name: &str, version: &str) -> Self {
        Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            manifest_file_name: DEFAULT_MANIFEST.to_string(),
        }
    }

    pub fn from_identifier(identifier: &Identifier) -> Self {
        Self::new(
            identifier.organization(),
            identifier.name(),
            identifier.version(),
        )
    }

    /// Resolve the version `identifier` asks for.
    ///
    /// An unversioned identifier is rejected and `latest` is looked up
    /// through `finder`.
    pub async fn resolve<F>(identifier: &Identifier, finder: &F) -> Result<Self>
    where
        F: VersionFinder + ?Sized,
    {
        if !identifier.has_version() {
            return Err(Error::VersionRequired {
                package: identifier.package(),
            });
        }
        if identifier.version() == LATEST {
            return Self::latest(identifier.organization(), identifier.name(), finder).await;
        }
        Ok(Self::from_identifier(identifier))
    }

    /// The newest release of `organization/name` according to `finder`.
    pub async fn latest<F>(organization: &str, name: &str, finder: &F) -> Result<Self>
    where
        F: VersionFinder + ?Sized,
    {
        let version = finder
            .latest(organization, name)
            .await
            .map_err(|e| Error::VersionLookupFailure {
                package: format!("{}/{}", organization, name),
                reason: format!("{:#}", e),
            })?;
        debug!("Latest release of {}/{} is {}", organization, name, version);
        Ok(Self::new(organization, name, &version))
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    /// `organization-name`, the directory a release installs into.
    pub fn composite_key(&self) -> String {
        format!("{}-{}", self.organization, self.name)
    }

    pub fn install_dir(&self, root: &Path) -> PathBuf {
        root.join(self.composite_key())
    }

    /// Version with a leading `v`. An unresolved version stays empty.
    pub fn version_with_v(&self) -> String {
        match self.version.as_str() {
            "" => String::new(),
            v if v.starts_with('v') => v.to_string(),
            v => format!("v{}", v),
        }
    }

    /// Version without a leading `v`, as used in archive folder names.
    pub fn version_without_v(&self) -> &str {
        self.version.strip_prefix('v').unwrap_or(&self.version)
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..self.clone()
        }
    }

    pub fn with_manifest(&self, manifest_file_name: &str) -> Self {
        Self {
            manifest_file_name: manifest_file_name.to_string(),
            ..self.clone()
        }
    }

    /// Whether a readable manifest exists in the install directory.
    pub fn is_installed<R: Runtime + ?Sized>(&self, runtime: &R, root: &Path) -> bool {
        self.package_metadata(runtime, &self.install_dir(root)).is_ok()
    }

    /// Whether the installed manifest declares `version`, ignoring a leading `v`.
    pub fn is_version_installed<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        version: &str,
        root: &Path,
    ) -> bool {
        self.package_metadata(runtime, &self.install_dir(root))
            .is_ok_and(|manifest| same_version(manifest.version(), version))
    }

    /// Load the manifest stored in `dir`.
    pub fn package_metadata<R: Runtime + ?Sized>(&self, runtime: &R, dir: &Path) -> Result<Manifest> {
        Manifest::load(runtime, &dir.join(&self.manifest_file_name))
    }

    /// Download this release into a scratch directory under `work_dir` and unpack it.
    ///
    /// The scratch directory is removed once the returned asset and all its
    /// clones are dropped.
    #[tracing::instrument(skip(runtime, provider, extractor))]
    pub async fn download_asset<R, P, E>(
        &self,
        runtime: &R,
        provider: &P,
        extractor: &E,
        work_dir: &Path,
    ) -> Result<ReleaseAsset>
    where
        R: Runtime + 'static,
        P: ReleasesProvider + ?Sized,
        E: ArchiveExtractor,
    {
        runtime
            .create_dir_all(work_dir)
            .map_err(|e| Error::io("create directory", work_dir, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(".bpkg-")
            .tempdir_in(work_dir)
            .map_err(|e| Error::io("create temporary directory", work_dir, e))?;
        let download_dir = scratch.path().join("download");
        runtime
            .create_dir_all(&download_dir)
            .map_err(|e| Error::io("create directory", &download_dir, e))?;

        provider
            .download(self, &download_dir)
            .await
            .map_err(|e| self.provider_failure(format!("{:#}", e)))?;

        let downloaded = runtime
            .read_dir(&download_dir)
            .map_err(|e| Error::io("read directory", &download_dir, e))?;
        let archive = match downloaded.as_slice() {
            [archive] => archive.clone(),
            files => {
                return Err(self.provider_failure(format!(
                    "expected exactly one archive, found {}",
                    files.len()
                )));
            }
        };

        let asset = ReleaseAsset::open(
            runtime,
            extractor,
            &archive,
            &scratch.path().join("extract"),
            &self.name,
            &self.version,
        )?;
        Ok(asset.owning(scratch))
    }

    /// Install `asset` under the composite key using the manifest it ships.
    pub fn install_asset<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        asset: &ReleaseAsset,
        root: &Path,
    ) -> Result<Manifest> {
        let manifest = self.package_metadata(runtime, &asset.decompress_path())?;
        self.install_asset_with_manifest(runtime, &manifest, asset, root)
    }

    /// Install `asset` into `root/<alias>` using the manifest it ships.
    pub fn install_asset_with_name<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        alias: &str,
        asset: &ReleaseAsset,
        root: &Path,
    ) -> Result<Manifest> {
        let manifest = self.package_metadata(runtime, &asset.decompress_path())?;
        info!("Installing {} as {}", self, alias);
        asset.with_name(alias).install(runtime, &manifest, root)
    }

    /// Install `asset` under the composite key, following `manifest` instead
    /// of the one the archive ships.
    pub fn install_asset_with_manifest<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        manifest: &Manifest,
        asset: &ReleaseAsset,
        root: &Path,
    ) -> Result<Manifest> {
        info!("Installing {}", self);
        asset
            .with_name(&self.composite_key())
            .install(runtime, manifest, root)
    }

    /// Remove the installed copy of this package found by scanning `root`.
    ///
    /// A resolved version must match the installed one; an unresolved
    /// version removes whatever release is installed.
    #[tracing::instrument(skip(runtime))]
    pub fn uninstall<R: Runtime + ?Sized>(&self, runtime: &R, root: &Path) -> Result<()> {
        let key = self.composite_key();
        let registry = Registry::scan(runtime, root)?;
        let installed = if self.version.is_empty() {
            registry.find(&key)
        } else {
            registry.find_version(&key, &self.version)
        };
        let Some(manifest) = installed else {
            return Err(Error::NotInstalled {
                path: self.install_dir(root),
            });
        };
        info!("Uninstalling {} from {:?}", self, root);
        manifest.uninstall(runtime, &self.install_dir(root))
    }

    fn provider_failure(&self, reason: String) -> Error {
        Error::ProviderFailure {
            package: self.to_string(),
            reason,
        }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.name)?;
        if !self.version.is_empty() {
            write!(f, ":{}", self.version)?;
        }
        Ok(())
    }
}
