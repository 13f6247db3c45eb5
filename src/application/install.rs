//! Install use case - resolve, download, unpack and install one release.

use log::info;
use std::path::Path;

use crate::archive::ArchiveExtractor;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::manifest::Manifest;
use crate::provider::{ReleasesProvider, VersionFinder};
use crate::release::ReleaseVersion;
use crate::runtime::Runtime;

/// What an install request ended up doing.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The release was installed; `manifest` is the manifest written to disk.
    Installed {
        release: ReleaseVersion,
        manifest: Manifest,
    },
    /// The requested version was already installed and nothing changed.
    AlreadyInstalled(ReleaseVersion),
}

pub struct InstallUseCase<'a, R, P: ?Sized, F: ?Sized, E> {
    runtime: &'a R,
    provider: &'a P,
    finder: &'a F,
    extractor: &'a E,
    root: &'a Path,
    manifest_file_name: &'a str,
}

impl<'a, R, P, F, E> InstallUseCase<'a, R, P, F, E>
where
    R: Runtime + 'static,
    P: ReleasesProvider + ?Sized,
    F: VersionFinder + ?Sized,
    E: ArchiveExtractor,
{
    pub fn new(
        runtime: &'a R,
        provider: &'a P,
        finder: &'a F,
        extractor: &'a E,
        root: &'a Path,
        manifest_file_name: &'a str,
    ) -> Self {
        Self {
            runtime,
            provider,
            finder,
            extractor,
            root,
            manifest_file_name,
        }
    }

    /// Install `package` (`organization/name:version`).
    ///
    /// `manifest_json`, when given, replaces the manifest shipped in the
    /// archive.
    #[tracing::instrument(skip(self, manifest_json))]
    pub async fn install(&self, package: &str, manifest_json: Option<&str>) -> Result<InstallOutcome> {
        let identifier = Identifier::parse(package)?;
        let release = ReleaseVersion::resolve(&identifier, self.finder)
            .await?
            .with_manifest(self.manifest_file_name);

        if release.is_version_installed(self.runtime, release.version(), self.root) {
            info!("{} is already installed", release);
            return Ok(InstallOutcome::AlreadyInstalled(release));
        }

        // Reject a bad override before downloading anything
        let override_manifest = manifest_json
            .map(|json| Manifest::from_literal(self.runtime, json, self.manifest_file_name))
            .transpose()?;

        let asset = release
            .download_asset(
                self.runtime,
                self.provider,
                self.extractor,
                &self.runtime.temp_dir(),
            )
            .await?;
        let manifest = match override_manifest {
            Some(manifest) => {
                release.install_asset_with_manifest(self.runtime, &manifest, &asset, self.root)?
            }
            None => release.install_asset(self.runtime, &asset, self.root)?,
        };

        info!("Installed {} into {:?}", release, release.install_dir(self.root));
        Ok(InstallOutcome::Installed { release, manifest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::archive::MockArchiveExtractor;
    use crate::provider::{MockReleasesProvider, MockVersionFinder};
    use crate::runtime::RealRuntime;
    use crate::test_utils::{DEMO_PACKAGE, fake_extractor, provider_with_archives};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn no_lookup() -> MockVersionFinder {
        let mut finder = MockVersionFinder::new();
        finder.expect_latest().never();
        finder
    }

    #[tokio::test]
    async fn test_install_then_already_installed() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("deps");
        let finder = no_lookup();
        let provider = provider_with_archives(1);
        let extractor = fake_extractor(DEMO_PACKAGE);
        let use_case = InstallUseCase::new(
            &RealRuntime,
            &provider,
            &finder,
            &extractor,
            &root,
            "package.json",
        );

        let outcome = use_case.install("acme/demo:v1.0.0", None).await.unwrap();
        let InstallOutcome::Installed { release, manifest } = outcome else {
            panic!("expected a fresh install");
        };
        assert_eq!(release.to_string(), "acme/demo:v1.0.0");
        assert_eq!(manifest.name(), "acme-demo");
        assert!(root.join("acme-demo/run.sh").exists());
        assert!(RealRuntime.is_symlink(&root.join("bin/run.sh")));

        let again = use_case.install("acme/demo:v1.0.0", None).await.unwrap();
        assert!(matches!(again, InstallOutcome::AlreadyInstalled(_)));
    }

    #[tokio::test]
    async fn test_install_latest_resolves_version() {
        let dir = tempdir().unwrap();
        let mut finder = MockVersionFinder::new();
        finder
            .expect_latest()
            .with(eq("acme"), eq("demo"))
            .times(1)
            .returning(|_, _| Ok("v1.0.0".into()));
        let mut provider = MockReleasesProvider::new();
        provider
            .expect_download()
            .withf(|release, _| release.version() == "v1.0.0")
            .returning(|_, dest| {
                std::fs::write(dest.join("demo-1.0.0.tar.gz"), "archive")?;
                Ok(())
            });
        let extractor = fake_extractor(DEMO_PACKAGE);

        let outcome = InstallUseCase::new(
            &RealRuntime,
            &provider,
            &finder,
            &extractor,
            dir.path(),
            "package.json",
        )
        .install("acme/demo:latest", None)
        .await
        .unwrap();

        assert!(matches!(outcome, InstallOutcome::Installed { ref release, .. } if release.version() == "v1.0.0"));
    }

    #[tokio::test]
    async fn test_install_with_manifest_override() {
        let dir = tempdir().unwrap();
        let finder = no_lookup();
        let provider = provider_with_archives(1);
        let extractor = fake_extractor(DEMO_PACKAGE);

        let outcome = InstallUseCase::new(
            &RealRuntime,
            &provider,
            &finder,
            &extractor,
            dir.path(),
            "package.json",
        )
        .install(
            "acme/demo:v1.0.0",
            Some(r#"{"name":"demo","version":"1.0.0","files":["a.txt"]}"#),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, InstallOutcome::Installed { .. }));
        assert!(dir.path().join("acme-demo/a.txt").exists());
        assert!(!dir.path().join("acme-demo/run.sh").exists());
        assert!(!dir.path().join("bin/run.sh").exists());
    }

    #[tokio::test]
    async fn test_install_rejects_before_downloading() {
        let dir = tempdir().unwrap();
        let finder = no_lookup();
        let mut provider = MockReleasesProvider::new();
        provider.expect_download().never();
        let extractor = MockArchiveExtractor::new();
        let use_case = InstallUseCase::new(
            &RealRuntime,
            &provider,
            &finder,
            &extractor,
            dir.path(),
            "package.json",
        );

        assert!(matches!(
            use_case.install("acme/demo", None).await,
            Err(Error::VersionRequired { .. })
        ));
        assert!(matches!(
            use_case.install("acme//demo:v1", None).await,
            Err(Error::InvalidIdentifierFormat { .. })
        ));
        assert!(matches!(
            use_case.install("acme/demo:v1", Some(r#"{"files":[]}"#)).await,
            Err(Error::ManifestParseError { .. })
        ));
    }
}
