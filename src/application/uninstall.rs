//! Uninstall use case.

use log::info;
use std::path::Path;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::release::{LATEST, ReleaseVersion};
use crate::runtime::Runtime;

pub struct UninstallUseCase<'a, R: ?Sized> {
    runtime: &'a R,
    root: &'a Path,
    manifest_file_name: &'a str,
}

impl<'a, R: Runtime + ?Sized> UninstallUseCase<'a, R> {
    pub fn new(runtime: &'a R, root: &'a Path, manifest_file_name: &'a str) -> Self {
        Self {
            runtime,
            root,
            manifest_file_name,
        }
    }

    /// Remove `package`. Without a version (or with `latest`) whichever
    /// release is installed is removed.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, package: &str) -> Result<ReleaseVersion> {
        let identifier = Identifier::parse(package)?;
        let mut release =
            ReleaseVersion::from_identifier(&identifier).with_manifest(self.manifest_file_name);
        if release.version() == LATEST {
            release = release.with_version("");
        }

        release.uninstall(self.runtime, self.root)?;
        info!("Uninstalled {}", release);
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::manifest::Manifest;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn install_demo(root: &Path, version: &str) {
        let source = tempdir().unwrap();
        fs::write(source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
        Manifest::builder("demo")
            .version(version)
            .scripts(["run.sh"])
            .build()
            .unwrap()
            .install(&RealRuntime, source.path(), &root.join("acme-demo"))
            .unwrap();
    }

    #[test]
    fn test_uninstall_by_version() {
        let dir = tempdir().unwrap();
        install_demo(dir.path(), "1.0.0");
        let use_case = UninstallUseCase::new(&RealRuntime, dir.path(), "package.json");

        assert!(matches!(
            use_case.uninstall("acme/demo:v2.0.0"),
            Err(Error::NotInstalled { .. })
        ));
        let removed = use_case.uninstall("acme/demo:v1.0.0").unwrap();

        assert_eq!(removed.composite_key(), "acme-demo");
        assert!(!dir.path().join("acme-demo").exists());
        assert!(!dir.path().join("bin/run.sh").exists());
    }

    #[test]
    fn test_uninstall_any_version() {
        for package in ["acme/demo", "acme/demo:latest"] {
            let dir = tempdir().unwrap();
            install_demo(dir.path(), "3.1.0");

            UninstallUseCase::new(&RealRuntime, dir.path(), "package.json")
                .uninstall(package)
                .unwrap();
            assert!(!dir.path().join("acme-demo").exists());
        }
    }

    #[test]
    fn test_uninstall_missing_package() {
        let dir = tempdir().unwrap();
        let err = UninstallUseCase::new(&RealRuntime, &dir.path().join("deps"), "package.json")
            .uninstall("acme/demo")
            .unwrap_err();
        assert!(matches!(err, Error::NotInstalled { .. }));
    }
}
