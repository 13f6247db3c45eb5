use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::archive::ArchiveExtractor;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, packages_installed};
use crate::runtime::Runtime;

/// An extracted release archive and the package directory inside it.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    name: String,
    version: String,
    source_archive: PathBuf,
    extraction_root: PathBuf,
    package_folder: String,
    /// Scratch directory holding the archive, removed with the last clone.
    scratch: Option<Arc<TempDir>>,
}

impl ReleaseAsset {
    /// Extract `source_archive` into `extraction_root` and locate its package directory.
    ///
    /// The archive must unpack to exactly one top-level directory.
    #[tracing::instrument(skip(runtime, extractor))]
    pub fn open<R, E>(
        runtime: &R,
        extractor: &E,
        source_archive: &Path,
        extraction_root: &Path,
        name: &str,
        version: &str,
    ) -> Result<Self>
    where
        R: Runtime + 'static,
        E: ArchiveExtractor,
    {
        if !extractor.can_handle(source_archive) {
            return Err(Error::io(
                "extract",
                source_archive,
                "unsupported archive format",
            ));
        }
        extractor
            .extract(runtime, source_archive, extraction_root)
            .map_err(|e| Error::io("extract", source_archive, e))?;

        let entries = runtime
            .read_dir(extraction_root)
            .map_err(|e| Error::io("read directory", extraction_root, e))?;
        let folders: Vec<String> = entries
            .iter()
            .filter(|path| runtime.is_dir(path) && !runtime.is_symlink(path))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let package_folder = match folders.as_slice() {
            [folder] => folder.clone(),
            [] => {
                return Err(Error::ArchiveLayoutError {
                    path: extraction_root.to_path_buf(),
                    reason: "no top-level directory".into(),
                });
            }
            several => {
                return Err(Error::ArchiveLayoutError {
                    path: extraction_root.to_path_buf(),
                    reason: format!("{} top-level directories: {}", several.len(), several.join(", ")),
                });
            }
        };
        debug!("Package folder of {:?} is {}", source_archive, package_folder);

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            source_archive: source_archive.to_path_buf(),
            extraction_root: extraction_root.to_path_buf(),
            package_folder,
            scratch: None,
        })
    }

    /// Keep `scratch` alive for as long as this asset or one of its clones exists.
    pub(crate) fn owning(mut self, scratch: TempDir) -> Self {
        self.scratch = Some(Arc::new(scratch));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source_archive(&self) -> &Path {
        &self.source_archive
    }

    pub fn extraction_root(&self) -> &Path {
        &self.extraction_root
    }

    pub fn package_folder(&self) -> &str {
        &self.package_folder
    }

    /// Root of the unpacked package.
    pub fn decompress_path(&self) -> PathBuf {
        self.extraction_root.join(&self.package_folder)
    }

    /// Install the unpacked package into `release_dir/<name>`.
    pub fn install<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        manifest: &Manifest,
        release_dir: &Path,
    ) -> Result<Manifest> {
        manifest.install(runtime, &self.decompress_path(), &release_dir.join(&self.name))
    }

    pub fn uninstall<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        manifest: &Manifest,
        release_dir: &Path,
    ) -> Result<()> {
        manifest.uninstall(runtime, &release_dir.join(&self.name))
    }

    /// Whether an installed manifest under `release_dir` equals `manifest`.
    pub fn is_installed<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        manifest: &Manifest,
        release_dir: &Path,
    ) -> bool {
        match packages_installed(runtime, release_dir) {
            Ok(installed) => installed.iter().any(|m| m == manifest),
            Err(e) => {
                debug!("Cannot scan {:?}: {}", release_dir, e);
                false
            }
        }
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
}
