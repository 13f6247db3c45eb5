//! Package manifests and the installation engine.
//!
//! A manifest (`package.json` by default) declares the files a package
//! installs and the scripts that additionally get a symlink in the shared
//! bin directory:
//!
//! ```json
//! {"name": "demo", "version": "1.0.0", "files": ["a.txt"], "scripts": ["run.sh"]}
//! ```
//!
//! Installed layout for a release root `root`:
//!
//! ```text
//! root/
//!   .acme-demo.lock        exclusive lock for the release directory
//!   acme-demo/             release directory (composite key)
//!     package.json         re-serialized manifest, name = "acme-demo"
//!     a.txt
//!     run.sh
//!   bin/
//!     run.sh -> /abs/root/acme-demo/run.sh
//! ```

mod install;
mod registry;

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

pub use registry::{Registry, packages_installed};
pub(crate) use registry::same_version;

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Default bin directory name, a sibling of every release directory.
pub const DEFAULT_BIN_DIR: &str = "bin";

fn default_bin_dir() -> String {
    DEFAULT_BIN_DIR.to_string()
}

fn is_default_bin_dir(bin_dir: &str) -> bool {
    bin_dir == DEFAULT_BIN_DIR
}

/// Deserialize a value that may be null as its default
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt: Option<T> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// In-memory model of a package manifest.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Manifest {
    /// File name the manifest was loaded from and is written back to.
    #[serde(skip)]
    manifest_file_name: String,
    name: String,
    #[serde(default, deserialize_with = "nullable")]
    version: String,
    #[serde(default, deserialize_with = "nullable")]
    files: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    scripts: Vec<String>,
    #[serde(
        rename = "binDir",
        alias = "BinDir",
        default = "default_bin_dir",
        skip_serializing_if = "is_default_bin_dir"
    )]
    bin_dir: String,
}

impl Manifest {
    pub fn builder(name: impl Into<String>) -> ManifestBuilder {
        ManifestBuilder::new(name)
    }

    /// Load a manifest file. The manifest file name becomes the file's base name.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            return Err(Error::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = runtime
            .read_to_string(path)
            .map_err(|e| Error::io("read manifest", path, e))?;

        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| Error::ManifestParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.manifest_file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());
        if manifest.bin_dir.is_empty() {
            manifest.bin_dir = default_bin_dir();
        }
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Load a manifest from literal JSON, as if it were stored as `file_name`.
    ///
    /// The content goes through a scratch directory that is removed on every
    /// exit path.
    pub fn from_literal<R: Runtime + ?Sized>(runtime: &R, text: &str, file_name: &str) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("bpkg-manifest-")
            .tempdir()
            .map_err(|e| Error::io("create temporary directory", runtime.temp_dir(), e))?;
        let path = scratch.path().join(file_name);
        runtime
            .write(&path, text.as_bytes())
            .map_err(|e| Error::io("write manifest", &path, e))?;
        Self::load(runtime, &path)
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn bin_dir(&self) -> &str {
        &self.bin_dir
    }

    /// Files then scripts: everything copied into a release directory.
    pub fn installation_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .chain(self.scripts.iter())
            .map(String::as_str)
            .collect()
    }

    /// Entries that get a published symlink.
    pub fn link_files(&self) -> Vec<&str> {
        self.scripts.iter().map(String::as_str).collect()
    }

    /// Number of installed units; the manifest itself counts as one.
    pub fn installation_files_count(&self) -> usize {
        self.files.len() + self.scripts.len() + 1
    }

    /// Whether every declared file and the manifest exist under `dir`.
    pub fn is_installed<R: Runtime + ?Sized>(&self, runtime: &R, dir: &Path) -> bool {
        runtime.exists(&dir.join(&self.manifest_file_name))
            && self
                .installation_files()
                .into_iter()
                .all(|file| runtime.exists(&dir.join(file)))
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

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: String| Error::ManifestParseError {
            path: path.to_path_buf(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".into()));
        }
        for entry in self.installation_files() {
            if !is_contained(entry) {
                return Err(invalid(format!(
                    "entry {:?} must be a relative path inside the package",
                    entry
                )));
            }
        }
        if !is_contained(&self.bin_dir) {
            return Err(invalid(format!(
                "binDir {:?} must be a relative path",
                self.bin_dir
            )));
        }
        Ok(())
    }
}

/// A non-empty relative path that stays below its base directory.
fn is_contained(entry: &str) -> bool {
    let path = Path::new(entry);
    !entry.is_empty()
        && path.file_name().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn sorted(items: &[String]) -> Vec<&String> {
    let mut items: Vec<&String> = items.iter().collect();
    items.sort();
    items
}

impl PartialEq for Manifest {
    /// Files and scripts compare as multisets: order is ignored, repetitions are not.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bin_dir == other.bin_dir
            && self.manifest_file_name == other.manifest_file_name
            && self.version == other.version
            && sorted(&self.files) == sorted(&other.files)
            && sorted(&self.scripts) == sorted(&other.scripts)
    }
}

impl Eq for Manifest {}

/// Builder for manifests created in code rather than loaded from disk.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    manifest: Manifest,
}

impl ManifestBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            manifest: Manifest {
                manifest_file_name: DEFAULT_MANIFEST.to_string(),
                name: name.into(),
                version: String::new(),
                files: Vec::new(),
                scripts: Vec::new(),
                bin_dir: default_bin_dir(),
            },
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.manifest.version = version.into();
        self
    }

    pub fn files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    pub fn bin_dir(mut self, bin_dir: impl Into<String>) -> Self {
        self.manifest.bin_dir = bin_dir.into();
        self
    }

    pub fn manifest_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.manifest.manifest_file_name = file_name.into();
        self
    }

    pub fn build(self) -> Result<Manifest> {
        let file_name = self.manifest.manifest_file_name.clone();
        self.manifest.validate(Path::new(&file_name))?;
        Ok(self.manifest)
    }
}
