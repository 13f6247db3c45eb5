//! Error types for package installation.
//!
//! Every variant names the path or package it concerns so callers can report
//! failures without extra context. Underlying causes are carried as text
//! because most of them originate from the `anyhow`-based runtime layer.

use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the installation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The text does not match `organization/name[:version]`.
    #[error("invalid package identifier {input:?}, expected organization/name[:version]")]
    InvalidIdentifierFormat {
        /// The rejected input.
        input: String,
    },

    /// An operation needs a pinned version but the identifier has none.
    #[error("version is required for {package}, use {package}:v1.0.0 or {package}:latest")]
    VersionRequired {
        /// The unversioned package.
        package: String,
    },

    /// No manifest file exists at the expected location.
    #[error("manifest not found at {}", path.display())]
    ManifestNotFound {
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// The manifest exists but could not be understood.
    #[error("invalid manifest {}: {reason}", path.display())]
    ManifestParseError {
        /// The manifest file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A file declared in the manifest is missing from the source tree.
    #[error("source file not found: {}", path.display())]
    SourceFileNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// The package is not (completely) installed at the given directory.
    #[error("package is not installed at {}", path.display())]
    NotInstalled {
        /// The release directory that was checked.
        path: PathBuf,
    },

    /// The extracted archive does not contain exactly one top-level directory.
    #[error("unexpected archive layout in {}: {reason}", path.display())]
    ArchiveLayoutError {
        /// The extraction root.
        path: PathBuf,
        /// What was found instead.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("failed to {operation} {}: {reason}", path.display())]
    IoFailure {
        /// The operation that failed (copy, rename, ...).
        operation: &'static str,
        /// The path the operation targeted.
        path: PathBuf,
        /// Description of the underlying error.
        reason: String,
    },

    /// The release provider could not deliver an archive.
    #[error("release provider failed for {package}: {reason}")]
    ProviderFailure {
        /// The package being downloaded.
        package: String,
        /// Description of the failure.
        reason: String,
    },

    /// The latest version of a package could not be determined.
    #[error("cannot find latest release version of {package}: {reason}")]
    VersionLookupFailure {
        /// The package being looked up.
        package: String,
        /// Description of the failure.
        reason: String,
    },
}

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, err: impl Display) -> Self {
        Error::IoFailure {
            operation,
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
