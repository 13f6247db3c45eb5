mod tar_gz;

use crate::runtime::Runtime;
use anyhow::Result;
use std::path::Path;

pub use tar_gz::TarGzExtractor;

/// Unpacks a downloaded release archive.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, keeping the archive's own
    /// top-level layout.
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()>;
}
