use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::{Component, Path};
use tar::Archive;

use super::ArchiveExtractor;
use crate::runtime::{Runtime, is_path_under};

/// Extractor for .tar.gz / .tgz archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting {:?} to {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        runtime.create_dir_all(extract_to)?;

        for entry in archive.entries().context("Failed to read tar entries")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            let entry_path = entry.path()?.into_owned();

            if entry_path.is_absolute()
                || entry_path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir))
            {
                bail!("Archive entry escapes the extraction root: {:?}", entry_path);
            }

            // GitHub source archives carry a global pax header; skip metadata entries
            let entry_type = entry.header().entry_type();
            if matches!(
                entry_type,
                tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
            ) {
                continue;
            }

            if matches!(entry_type, tar::EntryType::Symlink | tar::EntryType::Link) {
                let target = entry
                    .link_name()?
                    .with_context(|| format!("Link {:?} has no target", entry_path))?
                    .into_owned();
                // Symlinks resolve from their own directory, hard links from the archive root
                let base = match entry_type {
                    tar::EntryType::Symlink => {
                        extract_to.join(entry_path.parent().unwrap_or(Path::new("")))
                    }
                    _ => extract_to.to_path_buf(),
                };
                if target.is_absolute() || !is_path_under(&base.join(&target), extract_to) {
                    bail!(
                        "Archive link {:?} -> {:?} escapes the extraction root",
                        entry_path,
                        target
                    );
                }
            }

            // unpack_in refuses to write through symlinks that lead outside extract_to
            let unpacked = entry
                .unpack_in(extract_to)
                .with_context(|| format!("Failed to extract {:?}", entry_path))?;
            if !unpacked {
                bail!("Archive entry escapes the extraction root: {:?}", entry_path);
            }
        }

        info!("Extraction complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::{self, File};
    use tar::Builder;
    use tempfile::tempdir;

    fn create_test_archive(path: &Path, files: &[(&str, &str, u32)]) -> Result<()> {
        let file = File::create(path)?;
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(enc);

        for (name, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }

        tar.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn test_can_handle() {
        let extractor = TarGzExtractor;
        assert!(extractor.can_handle(Path::new("file.tar.gz")));
        assert!(extractor.can_handle(Path::new("FILE.TGZ")));
        assert!(!extractor.can_handle(Path::new("file.zip")));
    }

    #[test]
    fn test_extract_keeps_top_level_directory() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("cli-1.2.3.tar.gz");
        let extract_path = dir.path().join("extracted");

        create_test_archive(
            &archive_path,
            &[
                ("cli-1.2.3/package.json", r#"{"name":"cli"}"#, 0o644),
                ("cli-1.2.3/bin/run.sh", "#!/bin/sh\necho hi\n", 0o755),
            ],
        )?;

        TarGzExtractor.extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(
            fs::read_to_string(extract_path.join("cli-1.2.3/package.json"))?,
            r#"{"name":"cli"}"#
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(extract_path.join("cli-1.2.3/bin/run.sh"))?
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
        Ok(())
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let dir = tempdir().unwrap();
        let result = TarGzExtractor.extract(
            &RealRuntime,
            &dir.path().join("missing.tar.gz"),
            &dir.path().join("out"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_rejects_parent_dir_entries() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("evil.tar.gz");

        // Header::set_path refuses `..`, so write the raw name bytes
        let file = File::create(&archive_path)?;
        let mut tar = Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.as_gnu_mut().unwrap().name[..9].copy_from_slice(b"../evil.t");
        header.set_size(0);
        header.set_cksum();
        tar.append(&header, std::io::empty())?;
        tar.into_inner()?.finish()?;

        let result = TarGzExtractor.extract(&RealRuntime, &archive_path, &dir.path().join("out"));
        assert!(result.is_err());
        assert!(!dir.path().join("evil.t").exists());
        Ok(())
    }

    fn create_archive_with_link(path: &Path, link: &str, target: &str, files: &[&str]) -> Result<()> {
        let file = File::create(path)?;
        let mut tar = Builder::new(GzEncoder::new(file, Compression::default()));

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        tar.append_link(&mut header, link, target)?;

        for name in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(4);
            header.set_mode(0o644);
            tar.append_data(&mut header, name, "evil".as_bytes())?;
        }
        tar.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn test_extract_rejects_write_through_escaping_symlink() -> Result<()> {
        let dir = tempdir()?;
        let outside = dir.path().join("outside");
        fs::create_dir(&outside)?;
        let archive_path = dir.path().join("evil.tar.gz");
        create_archive_with_link(&archive_path, "pkg/link", "../../outside", &["pkg/link/evil.txt"])?;

        let result = TarGzExtractor.extract(&RealRuntime, &archive_path, &dir.path().join("out"));

        assert!(result.is_err());
        assert!(!outside.join("evil.txt").exists());
        Ok(())
    }

    #[test]
    fn test_extract_rejects_absolute_symlink() -> Result<()> {
        let dir = tempdir()?;
        let outside = dir.path().join("outside");
        fs::create_dir(&outside)?;
        let archive_path = dir.path().join("evil.tar.gz");
        create_archive_with_link(
            &archive_path,
            "pkg/link",
            outside.to_str().unwrap(),
            &["pkg/link/evil.txt"],
        )?;

        let result = TarGzExtractor.extract(&RealRuntime, &archive_path, &dir.path().join("out"));

        assert!(result.is_err());
        assert!(!outside.join("evil.txt").exists());
        assert!(!dir.path().join("out/pkg/link").exists());
        Ok(())
    }

    #[test]
    fn test_extract_keeps_symlink_inside_root() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("pkg.tar.gz");
        let extract_path = dir.path().join("out");
        create_archive_with_link(&archive_path, "pkg/run", "bin/run.sh", &["pkg/bin/run.sh"])?;

        TarGzExtractor.extract(&RealRuntime, &archive_path, &extract_path)?;

        let link = extract_path.join("pkg/run");
        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_to_string(&link)?, "evil");
        Ok(())
    }
}
