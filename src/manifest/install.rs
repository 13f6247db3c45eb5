//! Copying a package into its release directory and publishing its scripts.

use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::Manifest;
use crate::error::{Error, Result};
use crate::runtime::{DirLock, Runtime, absolute_path, is_path_under};

/// Split a release directory into its parent (the release root) and base name.
fn split_dest(dest_dir: &Path) -> Result<(&Path, &str)> {
    let name = dest_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::io("resolve", dest_dir, "release directory has no base name"))?;
    let parent = dest_dir.parent().unwrap_or_else(|| Path::new(""));
    Ok((parent, name))
}

/// Lock file guarding one release directory, kept beside it in the release root.
pub(crate) fn lock_path(dest_dir: &Path) -> Result<PathBuf> {
    let (parent, name) = split_dest(dest_dir)?;
    Ok(parent.join(format!(".{}.lock", name)))
}

fn lock<R: Runtime + ?Sized>(runtime: &R, dest_dir: &Path) -> Result<DirLock> {
    let path = lock_path(dest_dir)?;
    runtime
        .lock_exclusive(&path)
        .map_err(|e| Error::io("lock", &path, e))
}

impl Manifest {
    /// Install the package found in `source_dir` into `dest_dir`.
    ///
    /// Declared files and scripts are copied with their relative layout, the
    /// manifest is written with its name replaced by the base name of
    /// `dest_dir`, and every script is linked from the bin directory next to
    /// `dest_dir`. Links are swapped in atomically, so an existing link never
    /// disappears while a reinstall is running.
    ///
    /// Returns the manifest as written to `dest_dir`. A failure part way
    /// leaves already-copied files in place; installing again completes the
    /// release directory.
    #[tracing::instrument(skip(self, runtime))]
    pub fn install<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<Manifest> {
        let (root, dir_name) = split_dest(dest_dir)?;
        runtime
            .create_dir_all(dest_dir)
            .map_err(|e| Error::io("create directory", dest_dir, e))?;
        let _lock = lock(runtime, dest_dir)?;

        info!("Installing {} into {:?}", self.name, dest_dir);
        for file in self.installation_files() {
            copy_entry(runtime, source_dir, dest_dir, file)?;
        }

        let installed = self.with_name(dir_name);
        installed.write(runtime, dest_dir)?;

        let bin_dir = root.join(&self.bin_dir);
        runtime
            .create_dir_all(&bin_dir)
            .map_err(|e| Error::io("create directory", &bin_dir, e))?;
        for script in self.link_files() {
            copy_entry(runtime, source_dir, dest_dir, script)?;
            let target = absolute_path(runtime, &dest_dir.join(script))
                .map_err(|e| Error::io("resolve", dest_dir.join(script), e))?;
            publish_link(runtime, &target, &bin_dir.join(link_name(script)))?;
        }

        Ok(installed)
    }

    /// Remove everything `install` put in place for `dest_dir`.
    ///
    /// Symlinks in the bin directory are only removed while they still point
    /// into `dest_dir`; a link that was taken over by another release stays.
    #[tracing::instrument(skip(self, runtime))]
    pub fn uninstall<R: Runtime + ?Sized>(&self, runtime: &R, dest_dir: &Path) -> Result<()> {
        let not_installed = || Error::NotInstalled {
            path: dest_dir.to_path_buf(),
        };
        let (root, _) = split_dest(dest_dir)?;
        if !runtime.is_dir(dest_dir) {
            return Err(not_installed());
        }
        let _lock = lock(runtime, dest_dir)?;
        if !self.is_installed(runtime, dest_dir) {
            return Err(not_installed());
        }

        info!("Uninstalling {} from {:?}", self.name, dest_dir);
        let installed_dir = absolute_path(runtime, dest_dir)
            .map_err(|e| Error::io("resolve", dest_dir, e))?;
        let bin_dir = root.join(&self.bin_dir);
        for script in self.link_files() {
            let link = bin_dir.join(link_name(script));
            if !runtime.is_symlink(&link) {
                debug!("No symlink at {:?}, skipping", link);
                continue;
            }
            match runtime.resolve_link(&link) {
                Ok(target) if is_path_under(&target, &installed_dir) => runtime
                    .remove_symlink(&link)
                    .map_err(|e| Error::io("remove symlink", &link, e))?,
                Ok(target) => warn!(
                    "Keeping {:?}: it points to {:?}, outside {:?}",
                    link, target, dest_dir
                ),
                Err(e) => warn!("Keeping {:?}: cannot resolve it: {:#}", link, e),
            }
        }

        // An entry may repeat or name the manifest itself; each path goes once
        let mut files: BTreeSet<PathBuf> = self
            .installation_files()
            .into_iter()
            .map(|file| dest_dir.join(file))
            .collect();
        files.insert(dest_dir.join(&self.manifest_file_name));
        for path in &files {
            runtime
                .remove_file(path)
                .map_err(|e| Error::io("remove file", path, e))?;
        }

        for dir in self.nested_dirs(dest_dir) {
            match runtime.read_dir(&dir) {
                Ok(entries) if entries.is_empty() => runtime
                    .remove_dir(&dir)
                    .map_err(|e| Error::io("remove directory", &dir, e))?,
                Ok(_) => debug!("Keeping non-empty directory {:?}", dir),
                Err(e) => debug!("Skipping {:?}: {:#}", dir, e),
            }
        }
        runtime
            .remove_dir(dest_dir)
            .map_err(|e| Error::io("remove directory", dest_dir, e))
    }

    fn write<R: Runtime + ?Sized>(&self, runtime: &R, dest_dir: &Path) -> Result<()> {
        let path = dest_dir.join(&self.manifest_file_name);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::io("serialize manifest", &path, e))?;
        runtime
            .write(&path, content.as_bytes())
            .map_err(|e| Error::io("write manifest", &path, e))
    }

    /// Directories below `dest_dir` that hold installed entries, deepest first.
    fn nested_dirs(&self, dest_dir: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .installation_files()
            .into_iter()
            .flat_map(|file| Path::new(file).ancestors().skip(1).map(Path::to_path_buf))
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        dirs.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        dirs.dedup();
        dirs.into_iter().map(|dir| dest_dir.join(dir)).collect()
    }
}

fn link_name(script: &str) -> &std::ffi::OsStr {
    Path::new(script)
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(script))
}

fn copy_entry<R: Runtime + ?Sized>(
    runtime: &R,
    source_dir: &Path,
    dest_dir: &Path,
    entry: &str,
) -> Result<()> {
    let source = source_dir.join(entry);
    if !runtime.exists(&source) {
        return Err(Error::SourceFileNotFound { path: source });
    }
    let dest = dest_dir.join(entry);
    if let Some(parent) = dest.parent() {
        runtime
            .create_dir_all(parent)
            .map_err(|e| Error::io("create directory", parent, e))?;
    }
    debug!("Copying {:?} to {:?}", source, dest);
    runtime
        .copy(&source, &dest)
        .map_err(|e| Error::io("copy", &source, e))?;
    Ok(())
}

/// Point `link` at `target` by creating `<link>.tmp` and renaming it over `link`.
fn publish_link<R: Runtime + ?Sized>(runtime: &R, target: &Path, link: &Path) -> Result<()> {
    let mut tmp_name = link.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    // Left behind by an interrupted install
    if runtime.is_symlink(&tmp) {
        runtime
            .remove_symlink(&tmp)
            .map_err(|e| Error::io("remove symlink", &tmp, e))?;
    } else if runtime.exists(&tmp) {
        runtime
            .remove_file(&tmp)
            .map_err(|e| Error::io("remove file", &tmp, e))?;
    }

    debug!("Linking {:?} -> {:?}", link, target);
    runtime
        .symlink(target, &tmp)
        .map_err(|e| Error::io("create symlink", &tmp, e))?;
    runtime
        .rename(&tmp, link)
        .map_err(|e| Error::io("rename", &tmp, e))
}
