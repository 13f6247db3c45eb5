//! Inventory of installed packages under a release root.

use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

use super::Manifest;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Walk `root` and load every `*.json` file that parses as a manifest.
///
/// Files that fail to load and subdirectories that cannot be read are
/// skipped. Symlinked directories are not followed. A missing `root` holds
/// no packages; only an unreadable `root` is an error.
#[tracing::instrument(skip(runtime))]
pub fn packages_installed<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Vec<Manifest>> {
    if !runtime.exists(root) {
        debug!("Release root {:?} does not exist", root);
        return Ok(Vec::new());
    }
    let entries = runtime
        .read_dir(root)
        .map_err(|e| Error::io("scan", root, e))?;

    let mut manifests = Vec::new();
    walk(runtime, entries, &mut manifests);
    Ok(manifests)
}

fn walk<R: Runtime + ?Sized>(runtime: &R, entries: Vec<std::path::PathBuf>, out: &mut Vec<Manifest>) {
    for path in entries {
        if runtime.is_symlink(&path) {
            continue;
        }
        if runtime.is_dir(&path) {
            match runtime.read_dir(&path) {
                Ok(children) => walk(runtime, children, out),
                Err(e) => debug!("Skipping unreadable directory {:?}: {:#}", path, e),
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match Manifest::load(runtime, &path) {
                Ok(manifest) => out.push(manifest),
                Err(e) => debug!("Skipping {:?}: {}", path, e),
            }
        }
    }
}

/// Compare two versions, ignoring a leading `v` on either side.
pub(crate) fn same_version(a: &str, b: &str) -> bool {
    a.strip_prefix('v').unwrap_or(a) == b.strip_prefix('v').unwrap_or(b)
}

/// Installed manifests indexed by name, then version.
///
/// Installed manifests are named after their release directory, so the
/// name doubles as the composite key of a package.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    by_name: BTreeMap<String, Vec<Manifest>>,
}

impl Registry {
    pub fn scan<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Self> {
        Ok(packages_installed(runtime, root)?.into_iter().collect())
    }

    /// First manifest registered under `name`.
    pub fn find(&self, name: &str) -> Option<&Manifest> {
        self.by_name.get(name).and_then(|m| m.first())
    }

    /// Manifest registered under `name` at `version`, ignoring a leading `v`.
    pub fn find_version(&self, name: &str, version: &str) -> Option<&Manifest> {
        self.by_name
            .get(name)?
            .iter()
            .find(|m| same_version(m.version(), version))
    }

    /// Whether `name` is installed at exactly `version`.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.find_version(name, version).is_some()
    }

    /// Whether any release is installed under `name`.
    pub fn is_taken(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Manifests ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.by_name.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<Manifest> for Registry {
    fn from_iter<I: IntoIterator<Item = Manifest>>(iter: I) -> Self {
        let mut by_name: BTreeMap<String, Vec<Manifest>> = BTreeMap::new();
        for manifest in iter {
            by_name
                .entry(manifest.name().to_string())
                .or_default()
                .push(manifest);
        }
        Self { by_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_loads_valid_and_skips_invalid() {
        let root = tempdir().unwrap();
        write(
            &root.path().join("acme-cli/package.json"),
            r#"{"name":"acme-cli","version":"v1.0.0"}"#,
        );
        write(
            &root.path().join("acme-lib/package.json"),
            r#"{"name":"acme-lib","version":"2.0"}"#,
        );
        write(
            &root.path().join("acme-lib/nested/deeper/extra.json"),
            r#"{"name":"nested","files":["x"]}"#,
        );
        write(&root.path().join("broken/package.json"), "{ not json");
        write(&root.path().join("nameless/package.json"), r#"{"version":"1"}"#);
        write(&root.path().join("acme-cli/README.md"), "# not a manifest");

        let manifests = packages_installed(&RealRuntime, root.path()).unwrap();

        let mut names: Vec<&str> = manifests.iter().map(Manifest::name).collect();
        names.sort();
        assert_eq!(names, ["acme-cli", "acme-lib", "nested"]);
        let nested = manifests.iter().find(|m| m.name() == "nested").unwrap();
        assert_eq!(nested.manifest_file_name(), "extra.json");
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_symlinked_directories() {
        let root = tempdir().unwrap();
        let outside = tempdir().unwrap();
        write(&outside.path().join("package.json"), r#"{"name":"outside"}"#);
        std::os::unix::fs::symlink(outside.path(), root.path().join("linked")).unwrap();

        assert!(packages_installed(&RealRuntime, root.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let root = tempdir().unwrap();
        let missing = root.path().join("deps");

        assert!(packages_installed(&RealRuntime, &missing).unwrap().is_empty());
        assert!(Registry::scan(&RealRuntime, &missing).unwrap().is_empty());
    }

    #[test]
    fn test_scan_unreadable_root_is_an_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_dir()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let err = packages_installed(&runtime, Path::new("/deps")).unwrap_err();
        assert!(matches!(err, Error::IoFailure { operation: "scan", .. }));
    }

    #[test]
    fn test_scan_skips_unreadable_subdirectory() {
        let mut runtime = MockRuntime::new();
        let root = PathBuf::from("/deps");
        let locked = PathBuf::from("/deps/locked");
        let manifest = PathBuf::from("/deps/package.json");

        runtime.expect_is_symlink().returning(|_| false);
        runtime
            .expect_exists()
            .with(eq(root.clone()))
            .returning(|_| true);
        runtime
            .expect_is_dir()
            .with(eq(locked.clone()))
            .returning(|_| true);
        runtime
            .expect_is_dir()
            .with(eq(manifest.clone()))
            .returning(|_| false);
        let (l, m) = (locked.clone(), manifest.clone());
        runtime
            .expect_read_dir()
            .with(eq(root.clone()))
            .returning(move |_| Ok(vec![l.clone(), m.clone()]));
        runtime
            .expect_read_dir()
            .with(eq(locked.clone()))
            .returning(|_| Err(anyhow::anyhow!("permission denied")));
        runtime
            .expect_exists()
            .with(eq(manifest.clone()))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(manifest.clone()))
            .returning(|_| Ok(r#"{"name":"acme-cli"}"#.into()));

        let manifests = packages_installed(&runtime, &root).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].name(), "acme-cli");
    }

    #[test]
    fn test_same_version() {
        assert!(same_version("v1.0.0", "1.0.0"));
        assert!(same_version("1.0.0", "1.0.0"));
        assert!(!same_version("v1.0.0", "v1.0.1"));
        assert!(!same_version("", "v1"));
    }

    #[test]
    fn test_registry_lookups() {
        let registry: Registry = [
            Manifest::builder("acme-cli").version("v1.0.0").build().unwrap(),
            Manifest::builder("acme-cli").version("v2.0.0").build().unwrap(),
            Manifest::builder("acme-lib").build().unwrap(),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert!(registry.is_taken("acme-cli"));
        assert!(!registry.is_taken("acme"));
        assert_eq!(registry.find("acme-cli").unwrap().version(), "v1.0.0");
        assert_eq!(
            registry.find_version("acme-cli", "2.0.0").unwrap().version(),
            "v2.0.0"
        );
        assert!(registry.contains("acme-lib", ""));
        assert!(!registry.contains("acme-lib", "v1.0.0"));
        assert!(registry.find_version("missing", "").is_none());

        let names: Vec<&str> = registry.iter().map(Manifest::name).collect();
        assert_eq!(names, ["acme-cli", "acme-cli", "acme-lib"]);
    }
}
