//! List use case - installed packages under the install root.

use std::path::Path;

use crate::error::Result;
use crate::manifest::{Manifest, Registry};
use crate::runtime::Runtime;

pub struct ListUseCase<'a, R: ?Sized> {
    runtime: &'a R,
    root: &'a Path,
}

impl<'a, R: Runtime + ?Sized> ListUseCase<'a, R> {
    pub fn new(runtime: &'a R, root: &'a Path) -> Self {
        Self { runtime, root }
    }

    /// Installed manifests sorted by name, then by discovery order.
    pub fn list(&self) -> Result<Vec<Manifest>> {
        let registry = Registry::scan(self.runtime, self.root)?;
        Ok(registry.iter().cloned().collect())
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

    #[test]
    fn test_list_empty_root() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/deps")))
            .returning(|_| false);

        let packages = ListUseCase::new(&runtime, Path::new("/deps")).list().unwrap();
        assert!(packages.is_empty());
    }

    #[test]
    fn test_list_sorted_by_name() {
        let dir = tempdir().unwrap();
        for (key, version) in [("zeta-tool", "0.1"), ("acme-cli", "v1.2.3"), ("mid-lib", "")] {
            fs::create_dir_all(dir.path().join(key)).unwrap();
            fs::write(
                dir.path().join(key).join("package.json"),
                format!(r#"{{"name":"{}","version":"{}"}}"#, key, version),
            )
            .unwrap();
        }

        let packages = ListUseCase::new(&RealRuntime, dir.path()).list().unwrap();

        let names: Vec<&str> = packages.iter().map(Manifest::name).collect();
        assert_eq!(names, ["acme-cli", "mid-lib", "zeta-tool"]);
        assert_eq!(packages[0].version(), "v1.2.3");
    }
}
