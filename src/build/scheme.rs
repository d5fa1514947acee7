//! Temporary relocation of a package's shared scheme.
//!
//! A checked-in `<product>.xcscheme` overrides the scheme xcodebuild would
//! synthesize from `Package.swift`, which breaks `-scheme <product>` builds.
//! The file is moved aside for the duration of the build and put back when
//! the guard drops.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const BACKUP_SUFFIX: &str = "app-bundler.bak";

/// `<package>/.swiftpm/xcode/xcshareddata/xcschemes/<product>.xcscheme`
pub fn scheme_path(package_directory: &Path, product: &str) -> PathBuf {
    package_directory
        .join(".swiftpm")
        .join("xcode")
        .join("xcshareddata")
        .join("xcschemes")
        .join(format!("{product}.xcscheme"))
}

/// Restores a relocated scheme file on drop.
#[derive(Debug)]
pub struct SchemeGuard {
    moved: Option<(PathBuf, PathBuf)>,
}

impl SchemeGuard {
    /// Move the product's scheme aside if there is one.
    pub fn relocate(package_directory: &Path, product: &str) -> io::Result<Self> {
        let original = scheme_path(package_directory, product);
        if !original.exists() {
            return Ok(Self { moved: None });
        }

        let backup = original.with_extension(format!("xcscheme.{BACKUP_SUFFIX}"));
        fs::rename(&original, &backup)?;
        debug!(
            from = %original.display(),
            to = %backup.display(),
            "relocated scheme for the duration of the build"
        );
        Ok(Self {
            moved: Some((original, backup)),
        })
    }

    /// Whether a scheme was moved.
    pub fn is_active(&self) -> bool {
        self.moved.is_some()
    }
}

impl Drop for SchemeGuard {
    fn drop(&mut self) {
        let Some((original, backup)) = self.moved.take() else {
            return;
        };
        match fs::rename(&backup, &original) {
            Ok(()) => debug!(path = %original.display(), "restored scheme"),
            Err(e) => warn!(
                path = %original.display(),
                backup = %backup.display(),
                error = %e,
                "failed to restore relocated scheme"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_scheme(package: &Path, product: &str) -> PathBuf {
        let path = scheme_path(package, product);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "<Scheme/>").unwrap();
        path
    }

    #[test]
    fn test_relocates_and_restores() {
        let dir = TempDir::new().unwrap();
        let scheme = write_scheme(dir.path(), "MyApp");

        {
            let guard = SchemeGuard::relocate(dir.path(), "MyApp").unwrap();
            assert!(guard.is_active());
            assert!(!scheme.exists());
            assert!(scheme
                .with_file_name("MyApp.xcscheme.app-bundler.bak")
                .exists());
        }

        assert_eq!(fs::read_to_string(&scheme).unwrap(), "<Scheme/>");
    }

    #[test]
    fn test_no_scheme_is_noop() {
        let dir = TempDir::new().unwrap();
        let guard = SchemeGuard::relocate(dir.path(), "MyApp").unwrap();
        assert!(!guard.is_active());
    }

    #[test]
    fn test_restore_failure_does_not_panic() {
        let dir = TempDir::new().unwrap();
        write_scheme(dir.path(), "MyApp");
        let guard = SchemeGuard::relocate(dir.path(), "MyApp").unwrap();

        // Remove the whole scheme directory so the rename back fails.
        fs::remove_dir_all(dir.path().join(".swiftpm")).unwrap();
        drop(guard);
    }
}
