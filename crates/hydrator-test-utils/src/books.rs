//! Temporary book directories.

use std::sync::Arc;

use hydrator_core::BookLibrary;
use tempfile::TempDir;

/// A books directory populated with `.txt` files, deleted on drop.
pub struct TestBookDir {
    dir: TempDir,
}

impl TestBookDir {
    /// Create a directory holding `files` as `(name, text)` pairs.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        for (name, text) in files {
            std::fs::write(dir.path().join(name), text).expect("failed to write book file");
        }
        Self { dir }
    }

    /// An empty books directory.
    pub fn empty() -> Self {
        Self::with_files(&[])
    }

    /// Path as a string, for config fields.
    pub fn path_str(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// Scan the directory into a library.
    pub async fn library(&self) -> Arc<BookLibrary> {
        Arc::new(BookLibrary::scan(self.dir.path()).await)
    }
}
