//! Test helpers: synthetic Exif blocks and JPEG files for integration tests.
//!
//! Run from workspace root: `cargo test -p straighten-processing`.

#![allow(dead_code)]

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory holding fixture files for one test.
pub struct TestDir {
    pub dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes).expect("write fixture");
        path
    }

    /// Number of entries in the directory.
    pub fn entries(&self) -> usize {
        fs::read_dir(self.dir.path()).expect("read dir").count()
    }
}
