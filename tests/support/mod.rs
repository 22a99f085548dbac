//! Shared helpers for integration tests.

// Each test binary uses a different subset.
#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;

/// Writes `name` into `dir` and returns its full path.
pub fn write_script(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).expect("write script");
    path
}
