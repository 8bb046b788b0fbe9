#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covrec::model::Coverage;
use tempfile::TempDir;

/// Create a fresh temporary directory. The caller must hold onto `TempDir`
/// to keep it alive.
pub fn setup_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Write `content` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

pub fn lcov(input: &[u8]) -> Coverage {
    covrec::parsers::lcov::parse(input).unwrap()
}

pub fn gocover(input: &[u8]) -> Coverage {
    covrec::parsers::gocover::parse(input).unwrap()
}

/// (file, total, covered) for every file, in tree order.
pub fn file_totals(coverage: &Coverage) -> Vec<(String, u64, u64)> {
    coverage
        .files
        .iter()
        .map(|f| (f.effective_path().to_string(), f.total, f.covered))
        .collect()
}
