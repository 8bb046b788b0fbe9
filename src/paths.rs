//! File identity across reports.
//!
//! Tools disagree on how to spell a source path: Go writes module-qualified
//! paths, LCOV usually writes absolute ones, others write paths relative to
//! wherever the tool ran. Matching is done on path segments from the end,
//! so `src/utils/groups.ts` and `web/src/utils/groups.ts` line up while
//! `xgroups.ts` and `groups.ts` do not.

use std::collections::HashMap;
use std::path::{Component, Path};

use crate::error::{CovrecError, Result};
use crate::model::{Coverage, FileCoverage};

/// Split a path on either separator, dropping empty and `.` segments.
fn segments(path: &str) -> Vec<&str> {
    path.split(|c| c == '/' || c == '\\')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Number of trailing segments shared by `a` and `b`, provided the shorter
/// one is entirely a suffix of the longer.
fn suffix_match(a: &[&str], b: &[&str]) -> Option<usize> {
    let shared = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (shared > 0 && shared == a.len().min(b.len())).then_some(shared)
}

/// A known file relative to the project root.
struct Candidate {
    relative: String,
    segments: Vec<String>,
}

fn candidates<P: AsRef<Path>>(root: &Path, known_files: &[P]) -> Vec<Candidate> {
    known_files
        .iter()
        .filter_map(|path| {
            let relative = path.as_ref().strip_prefix(root).ok()?;
            let segments: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => s.to_str().map(str::to_string),
                    _ => None,
                })
                .collect();
            (!segments.is_empty()).then(|| Candidate {
                relative: segments.join("/"),
                segments,
            })
        })
        .collect()
}

impl Coverage {
    /// Resolve `normalized_path` for every file against a listing of the
    /// project tree. `known_files` are absolute paths under `root`; entries
    /// outside it are ignored. The longest segment-suffix match wins, ties
    /// going to the shorter relative path and then to listing order.
    /// Returns the number of files resolved.
    pub fn normalize_paths<P: AsRef<Path>>(&mut self, root: &Path, known_files: &[P]) -> usize {
        if root.as_os_str().is_empty() || known_files.is_empty() {
            return 0;
        }
        let candidates = candidates(root, known_files);
        let mut resolved = 0;

        for file in &mut self.files {
            let wanted = segments(&file.file);
            let mut best: Option<(usize, &Candidate)> = None;
            for candidate in &candidates {
                let have: Vec<&str> = candidate.segments.iter().map(String::as_str).collect();
                let Some(len) = suffix_match(&wanted, &have) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((best_len, current)) => {
                        len > best_len
                            || (len == best_len && candidate.segments.len() < current.segments.len())
                    }
                };
                if better {
                    best = Some((len, candidate));
                }
            }

            match best {
                Some((_, candidate)) => {
                    file.normalized_path = candidate.relative.clone();
                    resolved += 1;
                }
                None => tracing::debug!(file = %file.file, "no matching file under project root"),
            }
        }

        tracing::debug!(resolved, files = self.files.len(), root = %root.display(), "normalized paths");
        resolved
    }

    /// Exact lookup by either the effective path or the raw path.
    pub fn find_by_file(&self, name: &str) -> Result<&FileCoverage> {
        self.files
            .iter()
            .find(|f| f.effective_path() == name || f.file == name)
            .ok_or_else(|| CovrecError::NotFound(name.to_string()))
    }

    /// Suffix-tolerant lookup. An exact match wins; otherwise any file whose
    /// path and `name` are segment suffixes of one another qualifies, and the
    /// shortest matching path is preferred.
    pub fn fuzzy_find_by_file(&self, name: &str) -> Result<&FileCoverage> {
        if let Ok(file) = self.find_by_file(name) {
            return Ok(file);
        }
        let wanted = segments(name);
        self.files
            .iter()
            .filter_map(|f| {
                [f.effective_path(), f.file.as_str()]
                    .into_iter()
                    .filter(|path| suffix_match(&segments(path), &wanted).is_some())
                    .map(str::len)
                    .min()
                    .map(|len| (len, f))
            })
            .min_by_key(|(len, _)| *len)
            .map(|(_, f)| f)
            .ok_or_else(|| CovrecError::NotFound(name.to_string()))
    }
}

/// Position lookup for a list of files, keyed canonically by effective path
/// with a secondary index on the raw path. A lookup succeeds when either
/// spelling of the file looked up hits either index.
#[derive(Debug, Default)]
pub(crate) struct FileIndex {
    by_path: HashMap<String, usize>,
    by_raw: HashMap<String, usize>,
}

impl FileIndex {
    pub(crate) fn new(files: &[FileCoverage]) -> Self {
        let mut index = Self::default();
        for (i, file) in files.iter().enumerate() {
            index.insert(i, file);
        }
        index
    }

    /// Register `file` at position `i`. Earlier registrations win.
    pub(crate) fn insert(&mut self, i: usize, file: &FileCoverage) {
        self.by_path
            .entry(file.effective_path().to_string())
            .or_insert(i);
        self.by_raw.entry(file.file.clone()).or_insert(i);
    }

    pub(crate) fn lookup(&self, file: &FileCoverage) -> Option<usize> {
        let keys = [file.effective_path(), file.file.as_str()];
        keys.iter()
            .find_map(|k| self.by_path.get(*k))
            .or_else(|| keys.iter().find_map(|k| self.by_raw.get(*k)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::CoverageType;

    fn coverage_of(paths: &[&str]) -> Coverage {
        let mut coverage = Coverage::new(CoverageType::Loc, "test");
        coverage.files = paths.iter().map(|p| FileCoverage::new(*p)).collect();
        coverage
    }

    #[test]
    fn test_suffix_match() {
        let a = segments("src/utils/groups.ts");
        let b = segments("/repo/internal/frontend/src/utils/groups.ts");
        assert_eq!(suffix_match(&a, &b), Some(3));
        assert_eq!(suffix_match(&b, &a), Some(3));

        // Partial suffix on the shorter side is not a match.
        let c = segments("lib/utils/groups.ts");
        assert_eq!(suffix_match(&a, &c), None);
        // Raw string suffixes do not count.
        assert_eq!(suffix_match(&segments("xgroups.ts"), &segments("groups.ts")), None);
    }

    #[test]
    fn test_segments_ignore_separators_and_dots() {
        assert_eq!(segments("./src//a.rs"), vec!["src", "a.rs"]);
        assert_eq!(segments(r"src\win\a.rs"), vec!["src", "win", "a.rs"]);
    }

    #[test]
    fn test_normalize_module_path() {
        let root = PathBuf::from("/work/myrepo");
        let known = vec![root.join("cmd/root.go"), root.join("main.go")];
        let mut coverage = coverage_of(&["github.com/k1LoW/myrepo/cmd/root.go", "github.com/other/x/y.go"]);

        let resolved = coverage.normalize_paths(&root, &known);

        assert_eq!(resolved, 1);
        assert_eq!(coverage.files[0].normalized_path, "cmd/root.go");
        assert_eq!(coverage.files[1].normalized_path, "");
        assert_eq!(coverage.files[1].effective_path(), "github.com/other/x/y.go");
    }

    #[test]
    fn test_normalize_tool_relative_and_absolute() {
        let root = PathBuf::from("/work/app");
        let known = vec![
            root.join("internal/frontend/src/utils/groups.ts"),
            root.join("src/lib.rs"),
        ];
        let mut coverage = coverage_of(&[
            "src/utils/groups.ts",
            "/work/app/src/lib.rs",
            "/ci/checkout/app/src/lib.rs",
        ]);

        coverage.normalize_paths(&root, &known);

        assert_eq!(coverage.files[0].normalized_path, "internal/frontend/src/utils/groups.ts");
        assert_eq!(coverage.files[1].normalized_path, "src/lib.rs");
        // Absolute paths outside the root still participate.
        assert_eq!(coverage.files[2].normalized_path, "src/lib.rs");
    }

    #[test]
    fn test_normalize_prefers_longest_then_shortest() {
        let root = PathBuf::from("/r");
        let known = vec![
            root.join("a/b/util.go"),
            root.join("pkg/util.go"),
            root.join("util.go"),
        ];
        let mut coverage = coverage_of(&["mod/pkg/util.go", "util.go"]);

        coverage.normalize_paths(&root, &known);

        assert_eq!(coverage.files[0].normalized_path, "pkg/util.go");
        assert_eq!(coverage.files[1].normalized_path, "util.go");
    }

    #[test]
    fn test_normalize_noop_without_listing() {
        let mut coverage = coverage_of(&["a.go"]);
        let empty: Vec<PathBuf> = Vec::new();
        assert_eq!(coverage.normalize_paths(Path::new("/r"), &empty), 0);
        assert_eq!(coverage.normalize_paths(Path::new(""), &[PathBuf::from("/r/a.go")]), 0);
        assert_eq!(coverage.files[0].normalized_path, "");
    }

    #[test]
    fn test_find_by_file_both_spellings() {
        let mut coverage = coverage_of(&["github.com/user/repo/cmd/main.go"]);
        coverage.files[0].normalized_path = "cmd/main.go".to_string();

        assert!(coverage.find_by_file("cmd/main.go").is_ok());
        assert!(coverage.find_by_file("github.com/user/repo/cmd/main.go").is_ok());
        let err = coverage.find_by_file("main.go").unwrap_err();
        assert!(matches!(err, CovrecError::NotFound(ref name) if name == "main.go"));
    }

    #[test]
    fn test_fuzzy_find_prefers_shortest() {
        let coverage = coverage_of(&[
            "/home/ci/project/vendor/lib/src/app.rs",
            "/home/ci/project/src/app.rs",
        ]);

        let found = coverage.fuzzy_find_by_file("src/app.rs").unwrap();
        assert_eq!(found.file, "/home/ci/project/src/app.rs");

        // A more specific query rules out the vendored copy.
        let found = coverage.fuzzy_find_by_file("project/src/app.rs").unwrap();
        assert_eq!(found.file, "/home/ci/project/src/app.rs");

        assert!(coverage.fuzzy_find_by_file("src/other.rs").is_err());
    }

    #[test]
    fn test_file_index_either_spelling() {
        let mut a = FileCoverage::new("github.com/user/repo/cmd/main.go");
        a.normalized_path = "cmd/main.go".to_string();
        let files = vec![a, FileCoverage::new("util.go")];
        let index = FileIndex::new(&files);

        assert_eq!(index.lookup(&FileCoverage::new("cmd/main.go")), Some(0));
        assert_eq!(index.lookup(&FileCoverage::new("github.com/user/repo/cmd/main.go")), Some(0));

        let mut other = FileCoverage::new("/abs/util.go");
        other.normalized_path = "util.go".to_string();
        assert_eq!(index.lookup(&other), Some(1));
        assert_eq!(index.lookup(&FileCoverage::new("nope.go")), None);
    }
}
