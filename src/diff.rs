//! Compare two coverage snapshots.
//!
//! The first tree is the current value (`a`), the second the baseline
//! (`b`), and every `diff` is `a - b`: positive means coverage went up.

use serde::Serialize;

use crate::model::{Coverage, FileCoverage};
use crate::paths::FileIndex;

/// Aggregate comparison plus one entry per file present on either side.
#[derive(Debug, Serialize)]
pub struct DiffCoverage<'a> {
    pub a: f64,
    pub b: f64,
    pub diff: f64,
    pub files: Vec<DiffFileCoverage<'a>>,
    #[serde(skip)]
    pub coverage_a: &'a Coverage,
    #[serde(skip)]
    pub coverage_b: &'a Coverage,
}

/// Per-file comparison. A side the file is missing from has percentage 0
/// and no back-reference.
#[derive(Debug, Serialize)]
pub struct DiffFileCoverage<'a> {
    pub file: String,
    pub a: f64,
    pub b: f64,
    pub diff: f64,
    #[serde(skip)]
    pub file_coverage_a: Option<&'a FileCoverage>,
    #[serde(skip)]
    pub file_coverage_b: Option<&'a FileCoverage>,
}

impl<'a> DiffFileCoverage<'a> {
    fn new(a: Option<&'a FileCoverage>, b: Option<&'a FileCoverage>) -> Self {
        let file = a
            .or(b)
            .map(|f| f.effective_path().to_string())
            .unwrap_or_default();
        let pa = a.map_or(0.0, FileCoverage::percent);
        let pb = b.map_or(0.0, FileCoverage::percent);
        Self {
            file,
            a: pa,
            b: pb,
            diff: pa - pb,
            file_coverage_a: a,
            file_coverage_b: b,
        }
    }

    /// Present in the current snapshot only.
    pub fn is_added(&self) -> bool {
        self.file_coverage_a.is_some() && self.file_coverage_b.is_none()
    }

    /// Present in the baseline only.
    pub fn is_removed(&self) -> bool {
        self.file_coverage_a.is_none() && self.file_coverage_b.is_some()
    }
}

impl<'a> DiffCoverage<'a> {
    /// Files whose coverage changed, worst regression first.
    pub fn changed_files(&self) -> Vec<&DiffFileCoverage<'a>> {
        let mut changed: Vec<_> = self.files.iter().filter(|f| f.diff != 0.0).collect();
        changed.sort_by(|x, y| x.diff.total_cmp(&y.diff));
        changed
    }
}

impl Coverage {
    /// Compare `self` (current) against `other` (baseline).
    ///
    /// Files are listed in `self`'s order followed by files only `other`
    /// has. Matching accepts either path spelling on either side.
    pub fn compare<'a>(&'a self, other: &'a Coverage) -> DiffCoverage<'a> {
        let a = self.percent();
        let b = other.percent();

        let index = FileIndex::new(&other.files);
        let mut seen = vec![false; other.files.len()];
        let mut files = Vec::with_capacity(self.files.len());

        for ours in &self.files {
            let theirs = index.lookup(ours).map(|i| {
                seen[i] = true;
                &other.files[i]
            });
            files.push(DiffFileCoverage::new(Some(ours), theirs));
        }
        for (theirs, _) in other.files.iter().zip(&seen).filter(|(_, hit)| !**hit) {
            files.push(DiffFileCoverage::new(None, Some(theirs)));
        }

        DiffCoverage {
            a,
            b,
            diff: a - b,
            files,
            coverage_a: self,
            coverage_b: other,
        }
    }
}
