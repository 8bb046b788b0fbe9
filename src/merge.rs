//! Combine coverage trees, e.g. shards of one test run or a LOC report and
//! a statement report for the same commit.

use crate::error::{CovrecError, Result};
use crate::model::{BlockType, Coverage, CoverageType};
use crate::paths::FileIndex;

impl Coverage {
    /// Merge `other` into `self`.
    ///
    /// Files are matched by identity and their blocks concatenated as-is;
    /// overlaps are resolved when totals are recomputed. Unmatched files are
    /// appended. Trees of different type, or a file that ends up holding
    /// both LOC and statement blocks, make the result `Merged`. Matched
    /// files are counted by reconciled lines from then on.
    ///
    /// A matched file whose blocks were stripped on either side has nothing
    /// to reconcile, so the merge fails with `StrippedMerge` and `self` is
    /// left untouched.
    pub fn merge(&mut self, other: &Coverage) -> Result<()> {
        let mut index = FileIndex::new(&self.files);
        for theirs in &other.files {
            if let Some(i) = index.lookup(theirs) {
                if self.files[i].is_stripped() || theirs.is_stripped() {
                    return Err(CovrecError::StrippedMerge(
                        self.files[i].effective_path().to_string(),
                    ));
                }
            }
        }

        if self.files.is_empty() {
            self.kind = other.kind;
            self.format = other.format.clone();
        } else if !other.files.is_empty() {
            if self.kind != other.kind {
                self.kind = CoverageType::Merged;
            }
            self.merge_format(&other.format);
        }

        let mut matched = 0;
        for theirs in &other.files {
            match index.lookup(theirs) {
                Some(i) => {
                    let ours = &mut self.files[i];
                    ours.extend_blocks(theirs.blocks().iter().cloned());
                    ours.mark_merged();
                    if ours.normalized_path.is_empty() {
                        ours.normalized_path = theirs.normalized_path.clone();
                    }
                    if has_mixed_blocks(ours.blocks().iter().map(|b| b.kind)) {
                        self.kind = CoverageType::Merged;
                    }
                    matched += 1;
                }
                None => {
                    index.insert(self.files.len(), theirs);
                    self.files.push(theirs.clone());
                }
            }
        }

        self.recompute();
        tracing::debug!(
            matched,
            added = other.files.len() - matched,
            kind = %self.kind,
            total = self.total,
            covered = self.covered,
            "merged coverage"
        );
        Ok(())
    }

    fn merge_format(&mut self, format: &str) {
        for name in format.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if self.format.split(',').any(|existing| existing.trim() == name) {
                continue;
            }
            if !self.format.is_empty() {
                self.format.push(',');
            }
            self.format.push_str(name);
        }
    }
}

fn has_mixed_blocks(mut kinds: impl Iterator<Item = BlockType>) -> bool {
    match kinds.next() {
        Some(first) => kinds.any(|k| k != first),
        None => false,
    }
}

/// Fold any number of trees into one.
pub fn merge_all<'a>(reports: impl IntoIterator<Item = &'a Coverage>) -> Result<Coverage> {
    let mut merged = Coverage::default();
    for report in reports {
        merged.merge(report)?;
    }
    Ok(merged)
}
