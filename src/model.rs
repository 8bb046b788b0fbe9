//! Canonical representation of coverage data, independent of any specific
//! format. Parsers produce a `Coverage` tree; everything downstream (merge,
//! diff, exclude, rendering) works on this model.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CovrecError, Result};

/// Sentinel position: the count applies from the beginning of the line.
pub const START_POS: i32 = -1;
/// Sentinel position: the count applies through the end of the line.
pub const END_POS: i32 = 99999;

/// Compute a coverage percentage, returning 0.0 when the total is zero.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Granularity of a whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageType {
    /// Whole-line hit counts.
    #[default]
    Loc,
    /// Column-range statements, weighted by statement count.
    Statement,
    /// Reports of different granularity combined; accounted per line.
    Merged,
}

impl CoverageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::Loc => "loc",
            CoverageType::Statement => "statement",
            CoverageType::Merged => "merged",
        }
    }
}

impl std::fmt::Display for CoverageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granularity of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Loc,
    Statement,
}

/// One coverage span as reported by a tool.
///
/// Statement blocks cover `(start_line, start_col)` through
/// `(end_line, end_col)`, both ends included, and carry `num_stmt`.
/// LOC blocks carry none of the optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCoverage {
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub start_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_col: Option<u32>,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_col: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_stmt: Option<u64>,
    pub count: u64,
}

impl BlockCoverage {
    /// A whole-line block.
    pub fn loc(line: u32, count: u64) -> Self {
        Self {
            kind: BlockType::Loc,
            start_line: line,
            start_col: None,
            end_line: line,
            end_col: None,
            num_stmt: None,
            count,
        }
    }

    /// A statement block spanning `(start_line, start_col)..=(end_line, end_col)`.
    pub fn statement(
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
        num_stmt: u64,
        count: u64,
    ) -> Self {
        Self {
            kind: BlockType::Statement,
            start_line,
            start_col: Some(start_col),
            end_line,
            end_col: Some(end_col),
            num_stmt: Some(num_stmt),
            count,
        }
    }

    /// Check that the optional fields match the block type and that the
    /// span is not inverted. Returns a human-readable reason on failure.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.end_line < self.start_line {
            return Err(format!(
                "end line {} precedes start line {}",
                self.end_line, self.start_line
            ));
        }
        match self.kind {
            BlockType::Loc => {
                if self.start_col.is_some() || self.end_col.is_some() || self.num_stmt.is_some() {
                    return Err(format!(
                        "loc block at line {} carries statement fields",
                        self.start_line
                    ));
                }
            }
            BlockType::Statement => {
                let (Some(start_col), Some(end_col), Some(_)) =
                    (self.start_col, self.end_col, self.num_stmt)
                else {
                    return Err(format!(
                        "statement block at line {} is missing columns or statement count",
                        self.start_line
                    ));
                };
                if self.start_line == self.end_line && end_col < start_col {
                    return Err(format!(
                        "statement block at line {} ends at column {} before it starts at {}",
                        self.start_line, end_col, start_col
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Coverage for a single source file.
///
/// `blocks` is the source of truth and is only reachable through accessors
/// so that the per-line index is dropped whenever it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Path exactly as the producing tool wrote it.
    pub file: String,
    /// Project-root-relative path, empty until resolved.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub normalized_path: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub covered: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<BlockCoverage>,
    /// Set once blocks from another report were folded in.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    merged: bool,
    #[serde(skip)]
    line_index: OnceCell<BTreeMap<u32, Vec<usize>>>,
}

impl FileCoverage {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn with_blocks(file: impl Into<String>, blocks: Vec<BlockCoverage>) -> Self {
        Self {
            file: file.into(),
            blocks,
            ..Default::default()
        }
    }

    /// The identity used to match this file across reports.
    pub fn effective_path(&self) -> &str {
        if self.normalized_path.is_empty() {
            &self.file
        } else {
            &self.normalized_path
        }
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        percent(self.covered, self.total)
    }

    pub fn blocks(&self) -> &[BlockCoverage] {
        &self.blocks
    }

    pub fn push_block(&mut self, block: BlockCoverage) {
        self.blocks.push(block);
        self.line_index.take();
    }

    pub fn extend_blocks(&mut self, blocks: impl IntoIterator<Item = BlockCoverage>) {
        self.blocks.extend(blocks);
        self.line_index.take();
    }

    pub fn set_blocks(&mut self, blocks: Vec<BlockCoverage>) {
        self.blocks = blocks;
        self.line_index.take();
    }

    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub(crate) fn mark_merged(&mut self) {
        self.merged = true;
    }

    /// True when the raw spans were dropped but totals remain.
    pub fn is_stripped(&self) -> bool {
        self.blocks.is_empty() && self.total > 0
    }

    /// Drop the raw spans, keeping the finalized totals.
    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
        self.line_index.take();
    }

    /// Blocks touching `line`, in insertion order.
    pub fn blocks_on_line(&self, line: u32) -> impl Iterator<Item = &BlockCoverage> + '_ {
        self.line_index()
            .get(&line)
            .into_iter()
            .flatten()
            .map(|&i| &self.blocks[i])
    }

    fn line_index(&self) -> &BTreeMap<u32, Vec<usize>> {
        self.line_index.get_or_init(|| {
            let mut index: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (i, block) in self.blocks.iter().enumerate() {
                for line in block.start_line..=block.end_line {
                    index.entry(line).or_default().push(i);
                }
            }
            index
        })
    }

    /// Validate every block; the first inconsistent one is reported.
    pub fn validate(&self) -> Result<()> {
        for block in &self.blocks {
            block
                .check()
                .map_err(|reason| CovrecError::InconsistentBlock {
                    file: self.file.clone(),
                    reason,
                })?;
        }
        Ok(())
    }
}

/// One report, or the aggregate of several merged reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(rename = "type")]
    pub kind: CoverageType,
    /// Name of the producing tool(s). Informational only.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub covered: u64,
    #[serde(default)]
    pub files: Vec<FileCoverage>,
}

impl Coverage {
    pub fn new(kind: CoverageType, format: impl Into<String>) -> Self {
        Self {
            kind,
            format: format.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        percent(self.covered, self.total)
    }

    pub fn validate(&self) -> Result<()> {
        self.files.iter().try_for_each(FileCoverage::validate)
    }

    /// Remove raw spans from every file to shrink a serialized tree.
    /// Totals must already be final.
    pub fn strip_blocks(&mut self) {
        for file in &mut self.files {
            file.clear_blocks();
        }
    }
}

/// One reconciled source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineCoverage {
    pub line: u32,
    /// Highest count over the line's positions; covered iff non-zero.
    pub count: u64,
    pub pos_coverages: Vec<PosCoverage>,
}

impl LineCoverage {
    pub fn is_covered(&self) -> bool {
        self.count > 0
    }
}

/// Count recorded at `pos`; later columns inherit it until the next
/// recorded position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PosCoverage {
    pub pos: i32,
    pub count: u64,
}
