//! Reduce overlapping coverage spans to one count per source line.
//!
//! Each line keeps an ordered accumulator of `position -> count`. A position
//! that no block recorded inherits the count of the closest recorded
//! position before it. Two sentinels bound every non-empty line, `START_POS`
//! for the part before the first column any block mentioned and `END_POS`
//! for the tail. Whole-line contributions raise every position; partial
//! contributions first pin their column boundaries at the ambient count so
//! that columns outside the span keep the background established by earlier
//! blocks. Spans include both their start and end column.

use std::collections::BTreeMap;

use crate::model::{
    BlockCoverage, BlockType, Coverage, CoverageType, FileCoverage, LineCoverage, PosCoverage,
    END_POS, START_POS,
};

type PosCounts = BTreeMap<i32, u64>;

/// Reconcile `blocks` into one `LineCoverage` per touched line, sorted by
/// line number.
pub fn to_line_coverages(blocks: &[BlockCoverage]) -> Vec<LineCoverage> {
    let mut lines: BTreeMap<u32, PosCounts> = BTreeMap::new();
    for block in blocks {
        for line in block.start_line..=block.end_line {
            fold(lines.entry(line).or_default(), block, line);
        }
    }
    lines
        .into_iter()
        .map(|(line, counts)| line_coverage(line, &counts))
        .collect()
}

/// Apply one block's contribution to the accumulator of `line`.
fn fold(counts: &mut PosCounts, block: &BlockCoverage, line: u32) {
    let count = block.count;

    let whole_line = block.kind == BlockType::Loc
        || (block.start_line < line && line < block.end_line);
    if whole_line {
        for value in counts.values_mut() {
            *value = value.saturating_add(count);
        }
        counts.entry(START_POS).or_insert(count);
        counts.entry(END_POS).or_insert(count);
        return;
    }

    let start = block.start_col.map_or(START_POS, col_pos);
    let end = block.end_col.map_or(END_POS, col_pos);
    seed(counts);

    if line == block.start_line && line == block.end_line {
        let start_count = ambient(counts, start);
        let end_count = ambient(counts, end);
        counts.entry(start).or_insert(start_count);
        counts.entry(end).or_insert(end_count);
        // Unvalidated input may still put the end before the start.
        if start <= end {
            add(counts.range_mut(start..=end), count);
        }
    } else if line == block.start_line {
        pin(counts, start);
        add(counts.range_mut(start..), count);
    } else {
        pin(counts, end);
        add(counts.range_mut(..=end), count);
    }
}

fn add<'a>(values: impl Iterator<Item = (&'a i32, &'a mut u64)>, count: u64) {
    for (_, value) in values {
        *value = value.saturating_add(count);
    }
}

/// Give an untouched line an uncovered background.
fn seed(counts: &mut PosCounts) {
    if counts.is_empty() {
        counts.insert(START_POS, 0);
        counts.insert(END_POS, 0);
    }
}

/// Record `pos` explicitly, inheriting the count already in effect there.
fn pin(counts: &mut PosCounts, pos: i32) {
    let value = ambient(counts, pos);
    counts.entry(pos).or_insert(value);
}

/// Count in effect at `pos`: the value of the closest recorded position at
/// or before it.
fn ambient(counts: &PosCounts, pos: i32) -> u64 {
    counts
        .range(..=pos)
        .next_back()
        .map_or(0, |(_, value)| *value)
}

/// Columns are clamped below `END_POS` so they never collide with it.
fn col_pos(col: u32) -> i32 {
    i32::try_from(col).map_or(END_POS - 1, |c| c.min(END_POS - 1))
}

fn line_coverage(line: u32, counts: &PosCounts) -> LineCoverage {
    LineCoverage {
        line,
        count: counts.values().copied().max().unwrap_or(0),
        pos_coverages: counts
            .iter()
            .map(|(&pos, &count)| PosCoverage { pos, count })
            .collect(),
    }
}

/// Statement totals weighted by `num_stmt`, for one unmerged report.
fn statement_totals(blocks: &[BlockCoverage]) -> (u64, u64) {
    blocks.iter().fold((0u64, 0u64), |(total, covered), block| {
        let num_stmt = block.num_stmt.unwrap_or(0);
        let covered = if block.count > 0 {
            covered.saturating_add(num_stmt)
        } else {
            covered
        };
        (total.saturating_add(num_stmt), covered)
    })
}

impl FileCoverage {
    /// Reconciled coverage for every line any block touches.
    pub fn to_line_coverages(&self) -> Vec<LineCoverage> {
        to_line_coverages(self.blocks())
    }

    /// Reconciled coverage for a single line, using only the blocks that
    /// touch it. `None` if no block does.
    pub fn find_line_coverage(&self, line: u32) -> Option<LineCoverage> {
        let mut counts = PosCounts::new();
        let mut touched = false;
        for block in self.blocks_on_line(line) {
            fold(&mut counts, block, line);
            touched = true;
        }
        touched.then(|| line_coverage(line, &counts))
    }

    /// Recompute `total`/`covered` from the blocks.
    ///
    /// Statement data from a single report is counted by statements. A file
    /// that took part in a merge, or holds any LOC block, is counted by
    /// reconciled lines. A file whose blocks were stripped keeps its
    /// finalized totals.
    pub fn recompute(&mut self, kind: CoverageType) {
        if self.blocks().is_empty() {
            return;
        }
        let statements_only = kind == CoverageType::Statement
            && !self.is_merged()
            && self.blocks().iter().all(|b| b.kind == BlockType::Statement);
        let (total, covered) = if statements_only {
            statement_totals(self.blocks())
        } else {
            let lines = self.to_line_coverages();
            let covered = lines.iter().filter(|l| l.is_covered()).count();
            (lines.len() as u64, covered as u64)
        };
        self.total = total;
        self.covered = covered;
    }
}

impl Coverage {
    /// Recompute every file and the aggregate. Must follow any change to
    /// blocks before the tree is read.
    pub fn recompute(&mut self) {
        let kind = self.kind;
        let (mut total, mut covered) = (0u64, 0u64);
        for file in &mut self.files {
            file.recompute(kind);
            total = total.saturating_add(file.total);
            covered = covered.saturating_add(file.covered);
        }
        self.total = total;
        self.covered = covered;
    }
}
