/// Parser for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// Each line describes a basic block with its column range, the number of
/// statements in it and how many times it ran. Blocks are kept as statement
/// spans; overlapping blocks and per-line counts are resolved downstream.
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};

use super::CoverageParser;
use crate::detect::Format;
use crate::model::*;

/// Go coverage profile parser.
pub struct GocoverParser;

impl CoverageParser for GocoverParser {
    fn format(&self) -> Format {
        Format::Gocover
    }

    fn can_parse(&self, path: &Path, content: &[u8]) -> bool {
        // Extension-based: .coverprofile or .gocov
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_lowercase();
            if ext == "coverprofile" || ext == "gocov" {
                return true;
            }
        }

        // Content-based: first line starts with "mode: ", or any line
        // matches the block pattern (file.go:N.N,N.N N N). The fallback
        // catches profiles without a mode header, as some merge tools
        // write them.
        let head = super::sniff_head(content);
        if let Some(first) = head.lines().next() {
            if first.starts_with("mode: ") {
                return true;
            }
        }

        head.lines().any(looks_like_go_block)
    }

    fn parse(&self, input: &[u8]) -> Result<Coverage> {
        parse(input)
    }
}

/// Parse a Go coverage profile from raw bytes.
pub fn parse(input: &[u8]) -> Result<Coverage> {
    // Collect blocks grouped by file path, preserving first-seen order.
    let mut coverage = Coverage::new(CoverageType::Statement, Format::Gocover.as_str());
    let mut file_index: HashMap<String, usize> = HashMap::new();

    for (n, raw_line) in input.lines().enumerate() {
        let raw_line = raw_line.context("Invalid UTF-8 in Go coverage data")?;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("mode:") {
            continue;
        }

        let Some((file, block)) = parse_block_line(line) else {
            tracing::debug!(line = n + 1, "skipping unrecognised Go coverage line");
            continue;
        };
        let i = *file_index.entry(file.to_string()).or_insert_with(|| {
            coverage.files.push(FileCoverage::new(file));
            coverage.files.len() - 1
        });
        coverage.files[i].push_block(block);
    }

    super::finish(coverage)
}

/// Quick heuristic: does this line look like a Go coverage block?
/// e.g. "github.com/user/repo/file.go:10.1,20.5 3 1"
fn looks_like_go_block(line: &str) -> bool {
    let Some(colon_pos) = line.rfind(".go:") else {
        return false;
    };
    let after = &line[colon_pos + 4..];
    after.contains(',') && after.split_whitespace().count() >= 2
}

/// Parse "<line>.<col>".
fn parse_position(pos: &str) -> Option<(u32, u32)> {
    let (line, col) = pos.split_once('.')?;
    Some((line.parse().ok()?, col.parse().ok()?))
}

/// Parse a single block line, returning (file_path, block).
///
/// Format: `<file>:<startLine>.<startCol>,<endLine>.<endCol> <numStmt> <count>`
fn parse_block_line(line: &str) -> Option<(&str, BlockCoverage)> {
    // Anchor on the last ".go:" to split the file path from the block range.
    // This naturally handles paths containing colons.
    let colon_pos = line.rfind(".go:")? + 3;

    let file = &line[..colon_pos];
    let rest = &line[colon_pos + 1..];

    let (range, tail) = rest.split_once(' ')?;
    let (start, end) = range.split_once(',')?;
    let (start_line, start_col) = parse_position(start)?;
    let (end_line, end_col) = parse_position(end)?;

    let mut parts = tail.split_whitespace();
    let num_stmt: u64 = parts.next()?.parse().ok()?;
    let count: u64 = parts.next()?.parse().ok()?;

    Some((
        file,
        BlockCoverage::statement(start_line, start_col, end_line, end_col, num_stmt, count),
    ))
}
