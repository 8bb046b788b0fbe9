/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<absolute path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Only `DA` records feed the model; function and branch records
/// (FN, FNDA, BRDA, ...) and the summary counters are ignored since totals
/// are derived from the line data.
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};

use super::CoverageParser;
use crate::detect::Format;
use crate::model::*;

/// LCOV format parser.
pub struct LcovParser;

impl CoverageParser for LcovParser {
    fn format(&self) -> Format {
        Format::Lcov
    }

    fn can_parse(&self, path: &Path, content: &[u8]) -> bool {
        // Extension-based: .info or .lcov
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_lowercase();
            if ext == "info" || ext == "lcov" {
                return true;
            }
        }

        // Content-based: lines starting with SF: and DA:/FN:
        let head = super::sniff_head(content);
        let has_sf = head.lines().any(|l| l.starts_with("SF:"));
        let has_da_or_fn = head
            .lines()
            .any(|l| l.starts_with("DA:") || l.starts_with("FN:"));
        has_sf && has_da_or_fn
    }

    fn parse(&self, input: &[u8]) -> Result<Coverage> {
        parse(input)
    }
}

/// Parse LCOV format coverage data from raw bytes.
///
/// Records for the same `SF` (one per test name, for example) are folded
/// into a single file.
pub fn parse(input: &[u8]) -> Result<Coverage> {
    let mut coverage = Coverage::new(CoverageType::Loc, Format::Lcov.as_str());
    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<usize> = None;

    for raw_line in input.lines() {
        let raw_line = raw_line.context("Invalid UTF-8 in LCOV data")?;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            current = None;
            continue;
        }

        // Split on first ':'
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };

        match tag {
            "SF" => {
                let i = *file_index.entry(value.to_string()).or_insert_with(|| {
                    coverage.files.push(FileCoverage::new(value));
                    coverage.files.len() - 1
                });
                current = Some(i);
            }
            "DA" => {
                // DA:<line_number>,<execution_count>[,<checksum>]
                // Some instrumenters use negative counts (e.g., -1) to mark
                // non-instrumentable lines. Those are skipped entirely.
                let Some(i) = current else {
                    continue;
                };
                let mut parts = value.splitn(3, ',');
                let line_number = parts.next().and_then(|s| s.parse::<u32>().ok());
                let count = parts.next().and_then(|s| s.parse::<i64>().ok());
                if let (Some(line_number), Some(count)) = (line_number, count) {
                    if let Ok(count) = u64::try_from(count) {
                        coverage.files[i].push_block(BlockCoverage::loc(line_number, count));
                    }
                }
            }
            // TN, FN, FNDA, BRDA, LF, LH, ... carry nothing the model keeps.
            _ => {}
        }
    }

    super::finish(coverage)
}
