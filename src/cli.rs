//! Command handler functions for the covrec CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::load::{load_report, write_json};
use crate::merge::merge_all;
use crate::model::{Coverage, CoverageType, PosCoverage, END_POS, START_POS};

/// Directories never worth descending into when listing a project.
const SKIP_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// How reports are read before a command sees them.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Format override applied to every report.
    pub format: Option<String>,
    /// Project root used to normalize file paths.
    pub root: Option<PathBuf>,
    /// Exclude patterns applied after merging.
    pub exclude: Vec<String>,
}

/// Load every report, normalize paths against the project root if one is
/// given, merge them in order and apply the exclude patterns.
pub fn load_merged(reports: &[PathBuf], opts: &LoadOptions) -> Result<Coverage> {
    let project = match &opts.root {
        Some(root) => {
            let root = root
                .canonicalize()
                .with_context(|| format!("Invalid project root {}", root.display()))?;
            let files = walk_files(&root)?;
            tracing::debug!(root = %root.display(), files = files.len(), "listed project files");
            Some((root, files))
        }
        None => None,
    };

    let mut loaded = Vec::with_capacity(reports.len());
    for path in reports {
        let mut coverage = load_report(path, opts.format.as_deref())?;
        if let Some((root, files)) = &project {
            coverage.normalize_paths(root, files);
        }
        loaded.push(coverage);
    }

    let mut merged = merge_all(&loaded)?;
    merged.exclude(&opts.exclude)?;
    Ok(merged)
}

/// Every regular file under `root`, sorted.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries =
            std::fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                let skip = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIP_DIRS.contains(&name));
                if !skip {
                    pending.push(path);
                }
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn unit_label(kind: CoverageType) -> &'static str {
    match kind {
        CoverageType::Statement => "Statements",
        CoverageType::Loc | CoverageType::Merged => "Lines",
    }
}

pub fn cmd_summary(coverage: &Coverage) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "Type:       {}", coverage.kind)?;
    writeln!(out, "Format:     {}", coverage.format)?;
    writeln!(out, "Files:      {}", coverage.files.len())?;
    writeln!(
        out,
        "{:<12}{}/{} ({:.1}%)",
        format!("{}:", unit_label(coverage.kind)),
        coverage.covered,
        coverage.total,
        coverage.percent()
    )?;
    Ok(out)
}

pub fn cmd_files(coverage: &Coverage, sort_by_coverage: bool) -> Result<String> {
    let mut files: Vec<_> = coverage.files.iter().collect();

    if sort_by_coverage {
        files.sort_by(|a, b| a.percent().total_cmp(&b.percent()));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "TOTAL", "COVERED", "RATE"
    )?;
    writeln!(out, "{}", "-".repeat(88))?;

    for f in files {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}%",
            f.effective_path(),
            f.total,
            f.covered,
            f.percent()
        )?;
    }

    Ok(out)
}

pub fn cmd_lines(coverage: &Coverage, source_file: &str) -> Result<String> {
    let file = coverage.fuzzy_find_by_file(source_file)?;
    let lines = file.to_line_coverages();

    if lines.is_empty() {
        return Ok(format!("No line data for '{}'\n", file.effective_path()));
    }

    let mut out = String::new();
    writeln!(out, "{}", file.effective_path())?;
    writeln!(out, "{:>6}  {:>10}", "LINE", "HITS")?;
    writeln!(out, "{}", "-".repeat(18))?;
    for line in &lines {
        let marker = if line.is_covered() { "✓" } else { "✗" };
        write!(out, "{:>6}  {:>10}  {}", line.line, line.count, marker)?;
        // Whole-line data only carries the two sentinels.
        if line.pos_coverages.len() > 2 {
            write!(out, "  {}", format_positions(&line.pos_coverages))?;
        }
        writeln!(out)?;
    }

    let uncovered: Vec<u32> = lines
        .iter()
        .filter(|l| !l.is_covered())
        .map(|l| l.line)
        .collect();
    if !uncovered.is_empty() {
        writeln!(
            out,
            "Uncovered: {} ({} lines)",
            format_line_ranges(&uncovered),
            uncovered.len()
        )?;
    }
    Ok(out)
}

pub fn cmd_merge(coverage: &Coverage, strip_blocks: bool) -> Result<String> {
    let mut buf = Vec::new();
    if strip_blocks {
        let mut stripped = coverage.clone();
        stripped.strip_blocks();
        write_json(&mut buf, &stripped)?;
    } else {
        write_json(&mut buf, coverage)?;
    }
    let mut out = String::from_utf8(buf).context("Serialized coverage is not UTF-8")?;
    out.push('\n');
    Ok(out)
}

pub fn cmd_diff(current: &Coverage, baseline: &Coverage, json: bool) -> Result<String> {
    let diff = current.compare(baseline);

    if json {
        let mut out = serde_json::to_string_pretty(&diff)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(
        out,
        "Coverage: {:.1}% (baseline {:.1}%, {:+.1}%)",
        diff.a, diff.b, diff.diff
    )?;

    let changed = diff.changed_files();
    if changed.is_empty() {
        writeln!(out, "No per-file changes.")?;
        return Ok(out);
    }

    writeln!(out)?;
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "CURRENT", "BASELINE", "DIFF"
    )?;
    writeln!(out, "{}", "-".repeat(88))?;
    for f in changed {
        let note = if f.is_added() {
            "  (new)"
        } else if f.is_removed() {
            "  (removed)"
        } else {
            ""
        };
        writeln!(
            out,
            "{:<60} {:>7.1}% {:>7.1}% {:>+7.1}%{}",
            f.file, f.a, f.b, f.diff, note
        )?;
    }
    Ok(out)
}

/// Render the recorded positions of a line as `col:count`, with `^` and `$`
/// standing for the line's start and end.
fn format_positions(positions: &[PosCoverage]) -> String {
    positions
        .iter()
        .map(|p| match p.pos {
            START_POS => format!("^:{}", p.count),
            END_POS => format!("$:{}", p.count),
            pos => format!("{}:{}", pos, p.count),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Group sorted line numbers into ranges: `3-4, 7, 9-12`.
fn format_line_ranges(lines: &[u32]) -> String {
    let mut ranges: Vec<String> = Vec::new();
    let mut iter = lines.iter().copied();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut end) = (first, first);

    let mut flush = |s: u32, e: u32| {
        if s == e {
            ranges.push(s.to_string());
        } else {
            ranges.push(format!("{}-{}", s, e));
        }
    };
    for line in iter {
        if line == end + 1 {
            end = line;
        } else {
            flush(start, end);
            start = line;
            end = line;
        }
    }
    flush(start, end);

    ranges.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockCoverage, FileCoverage};

    /// Two LOC files, 4 of 6 lines covered.
    fn sample() -> Coverage {
        let mut coverage = Coverage::new(CoverageType::Loc, "lcov");
        coverage.files = vec![
            FileCoverage::with_blocks(
                "src/main.rs",
                vec![
                    BlockCoverage::loc(1, 5),
                    BlockCoverage::loc(2, 3),
                    BlockCoverage::loc(3, 0),
                    BlockCoverage::loc(4, 0),
                ],
            ),
            FileCoverage::with_blocks(
                "src/lib.rs",
                vec![BlockCoverage::loc(1, 10), BlockCoverage::loc(2, 10)],
            ),
        ];
        coverage.recompute();
        coverage
    }

    #[test]
    fn test_cmd_summary() {
        let out = cmd_summary(&sample()).unwrap();

        assert!(out.contains("Type:       loc"));
        assert!(out.contains("Files:      2"));
        assert!(out.contains("Lines:      4/6"));
        assert!(out.contains("66.7%"));
    }

    #[test]
    fn test_cmd_summary_statement() {
        let mut coverage = Coverage::new(CoverageType::Statement, "gocover");
        coverage.files.push(FileCoverage::with_blocks(
            "a.go",
            vec![BlockCoverage::statement(1, 1, 3, 2, 4, 1)],
        ));
        coverage.recompute();

        let out = cmd_summary(&coverage).unwrap();
        assert!(out.contains("Statements: 4/4 (100.0%)"), "{out}");
    }

    #[test]
    fn test_cmd_files() {
        let out = cmd_files(&sample(), false).unwrap();

        assert!(out.contains("src/main.rs"));
        assert!(out.contains("src/lib.rs"));
        assert!(out.contains("100.0%"));
        assert!(out.contains("50.0%"));
    }

    #[test]
    fn test_cmd_files_sorted_by_coverage() {
        let out = cmd_files(&sample(), true).unwrap();

        // Ascending by coverage: src/main.rs (50%) before src/lib.rs (100%).
        let main_pos = out.find("src/main.rs").unwrap();
        let lib_pos = out.find("src/lib.rs").unwrap();
        assert!(main_pos < lib_pos);
    }

    #[test]
    fn test_cmd_lines() {
        let out = cmd_lines(&sample(), "src/main.rs").unwrap();

        assert!(out.contains("LINE"));
        assert!(out.contains("HITS"));
        assert!(out.contains("✓"));
        assert!(out.contains("✗"));
        assert!(out.contains("Uncovered: 3-4 (2 lines)"));
    }

    #[test]
    fn test_cmd_lines_fuzzy_lookup() {
        let out = cmd_lines(&sample(), "project/src/lib.rs").unwrap();
        assert!(out.starts_with("src/lib.rs\n"));
        assert!(!out.contains("Uncovered"));
    }

    #[test]
    fn test_cmd_lines_positions() {
        let mut coverage = Coverage::new(CoverageType::Statement, "gocover");
        coverage.files.push(FileCoverage::with_blocks(
            "a.go",
            vec![BlockCoverage::statement(9, 2, 9, 12, 1, 1)],
        ));
        coverage.recompute();

        let out = cmd_lines(&coverage, "a.go").unwrap();
        // Both the start and the end column of the span ran.
        assert!(out.contains("^:0 2:1 12:1 $:0"), "{out}");
    }

    #[test]
    fn test_cmd_lines_not_found() {
        let result = cmd_lines(&sample(), "nonexistent.rs");
        assert!(result.is_err());
    }

    #[test]
    fn test_cmd_merge_strip_blocks() {
        let out = cmd_merge(&sample(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["type"], "loc");
        assert_eq!(value["total"], 6);
        assert!(value["files"][0].get("blocks").is_none());

        let full = cmd_merge(&sample(), false).unwrap();
        assert!(full.contains("\"blocks\""));
    }

    #[test]
    fn test_cmd_diff_text() {
        let current = sample();
        let mut baseline = sample();
        baseline.files[0].set_blocks(vec![
            BlockCoverage::loc(1, 1),
            BlockCoverage::loc(2, 0),
            BlockCoverage::loc(3, 0),
            BlockCoverage::loc(4, 0),
        ]);
        baseline.recompute();

        let out = cmd_diff(&current, &baseline, false).unwrap();

        assert!(out.contains("Coverage: 66.7% (baseline 50.0%, +16.7%)"), "{out}");
        assert!(out.contains("src/main.rs"));
        assert!(out.contains("+25.0%"));
        assert!(!out.contains("src/lib.rs"));
    }

    #[test]
    fn test_cmd_diff_no_changes() {
        let out = cmd_diff(&sample(), &sample(), false).unwrap();
        assert!(out.contains("No per-file changes."));
    }

    #[test]
    fn test_cmd_diff_json() {
        let current = sample();
        let out = cmd_diff(&current, &Coverage::default(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["b"], 0.0);
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[3, 4, 7, 9, 10, 11, 12]), "3-4, 7, 9-12");
        assert_eq!(format_line_ranges(&[5]), "5");
        assert_eq!(format_line_ranges(&[]), "");
    }

    #[test]
    fn test_walk_files_skips_vendor_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/lib.rs"), "").unwrap();
        std::fs::write(root.join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(root.join("target/debug/out.rs"), "").unwrap();
        std::fs::write(root.join(".git/HEAD"), "").unwrap();

        let files = walk_files(root).unwrap();

        assert_eq!(
            files,
            vec![root.join("src/lib.rs"), root.join("src/nested/mod.rs")]
        );
    }

    #[test]
    fn test_load_merged_normalizes_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("cmd")).unwrap();
        std::fs::create_dir_all(root.join("internal")).unwrap();
        std::fs::write(root.join("cmd/root.go"), "").unwrap();
        std::fs::write(root.join("internal/gen.go"), "").unwrap();

        let gocover = root.join("coverage.out");
        std::fs::write(
            &gocover,
            "mode: set\n\
             github.com/k1LoW/myrepo/cmd/root.go:1.1,3.2 2 1\n\
             github.com/k1LoW/myrepo/internal/gen.go:1.1,2.2 1 0\n",
        )
        .unwrap();
        let lcov = root.join("lcov.info");
        std::fs::write(&lcov, "SF:cmd/root.go\nDA:5,1\nDA:6,0\nend_of_record\n").unwrap();

        let opts = LoadOptions {
            format: None,
            root: Some(root.to_path_buf()),
            exclude: vec!["internal/*.go".to_string()],
        };
        let coverage = load_merged(&[gocover, lcov], &opts).unwrap();

        assert_eq!(coverage.kind, CoverageType::Merged);
        assert_eq!(coverage.format, "gocover,lcov");
        assert_eq!(coverage.files.len(), 1);
        assert_eq!(coverage.files[0].effective_path(), "cmd/root.go");
        // Lines 1-3 from the statement block plus lines 5-6.
        assert_eq!((coverage.total, coverage.covered), (5, 4));
    }
}
