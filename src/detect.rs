/// Auto-detection of coverage file formats.
///
/// Strategy:
///   1. Ask each parser whether it recognises the file, by extension first
///      and then by peeking at the first bytes of the content
///   2. Fall back to CLI --format override (handled by caller)
use std::path::Path;

use crate::error::CovrecError;
use crate::parsers::cobertura::CoberturaParser;
use crate::parsers::gocover::GocoverParser;
use crate::parsers::lcov::LcovParser;
use crate::parsers::CoverageParser;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cobertura,
    Gocover,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Gocover => "gocover",
            Format::Lcov => "lcov",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovrecError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobertura" => Ok(Format::Cobertura),
            "gocover" | "go" => Ok(Format::Gocover),
            "lcov" => Ok(Format::Lcov),
            _ => Err(CovrecError::Parse(format!(
                "Unknown format: '{}'. Supported: cobertura, gocover, lcov",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static LCOV: LcovParser = LcovParser;
static COBERTURA: CoberturaParser = CoberturaParser;
static GOCOVER: GocoverParser = GocoverParser;

/// All parsers, in detection order. LCOV and Cobertura have the more
/// distinctive signatures, so they get the first look; the Go profile
/// heuristic is the loosest and goes last.
pub fn parsers() -> [&'static dyn CoverageParser; 3] {
    [&LCOV, &COBERTURA, &GOCOVER]
}

/// The parser for an explicitly named format.
pub fn parser_for(format: Format) -> &'static dyn CoverageParser {
    match format {
        Format::Cobertura => &COBERTURA,
        Format::Gocover => &GOCOVER,
        Format::Lcov => &LCOV,
    }
}

/// Detect the coverage format from filename and file content.
pub fn detect_parser(path: &Path, content: &[u8]) -> Option<&'static dyn CoverageParser> {
    parsers()
        .into_iter()
        .find(|parser| parser.can_parse(path, content))
}

/// Convenience wrapper returning just the detected format.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    detect_parser(path, content).map(|parser| parser.format())
}
