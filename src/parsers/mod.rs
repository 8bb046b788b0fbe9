pub mod cobertura;
pub mod gocover;
pub mod lcov;

use std::borrow::Cow;
use std::path::Path;

use anyhow::Result;

use crate::detect::Format;
use crate::model::Coverage;

/// Every format parser implements this trait.
pub trait CoverageParser {
    /// The format this parser handles.
    fn format(&self) -> Format;

    /// Whether this parser recognises the file, by name or by content.
    fn can_parse(&self, path: &Path, content: &[u8]) -> bool;

    /// Parse the input bytes into a validated, recomputed `Coverage`.
    fn parse(&self, input: &[u8]) -> Result<Coverage>;
}

/// The first few KB of a file, for content sniffing.
pub(crate) fn sniff_head(content: &[u8]) -> Cow<'_, str> {
    let head_len = content.len().min(4096);
    String::from_utf8_lossy(&content[..head_len])
}

/// Check the parser's output against the block invariants and derive the
/// totals, so nothing malformed reaches the engine.
pub(crate) fn finish(mut coverage: Coverage) -> Result<Coverage> {
    coverage.validate()?;
    coverage.recompute();
    Ok(coverage)
}
