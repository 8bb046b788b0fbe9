use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::{detect_parser, parser_for, Format};
use crate::error::CovrecError;
use crate::model::Coverage;

/// Read a coverage file and turn it into a `Coverage` tree.
///
/// A previously written covrec JSON tree is recognised first. Otherwise the
/// format comes from the override, or is detected from the file name and
/// content.
pub fn load_report(path: &Path, format_override: Option<&str>) -> Result<Coverage> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if format_override.is_none() && looks_like_tree(&content) {
        let coverage = read_json(content.as_slice())
            .with_context(|| format!("Failed to load coverage tree {}", path.display()))?;
        tracing::info!(path = %path.display(), files = coverage.files.len(), "loaded coverage tree");
        return Ok(coverage);
    }

    let parser = match format_override {
        Some(name) => parser_for(name.parse::<Format>()?),
        None => detect_parser(path, &content)
            .ok_or(CovrecError::UnknownFormat)
            .with_context(|| format!("Could not detect the format of {}", path.display()))?,
    };

    let coverage = parser
        .parse(&content)
        .with_context(|| format!("Failed to parse {} as {}", path.display(), parser.format()))?;

    tracing::info!(
        path = %path.display(),
        format = %parser.format(),
        files = coverage.files.len(),
        total = coverage.total,
        covered = coverage.covered,
        "loaded report"
    );
    Ok(coverage)
}

/// A serialized tree is a JSON object carrying both `format` and `files`.
fn looks_like_tree(content: &[u8]) -> bool {
    let head = crate::parsers::sniff_head(content);
    if !head.trim_start().starts_with('{') {
        return false;
    }
    match serde_json::from_slice::<serde_json::Value>(content) {
        Ok(serde_json::Value::Object(map)) => map.contains_key("format") && map.contains_key("files"),
        _ => false,
    }
}

/// Deserialize a tree and rebuild its totals. Files whose blocks were
/// stripped keep the totals they were written with.
pub fn read_json<R: Read>(reader: R) -> crate::error::Result<Coverage> {
    let mut coverage: Coverage = serde_json::from_reader(reader)?;
    coverage.validate()?;
    coverage.recompute();
    Ok(coverage)
}

/// Serialize a tree as pretty-printed JSON. Failures of the underlying
/// writer surface as `CovrecError::Io`.
pub fn write_json<W: Write>(mut writer: W, coverage: &Coverage) -> crate::error::Result<()> {
    serde_json::to_writer_pretty(&mut writer, coverage).map_err(|e| {
        if e.is_io() {
            CovrecError::Io(e.into())
        } else {
            CovrecError::Json(e)
        }
    })?;
    writer.flush()?;
    Ok(())
}
