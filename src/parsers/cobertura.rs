/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"/>
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Only line hits are kept. Branch and method detail is dropped.
use std::collections::HashMap;
use std::path::Path;
use std::str;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::CoverageParser;
use crate::detect::Format;
use crate::model::*;

/// Cobertura XML parser.
pub struct CoberturaParser;

impl CoverageParser for CoberturaParser {
    fn format(&self) -> Format {
        Format::Cobertura
    }

    fn can_parse(&self, _path: &Path, content: &[u8]) -> bool {
        // A .xml extension alone says nothing; JaCoCo and friends use it
        // too, so the root element decides.
        let head = super::sniff_head(content);
        (head.contains("<?xml") || head.trim_start().starts_with('<')) && head.contains("<coverage")
    }

    fn parse(&self, input: &[u8]) -> Result<Coverage> {
        parse(input)
    }
}

/// Hits collected for one source file, in first-seen line order.
#[derive(Default)]
struct FileLines {
    hits: Vec<(u32, u64)>,
    index: HashMap<u32, usize>,
}

impl FileLines {
    /// Lines may appear under both `<method><lines>` and `<class><lines>`,
    /// or in several classes sharing one file. Keep the highest count.
    fn record(&mut self, line: u32, hits: u64) {
        match self.index.get(&line) {
            Some(&i) => self.hits[i].1 = self.hits[i].1.max(hits),
            None => {
                self.index.insert(line, self.hits.len());
                self.hits.push((line, hits));
            }
        }
    }
}

/// Parse a Cobertura report from raw bytes.
pub fn parse(input: &[u8]) -> Result<Coverage> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut files: Vec<(String, FileLines)> = Vec::new();
    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<usize> = None;

    // Source prefix from <source> elements
    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed Cobertura XML at byte {}", reader.buffer_position()))?;
        let is_start_event = matches!(&event, Event::Start(_));
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"source" => {
                    // A self-closing <source/> has no text and no End
                    // event, so only a real start opens the text capture.
                    if is_start_event {
                        in_source = true;
                    }
                }
                b"class" => {
                    let attrs = attr_map(e);
                    current = attrs.get("filename").map(|filename| {
                        let path = resolve_source_path(filename, &sources);
                        *file_index.entry(path.clone()).or_insert_with(|| {
                            files.push((path, FileLines::default()));
                            files.len() - 1
                        })
                    });
                }
                b"line" => {
                    let attrs = attr_map(e);
                    let line = attrs.get("number").and_then(|n| n.parse::<u32>().ok());
                    let hits = attrs
                        .get("hits")
                        .and_then(|h| h.parse::<u64>().ok())
                        .unwrap_or(0);
                    if let (Some(i), Some(line)) = (current, line) {
                        files[i].1.record(line, hits);
                    }
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        sources.push(text.to_string());
                    }
                    in_source = false;
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"class" => current = None,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    let mut coverage = Coverage::new(CoverageType::Loc, Format::Cobertura.as_str());
    for (path, mut lines) in files {
        // Sort for consistent output, since lines may have been collected
        // from both <method> and <class> blocks.
        lines.hits.sort_by_key(|&(line, _)| line);
        let blocks = lines
            .hits
            .into_iter()
            .map(|(line, hits)| BlockCoverage::loc(line, hits))
            .collect();
        coverage.files.push(FileCoverage::with_blocks(path, blocks));
    }

    super::finish(coverage)
}

/// Resolve a filename against the list of `<source>` prefixes.
///
/// - If the filename is already absolute, return it as-is.
/// - Otherwise, prepend the first non-empty source prefix.
/// - If no non-empty sources exist, return the filename unchanged.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        return filename.to_string();
    }
    for source in sources {
        let base = source.trim_end_matches('/');
        if !base.is_empty() {
            return format!("{}/{}", base, filename);
        }
    }
    filename.to_string()
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}
