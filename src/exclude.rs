//! Drop files from a coverage tree by glob pattern.
//!
//! Patterns are evaluated in order and the last one that matches a file
//! decides its fate. A leading `!` negates a pattern, re-including files an
//! earlier pattern excluded. `*` stays within one path segment; `**` spans
//! any number of them.

use glob::{MatchOptions, Pattern};

use crate::error::{CovrecError, Result};
use crate::model::{Coverage, FileCoverage};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

struct Rule {
    pattern: Pattern,
    negated: bool,
}

impl Rule {
    fn matches(&self, file: &FileCoverage) -> bool {
        self.pattern.matches_with(file.effective_path(), MATCH_OPTIONS)
            || self.pattern.matches_with(&file.file, MATCH_OPTIONS)
    }
}

/// Compile every pattern up front so that one bad pattern rejects the set.
fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Rule>> {
    patterns
        .iter()
        .map(|raw| {
            let raw = raw.as_ref();
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let pattern = Pattern::new(body).map_err(|source| CovrecError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })?;
            Ok(Rule { pattern, negated })
        })
        .collect()
}

fn is_excluded(rules: &[Rule], file: &FileCoverage) -> bool {
    rules
        .iter()
        .rev()
        .find(|rule| rule.matches(file))
        .is_some_and(|rule| !rule.negated)
}

impl Coverage {
    /// Remove every file the patterns exclude and recompute totals. An
    /// invalid pattern fails the whole call without touching the tree.
    pub fn exclude<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<()> {
        let rules = compile(patterns)?;
        if rules.is_empty() {
            return Ok(());
        }

        let before = self.files.len();
        self.files.retain(|file| !is_excluded(&rules, file));
        self.recompute();

        tracing::debug!(
            patterns = rules.len(),
            removed = before - self.files.len(),
            remaining = self.files.len(),
            "excluded files"
        );
        Ok(())
    }
}
