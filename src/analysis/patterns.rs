use tracing::debug;

use super::scoring;
use crate::report::types::{Finding, FindingSource};
use crate::rules::Ruleset;

/// Scan file content against the built-in rule registry.
///
/// Matching runs over the full text; line numbers are recovered from match
/// offsets, so they always refer to the original content. Findings come
/// back in ascending line order. No match anywhere is an empty result, not
/// an error.
pub fn scan(ruleset: &Ruleset, content: &str, file: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for rule in ruleset.rules() {
        for m in rule.pattern.find_iter(content) {
            let line = line_of_offset(content, m.start());
            let matched_text = m.as_str().to_string();
            let (severity_score, confidence_score) =
                scoring::score(rule.category.tag(), &matched_text);

            findings.push(Finding {
                category: rule.category.tag().to_string(),
                line,
                matched_text,
                description: rule.message.to_string(),
                severity: rule.category.bucket(),
                severity_score,
                confidence_score,
                source: FindingSource::BuiltIn,
                file: file.to_string(),
            });
        }
    }

    // Stable sort keeps registration order for same-line matches
    findings.sort_by_key(|f| f.line);
    debug!(file, count = findings.len(), "built-in scan complete");
    findings
}

/// 1-based line number of a byte offset.
fn line_of_offset(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
