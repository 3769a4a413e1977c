use serde::Serialize;

use crate::analysis::complexity::ComplexityMetrics;

/// Severity bucket for a finding, from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// All buckets, in display order.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Parse an externally reported severity tag. The tag is upper-cased and
    /// matched against the five bucket names; anything else maps to INFO.
    pub fn from_tag(tag: &str) -> Severity {
        match tag.to_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Which analysis stage produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingSource {
    BuiltIn,
    Semgrep,
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingSource::BuiltIn => write!(f, "built-in"),
            FindingSource::Semgrep => write!(f, "semgrep"),
        }
    }
}

/// A single detected issue. Findings are plain values with no identity
/// beyond their fields; duplicates on the same line are not collapsed.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Category tag (e.g. "sql_injection") or external rule id
    pub category: String,
    /// 1-based line number, 0 when the location could not be resolved
    pub line: usize,
    /// Exact substring that triggered the rule
    pub matched_text: String,
    /// Human-readable description of the issue
    pub description: String,
    /// Severity bucket for display and categorization
    pub severity: Severity,
    /// Impact estimate in [0, 1]
    pub severity_score: f64,
    /// True-positive certainty in [0, 1]
    pub confidence_score: f64,
    /// Stage that produced the finding
    pub source: FindingSource,
    /// File the finding was detected in
    pub file: String,
}

/// Per-bucket finding counts. Every bucket is always present, defaulting
/// to zero, so downstream consumers never need to handle missing keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeveritySummary {
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "INFO")]
    pub info: usize,
}

impl SeveritySummary {
    /// Build a histogram from a finding list.
    pub fn from_findings(findings: &[Finding]) -> SeveritySummary {
        let mut summary = SeveritySummary::default();
        for finding in findings {
            summary.bump(finding.severity);
        }
        summary
    }

    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    /// Merge another histogram into this one (directory aggregation).
    pub fn merge(&mut self, other: &SeveritySummary) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.info += other.info;
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Complete analysis result for a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path of the analyzed file
    pub file: String,
    /// Findings, ascending by line
    pub findings: Vec<Finding>,
    /// Per-bucket counts
    pub summary: SeveritySummary,
    /// Total number of findings
    pub total: usize,
    /// Normalized risk score in [0, 1]
    pub risk_score: f64,
    /// Lexical complexity metrics for the file
    pub metrics: ComplexityMetrics,
}

/// Aggregate result for a directory scan.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryReport {
    /// Path of the analyzed directory
    pub directory: String,
    /// Number of files successfully analyzed (failed files are skipped)
    pub files_analyzed: usize,
    /// Findings across all files
    pub total_findings: usize,
    /// Summed per-bucket counts
    pub summary: SeveritySummary,
    /// Risk score over the combined findings of all files
    pub risk_score: f64,
    /// Per-file results
    pub files: Vec<FileReport>,
}

/// Either shape of analysis output, for rendering and export.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    File(FileReport),
    Directory(DirectoryReport),
}
