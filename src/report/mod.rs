pub mod types;

pub use types::{DirectoryReport, FileReport, Report, Severity};

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::analysis::semgrep::describe_rule;
use crate::report::types::{Finding, FindingSource};
use crate::rules::Category;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Output the report to terminal (default) or to a JSON file.
#[instrument(skip(report))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_json_report(report, path)
        }
    }
}

fn print_terminal_report(report: &Report) {
    match report {
        Report::File(file) => {
            println!();
            print_file_report(file);
        }
        Report::Directory(dir) => {
            println!();
            println!("═══ Directory scan: {} ═══", dir.directory);
            println!(
                "Files analyzed: {} | Findings: {} | Risk score: {}",
                dir.files_analyzed,
                dir.total_findings,
                colorize_risk(dir.risk_score)
            );
            print_summary_line(&dir.summary);
            println!();
            for file in &dir.files {
                print_file_report(file);
            }
        }
    }
}

fn print_file_report(report: &FileReport) {
    println!("═══ {} ═══", report.file);
    println!(
        "Findings: {} | Risk score: {}",
        report.total,
        colorize_risk(report.risk_score)
    );
    print_summary_line(&report.summary);

    if report.findings.is_empty() {
        println!("  No findings.");
    } else {
        for finding in &report.findings {
            print_finding(finding);
        }
    }

    let m = &report.metrics;
    println!(
        "Complexity: {} lines ({} code, {} comments) | cyclomatic {} | max depth {} | {} functions, {} classes",
        m.total_lines,
        m.code_lines,
        m.comment_lines,
        m.cyclomatic_complexity,
        m.max_nesting_depth,
        m.function_count,
        m.class_count
    );
    println!();
}

fn print_summary_line(summary: &types::SeveritySummary) {
    let parts: Vec<String> = Severity::ALL
        .iter()
        .map(|&severity| {
            format!(
                "{}: {}",
                colorize_severity(severity),
                summary.count(severity)
            )
        })
        .collect();
    println!("{}", parts.join(" | "));
}

fn print_finding(finding: &Finding) {
    println!(
        "  • [{}] {} ({}:{})",
        colorize_severity(finding.severity),
        finding.category,
        finding.file,
        finding.line
    );
    println!("      {}", finding.description);
    if !finding.matched_text.is_empty() {
        println!("      match: {}", finding.matched_text.trim());
    }
    println!(
        "      severity {:.2} | confidence {:.2} | source {}",
        finding.severity_score, finding.confidence_score, finding.source
    );
    if let Some(fix) = remediation_for(finding) {
        println!("      fix: {}", fix);
    }
}

/// Remediation text: the category's fix for built-in findings, the rule
/// guidance table for external ones.
fn remediation_for(finding: &Finding) -> Option<String> {
    match finding.source {
        FindingSource::BuiltIn => {
            Category::from_tag(&finding.category).map(|cat| cat.fix_suggestion().to_string())
        }
        FindingSource::Semgrep => Some(describe_rule(&finding.category).fix.to_string()),
    }
}

fn write_json_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn colorize_severity(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::High => "HIGH".red(),
        Severity::Medium => "MEDIUM".yellow(),
        Severity::Low => "LOW".green(),
        Severity::Info => "INFO".blue(),
    }
}

fn colorize_risk(score: f64) -> colored::ColoredString {
    let rendered = format!("{:.2}", score);
    if score >= 0.7 {
        rendered.red().bold()
    } else if score >= 0.4 {
        rendered.yellow()
    } else {
        rendered.green()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::complexity::ComplexityMetrics;
    use crate::report::types::SeveritySummary;

    fn sample_finding() -> Finding {
        Finding {
            category: "sql_injection".to_string(),
            line: 12,
            matched_text: "SELECT * FROM users WHERE id=\" + user_id".to_string(),
            description: "SQL query built by string concatenation".to_string(),
            severity: Severity::Critical,
            severity_score: 0.9,
            confidence_score: 0.8,
            source: FindingSource::BuiltIn,
            file: "app.py".to_string(),
        }
    }

    fn sample_file_report() -> FileReport {
        let findings = vec![sample_finding()];
        FileReport {
            file: "app.py".to_string(),
            total: findings.len(),
            summary: SeveritySummary::from_findings(&findings),
            risk_score: 0.072,
            metrics: ComplexityMetrics {
                total_lines: 20,
                code_lines: 15,
                comment_lines: 2,
                cyclomatic_complexity: 4,
                max_nesting_depth: 2,
                function_count: 1,
                class_count: 0,
            },
            findings,
        }
    }

    #[test]
    fn test_write_json_file_report() {
        let report = Report::File(sample_file_report());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&report, &path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["file"], "app.py");
        assert_eq!(parsed["total"], 1);
        assert_eq!(parsed["summary"]["CRITICAL"], 1);
        assert_eq!(parsed["findings"][0]["severity"], "CRITICAL");
        assert_eq!(parsed["findings"][0]["source"], "built-in");
        assert_eq!(parsed["metrics"]["cyclomatic_complexity"], 4);
    }

    #[test]
    fn test_write_json_directory_report() {
        let file = sample_file_report();
        let report = Report::Directory(DirectoryReport {
            directory: "src".to_string(),
            files_analyzed: 1,
            total_findings: file.total,
            summary: file.summary,
            risk_score: file.risk_score,
            files: vec![file],
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&report, &path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["directory"], "src");
        assert_eq!(parsed["files_analyzed"], 1);
        assert_eq!(parsed["files"][0]["file"], "app.py");
    }

    #[test]
    fn test_remediation_for_builtin_uses_category_fix() {
        let fix = remediation_for(&sample_finding()).unwrap();
        assert!(fix.to_lowercase().contains("paramet"));
    }

    #[test]
    fn test_remediation_for_external_uses_rule_table() {
        let mut finding = sample_finding();
        finding.source = FindingSource::Semgrep;
        finding.category = "hardcoded-credentials".to_string();
        assert!(remediation_for(&finding).is_some());
    }

    #[test]
    fn test_terminal_report_does_not_panic() {
        print_terminal_report(&Report::File(sample_file_report()));
    }

    #[test]
    fn test_terminal_report_empty_findings() {
        let mut file = sample_file_report();
        file.findings.clear();
        file.total = 0;
        file.summary = SeveritySummary::default();
        print_terminal_report(&Report::File(file));
    }

    #[test]
    fn test_output_to_file() {
        let report = Report::File(sample_file_report());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        output(&report, Some(&path)).unwrap();
        assert!(path.exists());
    }
}
