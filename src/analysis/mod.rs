pub mod complexity;
pub mod patterns;
pub mod scoring;
pub mod semgrep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::report::types::{DirectoryReport, FileReport, Finding, SeveritySummary};
use crate::rules::{RuleError, Ruleset};
use complexity::ComplexityAnalyzer;
use scoring::RawSeverityCounts;
use semgrep::{SemgrepAnalyzer, SemgrepConfig};

/// File extensions eligible for directory scans.
const SUPPORTED_EXTENSIONS: &[&str] = &["py", "js", "java", "c", "cpp", "php", "rb", "go", "rs"];

/// Upper bound on concurrently analyzed files, so a directory scan cannot
/// spawn unbounded subordinate processes.
pub const DEFAULT_MAX_PARALLEL_FILES: usize = 4;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to read {path}: {source}")]
    InputUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to materialize code input: {0}")]
    TempFile(std::io::Error),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error("Invalid analyzer pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// One file's worth of input, shared by every detector.
pub struct ScanTarget<'a> {
    /// On-disk location, needed by subprocess-based detectors
    pub path: &'a Path,
    /// Path reported in findings; differs from `path` for stdin input
    pub display_path: &'a str,
    /// Decoded content (invalid bytes already replaced)
    pub content: &'a str,
}

/// Findings from one detection stage, plus the raw severity tallies that
/// feed the risk score.
#[derive(Debug, Default)]
pub struct DetectorOutput {
    pub findings: Vec<Finding>,
    pub raw_counts: RawSeverityCounts,
}

/// A detection stage. Detectors must not fail the scan: anything that goes
/// wrong inside a stage degrades to empty output.
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect(&self, target: &ScanTarget<'_>) -> DetectorOutput;
}

/// Built-in regex scanner as a detection stage.
struct PatternDetector {
    ruleset: Ruleset,
}

#[async_trait]
impl Detector for PatternDetector {
    fn name(&self) -> &'static str {
        "built-in patterns"
    }

    async fn detect(&self, target: &ScanTarget<'_>) -> DetectorOutput {
        DetectorOutput {
            findings: patterns::scan(&self.ruleset, target.content, target.display_path),
            raw_counts: RawSeverityCounts::default(),
        }
    }
}

/// Semgrep subprocess as a detection stage.
struct SemgrepDetector {
    analyzer: SemgrepAnalyzer,
}

#[async_trait]
impl Detector for SemgrepDetector {
    fn name(&self) -> &'static str {
        "semgrep"
    }

    async fn detect(&self, target: &ScanTarget<'_>) -> DetectorOutput {
        let scan = self.analyzer.analyze(target.path, target.display_path).await;
        DetectorOutput {
            findings: scan.findings,
            raw_counts: scan.raw_counts,
        }
    }
}

/// Pipeline construction options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub semgrep_enabled: bool,
    pub semgrep: SemgrepConfig,
    pub max_parallel_files: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            semgrep_enabled: true,
            semgrep: SemgrepConfig::default(),
            max_parallel_files: DEFAULT_MAX_PARALLEL_FILES,
        }
    }
}

/// The analysis pipeline: detection stages plus the complexity analyzer.
/// Built once at startup; all contained state is read-only, so one pipeline
/// is safely shared across concurrent file scans.
pub struct Pipeline {
    detectors: Vec<Box<dyn Detector>>,
    complexity: ComplexityAnalyzer,
    max_parallel: usize,
}

impl Pipeline {
    pub async fn new(options: PipelineOptions) -> Result<Pipeline, AnalysisError> {
        let mut detectors: Vec<Box<dyn Detector>> = vec![Box::new(PatternDetector {
            ruleset: Ruleset::builtin()?,
        })];

        if options.semgrep_enabled {
            let analyzer = SemgrepAnalyzer::new(options.semgrep);
            if analyzer.check_installation().await {
                detectors.push(Box::new(SemgrepDetector { analyzer }));
            } else {
                warn!("semgrep unavailable; continuing with built-in analysis only");
            }
        }

        Ok(Pipeline {
            detectors,
            complexity: ComplexityAnalyzer::new()?,
            max_parallel: options.max_parallel_files.max(1),
        })
    }

    /// Analyze a single file. Unreadable input is the one error surfaced to
    /// the caller; everything downstream is fail-soft.
    #[instrument(skip(self), fields(file = %path.display()))]
    pub async fn analyze_file(&self, path: &Path) -> Result<FileReport, AnalysisError> {
        let display = path.display().to_string();
        let (report, _) = self.analyze_file_inner(path, &display).await?;
        Ok(report)
    }

    /// Analyze raw code by materializing it to a temporary file whose
    /// extension matches the declared language, so subprocess detectors see
    /// a plausible source file.
    pub async fn analyze_source(
        &self,
        code: &str,
        extension: &str,
        label: &str,
    ) -> Result<FileReport, AnalysisError> {
        let temp = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(AnalysisError::TempFile)?;
        tokio::fs::write(temp.path(), code)
            .await
            .map_err(AnalysisError::TempFile)?;

        let (report, _) = self.analyze_file_inner(temp.path(), label).await?;
        Ok(report)
    }

    /// Analyze every supported file under a directory. Per-file failures
    /// are logged and skipped; they never abort the batch.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn analyze_directory(
        self: &Arc<Self>,
        dir: &Path,
    ) -> Result<DirectoryReport, AnalysisError> {
        let files = collect_source_files(dir);
        info!(files = files.len(), "starting directory scan");

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for file in files {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                let display_path = file.display().to_string();
                match pipeline.analyze_file_inner(&file, &display_path).await {
                    Ok(result) => Some(result),
                    Err(err) => {
                        warn!(file = %display_path, error = %err, "skipping file");
                        None
                    }
                }
            });
        }

        let mut reports: Vec<FileReport> = Vec::new();
        let mut raw_counts = RawSeverityCounts::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((report, counts))) => {
                    raw_counts.merge(&counts);
                    reports.push(report);
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "analysis task failed"),
            }
        }

        // Cross-file ordering is irrelevant for correctness; sort for
        // reproducible output.
        reports.sort_by(|a, b| a.file.cmp(&b.file));

        let mut summary = SeveritySummary::default();
        for report in &reports {
            summary.merge(&report.summary);
        }
        let heuristic: f64 = reports
            .iter()
            .map(|r| scoring::heuristic_component(&r.findings))
            .sum();
        let risk_score =
            scoring::normalize_components(scoring::external_component(&raw_counts), heuristic);

        Ok(DirectoryReport {
            directory: dir.display().to_string(),
            files_analyzed: reports.len(),
            total_findings: reports.iter().map(|r| r.total).sum(),
            summary,
            risk_score,
            files: reports,
        })
    }

    async fn analyze_file_inner(
        &self,
        path: &Path,
        display_path: &str,
    ) -> Result<(FileReport, RawSeverityCounts), AnalysisError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AnalysisError::InputUnreadable {
                path: display_path.to_string(),
                source,
            })?;
        // Invalid bytes become replacement characters instead of failing
        let content = String::from_utf8_lossy(&bytes);

        let target = ScanTarget {
            path,
            display_path,
            content: &content,
        };

        let mut findings: Vec<Finding> = Vec::new();
        let mut raw_counts = RawSeverityCounts::default();
        for detector in &self.detectors {
            let output = detector.detect(&target).await;
            debug!(
                detector = detector.name(),
                count = output.findings.len(),
                "detector finished"
            );
            findings.extend(output.findings);
            raw_counts.merge(&output.raw_counts);
        }

        // Ascending line order within a file; stable so built-in findings
        // stay ahead of external ones on the same line
        findings.sort_by_key(|f| f.line);

        let summary = SeveritySummary::from_findings(&findings);
        let risk_score = scoring::risk_score(&raw_counts, &findings);
        let metrics = self.complexity.analyze(&content);

        let report = FileReport {
            file: display_path.to_string(),
            total: findings.len(),
            findings,
            summary,
            risk_score,
            metrics,
        };
        Ok((report, raw_counts))
    }
}

/// Walk a directory for analyzable sources. Symlinked entries are kept so
/// a dangling link surfaces as a per-file read failure, not a silent gap.
fn collect_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() || entry.path_is_symlink())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    files
}
