//! Semgrep adapter
//!
//! Runs Semgrep as a subordinate process with a generated rule config and a
//! hard wall-clock timeout, then normalizes its JSON output into the common
//! finding schema. Semgrep is treated as an untrusted, possibly-absent
//! collaborator: every failure mode degrades to an empty scan and a logged
//! warning, never a hard error.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use super::scoring::{self, RawSeverityCounts};
use crate::report::types::{Finding, FindingSource, Severity};

/// Default wall-clock timeout for one Semgrep invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Timeout for the `--version` installation probe.
const PROBE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum SemgrepError {
    #[error("semgrep not found in PATH")]
    NotInstalled,

    #[error("failed to serialize rule config: {0}")]
    ConfigSerialize(#[from] serde_yaml::Error),

    #[error("failed to write rule config: {0}")]
    ConfigWrite(std::io::Error),

    #[error("failed to launch semgrep: {0}")]
    Spawn(std::io::Error),

    #[error("semgrep timed out after {0} seconds")]
    Timeout(u64),

    #[error("semgrep exited with status {code:?}: {stderr}")]
    ExecutionFailed { code: Option<i32>, stderr: String },

    #[error("failed to parse semgrep output: {0}")]
    OutputParse(#[from] serde_json::Error),
}

/// Execution settings for the adapter.
#[derive(Debug, Clone)]
pub struct SemgrepConfig {
    /// Executable name or path ("semgrep" when on PATH)
    pub executable: String,
    /// Hard wall-clock timeout for one invocation
    pub timeout: Duration,
}

impl Default for SemgrepConfig {
    fn default() -> Self {
        Self {
            executable: "semgrep".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// One custom rule in Semgrep's rule-config schema.
#[derive(Debug, Clone, Serialize)]
pub struct CustomRule {
    pub id: &'static str,
    pub message: &'static str,
    pub severity: &'static str,
    pub languages: Vec<&'static str>,
    #[serde(rename = "pattern-either")]
    pub pattern_either: Vec<PatternClause>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternClause {
    pub pattern: &'static str,
}

#[derive(Debug, Serialize)]
struct RuleConfigFile {
    rules: Vec<CustomRule>,
}

fn clause(pattern: &'static str) -> PatternClause {
    PatternClause { pattern }
}

/// The custom rule set serialized into the ephemeral config artifact.
pub fn custom_rules() -> Vec<CustomRule> {
    vec![
        CustomRule {
            id: "sql-injection-detection",
            message: "Potential SQL injection vulnerability detected",
            severity: "ERROR",
            languages: vec!["python"],
            pattern_either: vec![
                clause("cursor.execute($QUERY + $VAR)"),
                clause("cursor.execute(f\"...{$VAR}...\")"),
                clause("cursor.execute(\"...\" + $VAR + \"...\")"),
                clause("$CURSOR.execute($QUERY % $VAR)"),
            ],
        },
        CustomRule {
            id: "hardcoded-credentials",
            message: "Hardcoded credentials detected",
            severity: "ERROR",
            languages: vec!["python"],
            pattern_either: vec![
                clause("password=\"$PASSWORD\""),
                clause("api_key=\"$KEY\""),
                clause("secret=\"$SECRET\""),
                clause("token=\"$TOKEN\""),
            ],
        },
        CustomRule {
            id: "command-injection",
            message: "Potential command injection vulnerability",
            severity: "ERROR",
            languages: vec!["python"],
            pattern_either: vec![
                clause("subprocess.call($CMD, shell=True)"),
                clause("os.system($CMD)"),
                clause("subprocess.run($CMD, shell=True)"),
                clause("subprocess.Popen($CMD, shell=True)"),
            ],
        },
        CustomRule {
            id: "path-traversal",
            message: "Potential path traversal vulnerability",
            severity: "ERROR",
            languages: vec!["python"],
            pattern_either: vec![
                clause("open(f\"...{$VAR}...\", ...)"),
                clause("open($PATH + $VAR, ...)"),
                clause("open($VAR, ...)"),
            ],
        },
        CustomRule {
            id: "weak-cryptography",
            message: "Weak cryptographic algorithm detected",
            severity: "WARNING",
            languages: vec!["python"],
            pattern_either: vec![
                clause("hashlib.md5(...)"),
                clause("hashlib.sha1(...)"),
                clause("random.randint(...)"),
            ],
        },
        CustomRule {
            id: "unsafe-deserialization",
            message: "Unsafe deserialization detected",
            severity: "ERROR",
            languages: vec!["python"],
            pattern_either: vec![
                clause("pickle.loads($DATA)"),
                clause("pickle.load($FILE)"),
                clause("yaml.load($DATA)"),
            ],
        },
    ]
}

/// Root of Semgrep's `--json` output. Only the fields the pipeline consumes
/// are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
struct SemgrepOutput {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
    check_id: String,
    #[serde(default)]
    start: SemgrepPosition,
    #[serde(default)]
    extra: SemgrepExtra,
}

#[derive(Debug, Default, Deserialize)]
struct SemgrepPosition {
    #[serde(default)]
    line: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SemgrepExtra {
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    lines: String,
}

/// Result of one external scan: normalized findings plus the raw severity
/// tallies the risk score formula consumes.
#[derive(Debug, Default)]
pub struct SemgrepScan {
    pub findings: Vec<Finding>,
    pub raw_counts: RawSeverityCounts,
}

/// Remediation guidance for a custom rule id.
#[derive(Debug, Clone, Copy)]
pub struct RuleGuidance {
    pub description: &'static str,
    pub impact: &'static str,
    pub fix: &'static str,
    pub example_fix: &'static str,
}

/// Static remediation lookup for the rule ids the adapter emits. Unknown
/// ids get a generic fallback.
pub fn describe_rule(rule_id: &str) -> RuleGuidance {
    match rule_id {
        "sql-injection-detection" => RuleGuidance {
            description: "SQL injection occurs when user input is directly concatenated into SQL queries without proper sanitization.",
            impact: "Attackers can execute arbitrary SQL commands, potentially accessing, modifying, or deleting data.",
            fix: "Use parameterized queries or prepared statements instead of string concatenation.",
            example_fix: "cursor.execute('SELECT * FROM users WHERE id = ?', (user_id,))",
        },
        "hardcoded-credentials" => RuleGuidance {
            description: "Hardcoded credentials in source code pose a security risk.",
            impact: "Credentials can be exposed to anyone with access to the source code.",
            fix: "Use environment variables or secure configuration files.",
            example_fix: "password = os.getenv('DB_PASSWORD')",
        },
        "command-injection" => RuleGuidance {
            description: "Command injection occurs when user input is used in system commands without proper validation.",
            impact: "Attackers can execute arbitrary system commands.",
            fix: "Validate and sanitize input, avoid shell=True, use subprocess with list arguments.",
            example_fix: "subprocess.run(['tar', '-czf', backup_file, source_dir])",
        },
        "path-traversal" => RuleGuidance {
            description: "Path traversal allows attackers to access files outside the intended directory.",
            impact: "Attackers can read sensitive files from the system.",
            fix: "Validate file paths and use os.path.join() with proper validation.",
            example_fix: "safe_path = os.path.join(base_dir, os.path.basename(filename))",
        },
        "weak-cryptography" => RuleGuidance {
            description: "Weak cryptographic algorithms are vulnerable to attacks.",
            impact: "Data can be easily compromised or passwords cracked.",
            fix: "Use strong algorithms like SHA-256 or bcrypt for password hashing.",
            example_fix: "import bcrypt; hashed = bcrypt.hashpw(password.encode(), bcrypt.gensalt())",
        },
        "unsafe-deserialization" => RuleGuidance {
            description: "Unsafe deserialization can lead to code execution vulnerabilities.",
            impact: "Attackers can execute arbitrary code by providing malicious serialized data.",
            fix: "Use safe serialization formats like JSON, or validate data before deserialization.",
            example_fix: "import json; data = json.loads(user_input)",
        },
        _ => RuleGuidance {
            description: "Security vulnerability detected",
            impact: "Potential security risk",
            fix: "Review and fix the identified issue",
            example_fix: "Implement proper security measures",
        },
    }
}

/// Semgrep executor. Cheap to construct; holds only configuration.
pub struct SemgrepAnalyzer {
    config: SemgrepConfig,
}

impl SemgrepAnalyzer {
    pub fn new(config: SemgrepConfig) -> Self {
        Self { config }
    }

    /// Probe `semgrep --version`. Used once per run to disable the external
    /// analyzer when the tool is absent, rather than failing every file.
    pub async fn check_installation(&self) -> bool {
        let probe = Command::new(&self.config.executable)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                debug!(version = %version, "semgrep found");
                true
            }
            _ => false,
        }
    }

    /// Run Semgrep against one file. Never fails: unavailability, timeout,
    /// non-zero exit, and unparseable output all degrade to an empty scan
    /// with a logged warning.
    pub async fn analyze(&self, target: &Path, display_path: &str) -> SemgrepScan {
        match self.run(target).await {
            Ok(output) => self.normalize(output, display_path),
            Err(SemgrepError::NotInstalled) => {
                warn!("semgrep not installed; skipping external analysis");
                SemgrepScan::default()
            }
            Err(err) => {
                warn!(file = display_path, error = %err, "semgrep analysis failed; continuing with built-in results");
                SemgrepScan::default()
            }
        }
    }

    async fn run(&self, target: &Path) -> Result<SemgrepOutput, SemgrepError> {
        // Scoped rule-config artifact; the TempDir guard removes it on every
        // exit path, including timeout and error returns.
        let rules_dir = tempfile::tempdir().map_err(SemgrepError::ConfigWrite)?;
        let rules_file = rules_dir.path().join("rules.yaml");
        let yaml = serde_yaml::to_string(&RuleConfigFile {
            rules: custom_rules(),
        })?;
        tokio::fs::write(&rules_file, yaml)
            .await
            .map_err(SemgrepError::ConfigWrite)?;

        let mut cmd = Command::new(&self.config.executable);
        cmd.arg("--config")
            .arg(&rules_file)
            .arg("--json")
            .arg("--quiet")
            .arg(target)
            .stdin(Stdio::null())
            // Dropping the output future on timeout must take the child with it
            .kill_on_drop(true);

        debug!(target = %target.display(), timeout_secs = self.config.timeout.as_secs(), "invoking semgrep");

        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| SemgrepError::Timeout(self.config.timeout.as_secs()))?
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    SemgrepError::NotInstalled
                } else {
                    SemgrepError::Spawn(err)
                }
            })?;

        if !output.status.success() {
            return Err(SemgrepError::ExecutionFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(&stdout)?)
    }

    /// Map raw results into the common finding schema and tally the raw
    /// severity tags for the risk score.
    fn normalize(&self, output: SemgrepOutput, display_path: &str) -> SemgrepScan {
        let mut scan = SemgrepScan::default();

        for result in output.results {
            scan.raw_counts.record(&result.extra.severity);

            let matched_text = result.extra.lines.trim().to_string();
            let (severity_score, confidence_score) =
                scoring::score(&result.check_id, &matched_text);

            scan.findings.push(Finding {
                severity: Severity::from_tag(&result.extra.severity),
                category: result.check_id,
                line: result.start.line,
                matched_text,
                description: result.extra.message,
                severity_score,
                confidence_score,
                source: FindingSource::Semgrep,
                file: display_path.to_string(),
            });
        }

        debug!(
            file = display_path,
            count = scan.findings.len(),
            "semgrep scan complete"
        );
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_config_yaml_shape() {
        let yaml = serde_yaml::to_string(&RuleConfigFile {
            rules: custom_rules(),
        })
        .unwrap();
        assert!(yaml.starts_with("rules:"));
        assert!(yaml.contains("id: sql-injection-detection"));
        assert!(yaml.contains("pattern-either:"));
        assert!(yaml.contains("severity: ERROR"));
        assert!(yaml.contains("languages:"));
    }

    #[test]
    fn test_custom_rules_cover_six_categories() {
        let rules = custom_rules();
        assert_eq!(rules.len(), 6);
        let mut ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(rules.iter().all(|r| !r.pattern_either.is_empty()));
    }

    #[test]
    fn test_normalize_maps_results_into_findings() {
        let json = r#"{
            "results": [
                {
                    "check_id": "sql-injection-detection",
                    "path": "app.py",
                    "start": {"line": 12, "col": 5},
                    "end": {"line": 12, "col": 44},
                    "extra": {
                        "message": "Potential SQL injection vulnerability detected",
                        "lines": "cursor.execute(query + uid)",
                        "severity": "ERROR"
                    }
                },
                {
                    "check_id": "weak-cryptography",
                    "path": "app.py",
                    "start": {"line": 30},
                    "extra": {
                        "message": "Weak cryptographic algorithm detected",
                        "lines": "hashlib.md5(pw)",
                        "severity": "WARNING"
                    }
                }
            ]
        }"#;

        let output: SemgrepOutput = serde_json::from_str(json).unwrap();
        let analyzer = SemgrepAnalyzer::new(SemgrepConfig::default());
        let scan = analyzer.normalize(output, "app.py");

        assert_eq!(scan.findings.len(), 2);
        assert_eq!(scan.raw_counts.errors, 1);
        assert_eq!(scan.raw_counts.warnings, 1);

        let first = &scan.findings[0];
        assert_eq!(first.category, "sql-injection-detection");
        assert_eq!(first.line, 12);
        assert_eq!(first.matched_text, "cursor.execute(query + uid)");
        assert_eq!(first.source, FindingSource::Semgrep);
        // ERROR is not a bucket name, so it normalizes to INFO
        assert_eq!(first.severity, Severity::Info);
        assert!((0.0..=1.0).contains(&first.severity_score));
    }

    #[test]
    fn test_normalize_defaults_for_missing_fields() {
        let json = r#"{"results": [{"check_id": "some-rule"}]}"#;
        let output: SemgrepOutput = serde_json::from_str(json).unwrap();
        let analyzer = SemgrepAnalyzer::new(SemgrepConfig::default());
        let scan = analyzer.normalize(output, "x.py");

        assert_eq!(scan.findings.len(), 1);
        assert_eq!(scan.findings[0].line, 0);
        assert_eq!(scan.findings[0].severity, Severity::Info);
        assert_eq!(scan.raw_counts, RawSeverityCounts::default());
    }

    #[test]
    fn test_empty_results_parse() {
        let output: SemgrepOutput = serde_json::from_str("{}").unwrap();
        assert!(output.results.is_empty());
    }

    #[test]
    fn test_describe_rule_known_and_fallback() {
        let known = describe_rule("command-injection");
        assert!(known.fix.contains("shell=True"));

        let fallback = describe_rule("totally-unknown-rule");
        assert_eq!(fallback.description, "Security vulnerability detected");
    }

    #[tokio::test]
    async fn test_missing_tool_degrades_to_empty_scan() {
        let analyzer = SemgrepAnalyzer::new(SemgrepConfig {
            executable: "definitely-not-a-real-semgrep-binary".to_string(),
            timeout: Duration::from_secs(5),
        });
        let scan = analyzer
            .analyze(Path::new("nonexistent.py"), "nonexistent.py")
            .await;
        assert!(scan.findings.is_empty());
        assert_eq!(scan.raw_counts, RawSeverityCounts::default());
    }

    #[tokio::test]
    async fn test_check_installation_false_for_missing_tool() {
        let analyzer = SemgrepAnalyzer::new(SemgrepConfig {
            executable: "definitely-not-a-real-semgrep-binary".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(!analyzer.check_installation().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_tool_and_degrades_to_empty_scan() {
        use std::os::unix::fs::PermissionsExt;

        // Stub tool that sleeps far past the configured deadline
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("slow-semgrep");
        std::fs::write(&stub, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer = SemgrepAnalyzer::new(SemgrepConfig {
            executable: stub.display().to_string(),
            timeout: Duration::from_secs(1),
        });

        let started = std::time::Instant::now();
        let scan = analyzer.analyze(Path::new("x.py"), "x.py").await;
        let elapsed = started.elapsed();

        assert!(scan.findings.is_empty());
        assert_eq!(scan.raw_counts, RawSeverityCounts::default());
        // The caller is unblocked at the deadline, not at the tool's pace
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_nonzero_exit_degrades_to_empty_scan() {
        // `false` accepts any arguments and exits 1
        let analyzer = SemgrepAnalyzer::new(SemgrepConfig {
            executable: "false".to_string(),
            timeout: Duration::from_secs(5),
        });
        let scan = analyzer.analyze(Path::new("x.py"), "x.py").await;
        assert!(scan.findings.is_empty());
    }
}
