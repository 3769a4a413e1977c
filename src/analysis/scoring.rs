use crate::report::types::{Finding, FindingSource};
use crate::rules::Category;

/// Counts of raw severity tags reported by the external tool. The risk
/// formula consumes these raw counts, not the normalized buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl RawSeverityCounts {
    pub fn record(&mut self, tag: &str) {
        match tag.to_uppercase().as_str() {
            "ERROR" => self.errors += 1,
            "WARNING" => self.warnings += 1,
            "INFO" => self.infos += 1,
            _ => {}
        }
    }

    pub fn merge(&mut self, other: &RawSeverityCounts) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.infos += other.infos;
    }
}

/// Compute (severity, confidence) for a match.
///
/// Severity starts from the per-category base weight, gains 0.10 when the
/// matched text mentions user input and a further 0.15 when it mentions a
/// privileged identity, capped at 1.0. Confidence is the per-category
/// constant. Unknown categories fall back to 0.50 for both.
pub fn score(category: &str, matched_text: &str) -> (f64, f64) {
    let (base, confidence) = match Category::from_tag(category) {
        Some(cat) => (cat.base_severity(), cat.confidence()),
        None => (0.50, 0.50),
    };

    let lowered = matched_text.to_lowercase();
    let mut severity = base;
    if lowered.contains("user") || lowered.contains("input") {
        severity += 0.10;
    }
    if lowered.contains("admin") || lowered.contains("root") {
        severity += 0.15;
    }

    (severity.min(1.0), confidence)
}

/// Aggregate risk score in [0, 1].
///
/// external = 0.3·errors + 0.2·warnings + 0.1·infos over the raw tool
/// output; heuristic = Σ severity·confidence over built-in findings; the
/// sum is divided by 10 and clamped. The constants and the divisor are
/// compatibility-critical: persisted historical scores use this exact
/// formula.
pub fn risk_score(raw: &RawSeverityCounts, findings: &[Finding]) -> f64 {
    normalize_components(external_component(raw), heuristic_component(findings))
}

/// Weighted contribution of raw external-tool output.
pub fn external_component(raw: &RawSeverityCounts) -> f64 {
    0.3 * raw.errors as f64 + 0.2 * raw.warnings as f64 + 0.1 * raw.infos as f64
}

/// Σ severity·confidence over built-in findings. External findings are
/// excluded here; they already contribute through the raw counts.
pub fn heuristic_component(findings: &[Finding]) -> f64 {
    findings
        .iter()
        .filter(|f| f.source == FindingSource::BuiltIn)
        .map(|f| f.severity_score * f.confidence_score)
        .sum()
}

/// Divide the summed components by 10 and clamp into [0, 1]. Exposed
/// separately so a whole-directory score can sum components across files
/// before normalizing, instead of averaging per-file scores.
pub fn normalize_components(external: f64, heuristic: f64) -> f64 {
    ((external + heuristic) / 10.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::Severity;

    fn builtin_finding(severity_score: f64, confidence_score: f64) -> Finding {
        Finding {
            category: "sql_injection".to_string(),
            line: 1,
            matched_text: "SELECT".to_string(),
            description: "test".to_string(),
            severity: Severity::Critical,
            severity_score,
            confidence_score,
            source: FindingSource::BuiltIn,
            file: "a.py".to_string(),
        }
    }

    #[test]
    fn test_base_scores() {
        let (sev, conf) = score("sql_injection", "SELECT * FROM t");
        assert_eq!(sev, 0.90);
        assert_eq!(conf, 0.80);
    }

    #[test]
    fn test_user_input_boost() {
        let (sev, _) = score("xss", "innerHTML = user_data +");
        assert!((sev - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_admin_boost_stacks_and_clamps() {
        // 0.95 + 0.10 + 0.15 would exceed 1.0
        let (sev, conf) = score("buffer_overflow", "strcpy(admin_input)");
        assert_eq!(sev, 1.0);
        assert_eq!(conf, 0.85);
    }

    #[test]
    fn test_unknown_category_defaults() {
        let (sev, conf) = score("custom-semgrep-rule", "whatever");
        assert_eq!(sev, 0.50);
        assert_eq!(conf, 0.50);
    }

    #[test]
    fn test_scores_always_within_unit_interval() {
        for category in Category::ALL {
            let (sev, conf) = score(category.tag(), "admin user input root");
            assert!((0.0..=1.0).contains(&sev));
            assert!((0.0..=1.0).contains(&conf));
        }
    }

    #[test]
    fn test_raw_counts_record() {
        let mut counts = RawSeverityCounts::default();
        counts.record("ERROR");
        counts.record("error");
        counts.record("WARNING");
        counts.record("INFO");
        counts.record("SOMETHING_ELSE");
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.infos, 1);
    }

    #[test]
    fn test_risk_score_formula() {
        let raw = RawSeverityCounts {
            errors: 2,
            warnings: 1,
            infos: 1,
        };
        let findings = vec![builtin_finding(0.9, 0.8)];
        // (0.3*2 + 0.2*1 + 0.1*1 + 0.72) / 10
        let expected = (0.6 + 0.2 + 0.1 + 0.72) / 10.0;
        assert!((risk_score(&raw, &findings) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_risk_score_ignores_external_findings() {
        let mut external = builtin_finding(1.0, 1.0);
        external.source = FindingSource::Semgrep;
        let raw = RawSeverityCounts::default();
        assert_eq!(risk_score(&raw, &[external]), 0.0);
    }

    #[test]
    fn test_risk_score_clamps_to_one() {
        let raw = RawSeverityCounts {
            errors: 100,
            warnings: 0,
            infos: 0,
        };
        assert_eq!(risk_score(&raw, &[]), 1.0);
    }

    #[test]
    fn test_risk_score_empty_inputs() {
        assert_eq!(risk_score(&RawSeverityCounts::default(), &[]), 0.0);
    }
}
