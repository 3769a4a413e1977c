use regex::Regex;
use serde::Serialize;

/// Lexical complexity metrics for one file. Derived purely from scanning
/// the text; independent of vulnerability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplexityMetrics {
    pub total_lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub cyclomatic_complexity: usize,
    pub max_nesting_depth: usize,
    pub function_count: usize,
    pub class_count: usize,
}

/// Complexity Analyzer
///
/// Counts lines, decision points, declarations, and indentation depth.
/// Nesting is estimated from leading whitespace (4 columns per level)
/// rather than real block structure; this is a deliberate approximation.
pub struct ComplexityAnalyzer {
    decision_keywords: Regex,
    function_decl: Regex,
    class_decl: Regex,
}

impl ComplexityAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            decision_keywords: Regex::new(r"\b(?:if|elif|while|for|except|and|or)\b")?,
            function_decl: Regex::new(r"def\s+\w+")?,
            class_decl: Regex::new(r"class\s+\w+")?,
        })
    }

    pub fn analyze(&self, content: &str) -> ComplexityMetrics {
        let lines: Vec<&str> = content.split('\n').collect();

        let mut code_lines = 0;
        let mut comment_lines = 0;
        let mut max_nesting_depth = 0;

        for line in &lines {
            let stripped = line.trim_start();
            if stripped.trim_end().is_empty() {
                continue;
            }
            if stripped.starts_with('#') {
                comment_lines += 1;
                continue;
            }
            code_lines += 1;
            let indent = line.chars().count() - stripped.chars().count();
            max_nesting_depth = max_nesting_depth.max(indent / 4);
        }

        ComplexityMetrics {
            total_lines: lines.len(),
            code_lines,
            comment_lines,
            // Base complexity of 1 plus one per decision point
            cyclomatic_complexity: 1 + self.decision_keywords.find_iter(content).count(),
            max_nesting_depth,
            function_count: self.function_decl.find_iter(content).count(),
            class_count: self.class_decl.find_iter(content).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ComplexityAnalyzer {
        ComplexityAnalyzer::new().unwrap()
    }

    #[test]
    fn test_empty_input_degenerate_metrics() {
        let metrics = analyzer().analyze("");
        assert_eq!(metrics.total_lines, 1);
        assert_eq!(metrics.code_lines, 0);
        assert_eq!(metrics.comment_lines, 0);
        assert_eq!(metrics.cyclomatic_complexity, 1);
        assert_eq!(metrics.max_nesting_depth, 0);
        assert_eq!(metrics.function_count, 0);
        assert_eq!(metrics.class_count, 0);
    }

    #[test]
    fn test_counts_code_and_comment_lines() {
        let code = "# header comment\nx = 1\n\n# another\ny = 2\n";
        let metrics = analyzer().analyze(code);
        assert_eq!(metrics.total_lines, 6);
        assert_eq!(metrics.code_lines, 2);
        assert_eq!(metrics.comment_lines, 2);
    }

    #[test]
    fn test_cyclomatic_complexity_counts_decision_points() {
        let code = "if a and b:\n    pass\nelif c:\n    pass\n";
        let metrics = analyzer().analyze(code);
        // 1 base + if, and, elif
        assert_eq!(metrics.cyclomatic_complexity, 4);
    }

    #[test]
    fn test_keyword_matches_require_word_boundaries() {
        let code = "inform = forty\nelifx = 1\n";
        let metrics = analyzer().analyze(code);
        assert_eq!(metrics.cyclomatic_complexity, 1);
    }

    #[test]
    fn test_nesting_depth_from_indentation() {
        let code = "def f():\n    if x:\n        while y:\n            g()\n";
        let metrics = analyzer().analyze(code);
        assert_eq!(metrics.max_nesting_depth, 3);
    }

    #[test]
    fn test_comment_lines_do_not_count_toward_depth() {
        let code = "x = 1\n            # deeply indented comment\n";
        let metrics = analyzer().analyze(code);
        assert_eq!(metrics.max_nesting_depth, 0);
    }

    #[test]
    fn test_function_and_class_counts() {
        let code = "class Widget:\n    def draw(self):\n        pass\n\ndef main():\n    pass\n";
        let metrics = analyzer().analyze(code);
        assert_eq!(metrics.class_count, 1);
        assert_eq!(metrics.function_count, 2);
    }
}
