use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::report::types::Severity;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rule pattern for {category}: {source}")]
    InvalidPattern {
        category: &'static str,
        source: regex::Error,
    },
}

/// Vulnerability category. The set is fixed at build time; every category
/// carries a static severity bucket, scoring weights, and a fix suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SqlInjection,
    Xss,
    HardcodedSecrets,
    BufferOverflow,
    RaceCondition,
    CommandInjection,
    PathTraversal,
    WeakCrypto,
    UnsafeDeserialization,
    InformationDisclosure,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::SqlInjection,
        Category::Xss,
        Category::HardcodedSecrets,
        Category::BufferOverflow,
        Category::RaceCondition,
        Category::CommandInjection,
        Category::PathTraversal,
        Category::WeakCrypto,
        Category::UnsafeDeserialization,
        Category::InformationDisclosure,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Category::SqlInjection => "sql_injection",
            Category::Xss => "xss",
            Category::HardcodedSecrets => "hardcoded_secrets",
            Category::BufferOverflow => "buffer_overflow",
            Category::RaceCondition => "race_condition",
            Category::CommandInjection => "command_injection",
            Category::PathTraversal => "path_traversal",
            Category::WeakCrypto => "weak_crypto",
            Category::UnsafeDeserialization => "unsafe_deserialization",
            Category::InformationDisclosure => "information_disclosure",
        }
    }

    /// Reverse lookup by tag. Unknown tags (e.g. external rule ids) return
    /// None and fall back to the default weights in the scorer.
    pub fn from_tag(tag: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.tag() == tag)
    }

    /// Static category → severity bucket table.
    pub fn bucket(&self) -> Severity {
        match self {
            Category::SqlInjection
            | Category::CommandInjection
            | Category::UnsafeDeserialization
            | Category::HardcodedSecrets => Severity::Critical,
            Category::Xss | Category::PathTraversal => Severity::High,
            Category::WeakCrypto | Category::InformationDisclosure => Severity::Medium,
            Category::BufferOverflow | Category::RaceCondition => Severity::Low,
        }
    }

    /// Base severity weight. Values are fixed design constants; stored risk
    /// scores depend on them, so they must not drift.
    pub fn base_severity(&self) -> f64 {
        match self {
            Category::SqlInjection => 0.90,
            Category::Xss => 0.80,
            Category::HardcodedSecrets => 0.85,
            Category::BufferOverflow => 0.95,
            Category::RaceCondition => 0.70,
            _ => 0.50,
        }
    }

    /// Confidence weight, independent of match content.
    pub fn confidence(&self) -> f64 {
        match self {
            Category::SqlInjection => 0.80,
            Category::Xss => 0.75,
            Category::HardcodedSecrets => 0.90,
            Category::BufferOverflow => 0.85,
            Category::RaceCondition => 0.60,
            _ => 0.50,
        }
    }

    pub fn fix_suggestion(&self) -> &'static str {
        match self {
            Category::SqlInjection => {
                "Use parameterized queries or prepared statements instead of string concatenation"
            }
            Category::Xss => "Sanitize user input and use safe DOM manipulation methods",
            Category::HardcodedSecrets => {
                "Move secrets to environment variables or secure configuration files"
            }
            Category::BufferOverflow => {
                "Use safer string functions like strncpy, strncat, or snprintf"
            }
            Category::RaceCondition => {
                "Use proper synchronization mechanisms like locks or atomic operations"
            }
            Category::CommandInjection => {
                "Validate and sanitize input, avoid shell=True, use subprocess with list arguments"
            }
            Category::PathTraversal => "Validate file paths and resolve them against a base directory",
            Category::WeakCrypto => "Use strong algorithms like SHA-256 or bcrypt for password hashing",
            Category::UnsafeDeserialization => {
                "Use safe serialization formats like JSON, or validate data before deserialization"
            }
            Category::InformationDisclosure => {
                "Disable debug mode in production and avoid logging sensitive values"
            }
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One detection rule: a compiled pattern with its category and message.
#[derive(Debug)]
pub struct Rule {
    pub category: Category,
    pub pattern: Regex,
    pub message: &'static str,
}

/// Raw pattern table. Categories may hold several patterns (OR semantics);
/// every pattern is compiled case-insensitive and multi-line.
const PATTERNS: &[(Category, &str, &str)] = &[
    // SQL injection
    (
        Category::SqlInjection,
        r#"execute\s*\(\s*["'].*%.*["']"#,
        "SQL query built with string formatting",
    ),
    (
        Category::SqlInjection,
        r#"query\s*\(\s*["'].*\+.*["']"#,
        "SQL query built with string concatenation",
    ),
    (
        Category::SqlInjection,
        r#"cursor\.execute\s*\(\s*["'].*%.*["']"#,
        "Database cursor executed with interpolated query",
    ),
    (
        Category::SqlInjection,
        r"(SELECT|INSERT|UPDATE|DELETE).*\+.*",
        "String concatenation in SQL query",
    ),
    (
        Category::SqlInjection,
        r"1\s*OR\s*1\s*=\s*1",
        "Classic SQL injection pattern",
    ),
    (
        Category::SqlInjection,
        r"UNION\s+SELECT",
        "UNION-based SQL injection",
    ),
    (
        Category::SqlInjection,
        r";\s*DROP\s+TABLE",
        "SQL injection with DROP statement",
    ),
    // Cross-site scripting
    (
        Category::Xss,
        r"innerHTML\s*=\s*.*\+",
        "Unsafe innerHTML assignment",
    ),
    (
        Category::Xss,
        r"document\.write\s*\(\s*.*\+",
        "Unsafe document.write usage",
    ),
    (
        Category::Xss,
        r"eval\s*\(\s*.*input",
        "eval of user-controlled input",
    ),
    (
        Category::Xss,
        r"<script[^>]*>[^<]*</script>",
        "Inline script tag",
    ),
    // Hardcoded secrets
    (
        Category::HardcodedSecrets,
        r#"password\s*=\s*["'][^"']{8,}["']"#,
        "Hardcoded password detected",
    ),
    (
        Category::HardcodedSecrets,
        r#"api_key\s*=\s*["'][^"']{20,}["']"#,
        "Hardcoded API key detected",
    ),
    (
        Category::HardcodedSecrets,
        r#"secret\s*=\s*["'][^"']{16,}["']"#,
        "Hardcoded secret detected",
    ),
    (
        Category::HardcodedSecrets,
        r#"(password|pwd|pass)\s*=\s*["'][^"']{3,}["']"#,
        "Hardcoded credential assignment",
    ),
    (
        Category::HardcodedSecrets,
        r#"(api_key|apikey|secret)\s*=\s*["'][^"']{10,}["']"#,
        "Hardcoded API credential",
    ),
    // Buffer overflow
    (Category::BufferOverflow, r"strcpy\s*\(", "Unbounded strcpy call"),
    (Category::BufferOverflow, r"strcat\s*\(", "Unbounded strcat call"),
    (
        Category::BufferOverflow,
        r"sprintf\s*\(",
        "Unbounded sprintf call",
    ),
    // Race condition
    (
        Category::RaceCondition,
        r"threading\.",
        "Shared-state threading primitive",
    ),
    (
        Category::RaceCondition,
        r"multiprocessing\.",
        "Multiprocessing shared-state access",
    ),
    (
        Category::RaceCondition,
        r"async\s+def",
        "Async function with potential interleaving",
    ),
    // Command injection
    (
        Category::CommandInjection,
        r"os\.system\s*\([^)]*\+",
        "Command injection via os.system",
    ),
    (
        Category::CommandInjection,
        r"subprocess\.[^(]*\([^)]*shell\s*=\s*True",
        "Subprocess invoked with shell=True",
    ),
    (
        Category::CommandInjection,
        r"eval\s*\([^)]*input",
        "Code injection via eval",
    ),
    // Path traversal
    (
        Category::PathTraversal,
        r"\.\./",
        "Directory traversal pattern",
    ),
    (
        Category::PathTraversal,
        r#"open\s*\([^)]*\+[^)]*["'][^"']*["']"#,
        "Unsafe file path construction",
    ),
    // Weak cryptography
    (Category::WeakCrypto, r"hashlib\.md5\s*\(", "Weak MD5 hash usage"),
    (
        Category::WeakCrypto,
        r"hashlib\.sha1\s*\(",
        "Weak SHA1 hash usage",
    ),
    (Category::WeakCrypto, r"DES|RC4", "Weak encryption algorithm"),
    // Unsafe deserialization
    (
        Category::UnsafeDeserialization,
        r"pickle\.loads?\s*\(",
        "Unsafe pickle deserialization",
    ),
    (
        Category::UnsafeDeserialization,
        r"yaml\.load\s*\([^)]*Loader",
        "Unsafe YAML loading",
    ),
    // Information disclosure
    (
        Category::InformationDisclosure,
        r"debug\s*=\s*True",
        "Debug mode enabled",
    ),
    (
        Category::InformationDisclosure,
        r"print\s*\([^)]*password",
        "Password in debug output",
    ),
    (
        Category::InformationDisclosure,
        r"console\.log\s*\([^)]*token",
        "Token in console output",
    ),
];

/// Process-wide rule registry. Built once at startup, immutable thereafter,
/// and shared by reference across concurrent file scans.
#[derive(Debug)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    /// Compile the built-in pattern tables.
    pub fn builtin() -> Result<Ruleset, RuleError> {
        let mut rules = Vec::with_capacity(PATTERNS.len());
        for (category, pattern, message) in PATTERNS {
            let compiled = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    category: category.tag(),
                    source,
                })?;
            rules.push(Rule {
                category: *category,
                pattern: compiled,
                message,
            });
        }
        Ok(Ruleset { rules })
    }

    /// All rules, in fixed registration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules for one category, in registration order. Unknown categories
    /// simply yield nothing.
    pub fn rules_for(&self, category: Category) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.category == category)
    }

    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }
}
