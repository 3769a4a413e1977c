use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .vulnscan.toml.
///
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// External analyzer settings
    #[serde(default)]
    pub semgrep: SemgrepSection,

    /// Scan behavior settings
    #[serde(default)]
    pub analysis: AnalysisSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemgrepSection {
    /// Whether to run semgrep at all. CLI --no-semgrep overrides this.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Executable name or path. If None, falls back to the SEMGREP_PATH
    /// env var, then plain "semgrep".
    pub executable: Option<String>,

    /// Per-invocation timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for SemgrepSection {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisSection {
    /// Cap on files analyzed concurrently during a directory scan
    pub max_parallel_files: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from .vulnscan.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".vulnscan.toml");
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if config.semgrep.executable.is_none() {
            if let Ok(exe) = std::env::var("SEMGREP_PATH") {
                config.semgrep.executable = Some(exe);
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the semgrep executable: config file value takes precedence,
    /// falls back to the SEMGREP_PATH env var, then the bare command name.
    pub fn semgrep_executable(&self) -> String {
        self.semgrep
            .executable
            .clone()
            .or_else(|| std::env::var("SEMGREP_PATH").ok())
            .unwrap_or_else(|| "semgrep".to_string())
    }
}
