mod analysis;
mod config;
mod report;
mod rules;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

use analysis::semgrep::{SemgrepConfig, DEFAULT_TIMEOUT_SECS};
use analysis::{Pipeline, PipelineOptions, DEFAULT_MAX_PARALLEL_FILES};
use report::Report;

/// vulnscan — heuristic static vulnerability scanner. Scans a file,
/// a directory tree, or code piped on stdin, and reports categorized
/// findings with severity buckets, confidence scores, and an overall
/// risk score.
#[derive(Parser, Debug)]
#[command(name = "vulnscan", version, about)]
struct Cli {
    /// File or directory to scan. When omitted, code is read from stdin.
    path: Option<PathBuf>,

    /// Language of stdin input (ignored when scanning a path)
    #[arg(short, long, value_enum, default_value_t = Language::Python)]
    language: Language,

    /// Optional output file path for the JSON report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the external semgrep analysis stage
    #[arg(long)]
    no_semgrep: bool,

    /// Timeout for one semgrep invocation, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

/// Languages accepted for stdin input. Determines the extension of the
/// temporary file handed to subprocess analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Language {
    Python,
    Javascript,
    Java,
    C,
    Cpp,
    Php,
    Ruby,
    Go,
    Rust,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Go => "go",
            Language::Rust => "rust",
        };
        write!(f, "{name}")
    }
}

impl Language {
    fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Javascript => "js",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Php => "php",
            Language::Ruby => "rb",
            Language::Go => "go",
            Language::Rust => "rs",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load()?;

    let timeout_secs = cli
        .timeout
        .or(config.semgrep.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let options = PipelineOptions {
        semgrep_enabled: config.semgrep.enabled && !cli.no_semgrep,
        semgrep: SemgrepConfig {
            executable: config.semgrep_executable(),
            timeout: Duration::from_secs(timeout_secs),
        },
        max_parallel_files: config
            .analysis
            .max_parallel_files
            .unwrap_or(DEFAULT_MAX_PARALLEL_FILES),
    };
    let pipeline = Arc::new(Pipeline::new(options).await?);

    let scan_report = match cli.path {
        Some(ref path) if path.is_dir() => {
            let _span = info_span!("scan", dir = %path.display()).entered();
            info!("scanning directory");
            Report::Directory(pipeline.analyze_directory(path).await?)
        }
        Some(ref path) => {
            let _span = info_span!("scan", file = %path.display()).entered();
            info!("scanning file");
            Report::File(pipeline.analyze_file(path).await?)
        }
        None => {
            info!(language = ?cli.language, "scanning stdin");
            let mut code = String::new();
            std::io::stdin().read_to_string(&mut code)?;
            Report::File(
                pipeline
                    .analyze_source(&code, cli.language.extension(), "<stdin>")
                    .await?,
            )
        }
    };

    report::output(&scan_report, cli.output.as_deref())?;
    info!("done");

    Ok(())
}
