use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use skilltest_core::verdict::DEFAULT_CRITICAL_PHASE;
use skilltest_core::{
    report, Catalog, Policy, ResponseSet, SubstringMatcher, TermMatcher, Validator,
    WordBoundaryMatcher,
};

#[derive(Parser, Debug)]
#[command(
    name = "skilltest",
    about = "Validate agent responses against a phased skill test catalog",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Judge a response set and print the report
    Validate(ValidateArgs),

    /// Print an empty JSON response set for every test in the catalog
    Template(CatalogArgs),

    /// List every test prompt in the catalog
    Prompts(CatalogArgs),

    /// Check a catalog file and the critical phase against it
    CheckCatalog {
        /// Catalog file (YAML or JSON)
        path: PathBuf,

        /// Phase whose critical tests must all pass
        #[arg(long, default_value = DEFAULT_CRITICAL_PHASE)]
        critical_phase: String,
    },
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Catalog file (YAML or JSON); defaults to the built-in nREPL catalog
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// JSON (or .yaml) response set; reads JSON from stdin when omitted
    responses: Option<PathBuf>,

    #[command(flatten)]
    catalog: CatalogArgs,

    /// Phase whose critical tests must all pass
    #[arg(long, default_value = DEFAULT_CRITICAL_PHASE)]
    critical_phase: String,

    /// Pass rate the pooled non-critical phases must reach
    #[arg(long)]
    threshold: Option<f64>,

    /// How terms are compared with responses
    #[arg(long, value_enum, default_value = "substring")]
    matcher: MatcherChoice,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MatcherChoice {
    Substring,
    WordBoundary,
}

impl MatcherChoice {
    fn build(self) -> Box<dyn TermMatcher> {
        match self {
            MatcherChoice::Substring => Box::new(SubstringMatcher),
            MatcherChoice::WordBoundary => Box::new(WordBoundaryMatcher),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Validate(args) => validate(args),
        Command::Template(args) => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            let template = ResponseSet::template(&catalog);
            println!("{}", serde_json::to_string_pretty(&template)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Prompts(args) => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            print!("{}", format_prompts(&catalog));
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckCatalog {
            path,
            critical_phase,
        } => {
            let catalog = load_catalog(Some(path.as_path()))?;
            Policy::new(critical_phase)
                .check_against(&catalog)
                .context("Policy does not fit catalog")?;
            println!(
                "✓ {} ({} phases, {} tests)",
                catalog.name,
                catalog.phases.len(),
                catalog.test_count()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn validate(args: ValidateArgs) -> Result<ExitCode> {
    let catalog = load_catalog(args.catalog.catalog.as_deref())?;
    let policy = build_policy(&args.critical_phase, args.threshold);

    let validator = Validator::new(catalog, policy)
        .context("Policy does not fit catalog")?
        .with_matcher(args.matcher.build());

    let responses = load_responses(args.responses.as_deref())?;
    let result = validator.run(&responses);

    match args.format {
        OutputFormat::Text => println!("{}", report::render(&result)),
        OutputFormat::Json => println!("{}", report::render_json(&result)?),
    }

    Ok(ExitCode::from(report::exit_code(&result)))
}

fn build_policy(critical_phase: &str, threshold: Option<f64>) -> Policy {
    let policy = Policy::new(critical_phase);
    match threshold {
        Some(threshold) => policy.with_pooled_threshold(threshold),
        None => policy,
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let catalog = match path {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => Catalog::nrepl().context("Built-in catalog is invalid")?,
    };

    tracing::info!(
        catalog = %catalog.name,
        phases = catalog.phases.len(),
        tests = catalog.test_count(),
        "Catalog loaded"
    );
    Ok(catalog)
}

fn load_responses(path: Option<&Path>) -> Result<ResponseSet> {
    match path {
        Some(path) => ResponseSet::from_file(path)
            .with_context(|| format!("Failed to load responses from {}", path.display())),
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                eprintln!("Reading JSON responses from stdin (end with Ctrl-D)...");
            }
            ResponseSet::from_reader(stdin.lock()).context("Failed to read responses from stdin")
        }
    }
}

fn format_prompts(catalog: &Catalog) -> String {
    let mut out = String::new();
    for phase in &catalog.phases {
        out.push_str(&format!("{} - {}\n", phase.key, phase.name));
        for test in &phase.tests {
            let marker = if test.criterion.critical {
                " [critical]"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {}{}: {}\n",
                test.key, marker, test.prompt
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    fn validate_args(responses: PathBuf) -> ValidateArgs {
        ValidateArgs {
            responses: Some(responses),
            catalog: CatalogArgs { catalog: None },
            critical_phase: DEFAULT_CRITICAL_PHASE.to_string(),
            threshold: None,
            matcher: MatcherChoice::Substring,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_validate_defaults() {
        let cli = Cli::try_parse_from(["skilltest", "validate", "answers.json"]).unwrap();
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.responses, Some(PathBuf::from("answers.json")));
        assert_eq!(args.critical_phase, "phase2");
        assert_eq!(args.threshold, None);
        assert_eq!(args.matcher, MatcherChoice::Substring);
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_validate_options() {
        let cli = Cli::try_parse_from([
            "skilltest",
            "-vv",
            "validate",
            "--catalog",
            "custom.yaml",
            "--critical-phase",
            "safety",
            "--threshold",
            "0.9",
            "--matcher",
            "word-boundary",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.responses, None);
        assert_eq!(args.catalog.catalog, Some(PathBuf::from("custom.yaml")));
        assert_eq!(args.matcher, MatcherChoice::WordBoundary);
        assert_eq!(args.format, OutputFormat::Json);

        let policy = build_policy(&args.critical_phase, args.threshold);
        assert_eq!(policy.critical_phase, "safety");
        assert_eq!(policy.pooled_threshold, 0.9);
        assert_eq!(policy.critical_pass_rate, 1.0);
    }

    #[test]
    fn test_format_prompts_marks_critical_tests() {
        let catalog = Catalog::nrepl().unwrap();
        let prompts = format_prompts(&catalog);

        assert!(prompts.starts_with("phase1 - Phase 1: Conceptual Understanding Tests\n"));
        assert!(prompts.contains("  unclear-origin [critical]: I see a REPL process on port 12345."));
        assert!(prompts.contains("  port-config: How do I specify a port for nREPL?"));
    }

    #[test]
    fn test_malformed_responses_are_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, "[1]").unwrap();

        let err = load_responses(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().starts_with("Failed to load responses from"));

        assert!(validate(validate_args(path)).is_err());
    }

    #[test]
    fn test_missing_phases_fail_without_erroring() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, r#"{"phase1": {}}"#).unwrap();

        let code = validate(validate_args(path)).unwrap();
        assert_eq!(code, ExitCode::from(report::EXIT_FAILURE));
    }

    #[test]
    fn test_yaml_responses_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.yml");
        fs::write(&path, "phase4:\n  port-config: \"use --port 7888\"\n").unwrap();

        let responses = load_responses(Some(path.as_path())).unwrap();
        assert_eq!(responses.response("phase4", "port-config"), Some("use --port 7888"));
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = load_catalog(None).unwrap();
        assert_eq!(catalog.phases.len(), 6);
    }
}
