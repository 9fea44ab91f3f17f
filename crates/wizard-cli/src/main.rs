//! Command-line runner for BAIN wizard scripts.
//!
//! Runs a `wizard.txt` against a host profile describing the game install
//! and prints the resulting installation plan.
//!
//! # Usage
//!
//! ```bash
//! # Run interactively, prompting for each page
//! bain-wizard run wizard.txt --host skyrim.json
//!
//! # Replay answers: first page option 1, second page options 0 and 2
//! bain-wizard run wizard.txt --host skyrim.json -s 1 -s 0,2
//!
//! # Accept every page's defaults and emit JSON
//! bain-wizard --format json run wizard.txt --defaults
//!
//! # Ignore unmet version requirements
//! bain-wizard run wizard.txt --defaults --install-anyway
//!
//! # Syntax check only
//! bain-wizard check wizard.txt
//!
//! # Show the script's version requirements against a host
//! bain-wizard requires wizard.txt --host skyrim.json
//!
//! # Persist the default policy and host profile
//! bain-wizard config --policy ask --default-host ~/skyrim.json
//! ```

mod driver;
mod error;
mod format;

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wizard_core::config::WizardConfig;
use wizard_core::engine::{Step, WizardEngine};
use wizard_core::host::{Component, HostProfile};
use wizard_core::parser::parse;
use wizard_core::requirements::{self, RequirementResult};
use wizard_core::OverridePolicy;

use crate::driver::{drive, Answers};
use crate::error::CliError;
use crate::format::{complete_view, requires_view};

/// Runs BAIN wizard scripts and prints the installation plan.
#[derive(Parser)]
#[command(name = "bain-wizard")]
#[command(about = "Run BAIN wizard.txt scripts against a host profile")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Config file to use instead of ~/.bain-wizard/config.json
    #[arg(long, env = "BAIN_WIZARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Write logs to a timestamped file in this directory instead of stderr
    #[arg(long, env = "BAIN_WIZARD_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum PolicyArg {
    Deny,
    Allow,
    Ask,
}

/// A component named in `--allow-for`.
#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ComponentArg {
    Game,
    #[value(alias = "scriptextender")]
    Se,
    #[value(alias = "graphicsextender")]
    Ge,
    #[value(alias = "wryebash")]
    Wb,
}

impl From<ComponentArg> for Component {
    fn from(arg: ComponentArg) -> Self {
        match arg {
            ComponentArg::Game => Component::Game,
            ComponentArg::Se => Component::ScriptExtender,
            ComponentArg::Ge => Component::GraphicsExtender,
            ComponentArg::Wb => Component::WryeBash,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a wizard script and print the installation plan
    Run {
        /// Path to wizard.txt, or - for stdin
        script: String,
        /// Host profile JSON (installed versions, data files, sub-packages)
        #[arg(long, env = "BAIN_WIZARD_HOST")]
        host: Option<PathBuf>,
        /// Answer the next page: comma-separated indices or option names
        #[arg(short, long = "select")]
        select: Vec<String>,
        /// Accept each page's default options when no --select is left
        #[arg(short, long)]
        defaults: bool,
        /// Continue even if version requirements are not met
        #[arg(long)]
        install_anyway: bool,
        /// Requirement override policy (overrides the config file)
        #[arg(long)]
        policy: Option<PolicyArg>,
        /// Components whose unmet requirements may be ignored
        #[arg(long, value_delimiter = ',', ignore_case = true)]
        allow_for: Vec<ComponentArg>,
    },

    /// Check a wizard script for syntax errors
    Check {
        /// Path to wizard.txt, or - for stdin
        script: String,
    },

    /// Show a script's version requirements against a host profile
    Requires {
        /// Path to wizard.txt, or - for stdin
        script: String,
        /// Host profile JSON
        #[arg(long, env = "BAIN_WIZARD_HOST")]
        host: Option<PathBuf>,
    },

    /// Show or update the saved configuration
    Config {
        /// Default requirement override policy
        #[arg(long)]
        policy: Option<PolicyArg>,
        /// Host profile used when --host is not given
        #[arg(long)]
        default_host: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", error_json(&e));
            } else {
                if let CliError::Requirement(results) = &e {
                    print!("{}", requires_view(results));
                }
                eprintln!("Error: {}", e);
            }
            e.exit_code()
        }
    }
}

fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_dir {
        Some(dir) => {
            let name = format!("bain-wizard-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn error_json(e: &CliError) -> serde_json::Value {
    let mut value = serde_json::json!({
        "status": e.status(),
        "error": e.to_string(),
    });
    if let CliError::Requirement(results) = e {
        value["requirements"] = serde_json::json!(results);
    }
    if let CliError::Cancelled(reason) = e {
        value["reason"] = serde_json::json!(reason);
    }
    value
}

fn load_config(cli: &Cli) -> WizardConfig {
    match &cli.config {
        Some(path) => WizardConfig::load_from(path),
        None => WizardConfig::load(),
    }
}

fn read_script(script: &str) -> Result<String, CliError> {
    if script == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        std::fs::read_to_string(script).map_err(|e| CliError::Io(format!("{}: {}", script, e)))
    }
}

fn load_host(host: Option<&Path>, config: &WizardConfig) -> Result<HostProfile, CliError> {
    match host.or(config.default_host_profile.as_deref()) {
        Some(path) => HostProfile::load(path)
            .map_err(|e| CliError::Io(format!("{}: {}", path.display(), e))),
        None => Ok(HostProfile::default()),
    }
}

fn to_policy(arg: PolicyArg) -> OverridePolicy {
    match arg {
        PolicyArg::Deny => OverridePolicy::Deny,
        PolicyArg::Allow => OverridePolicy::Allow,
        PolicyArg::Ask => OverridePolicy::Ask,
    }
}

fn resolve_policy(
    config: &WizardConfig,
    policy: Option<PolicyArg>,
    install_anyway: bool,
    allow_for: &[ComponentArg],
) -> OverridePolicy {
    if install_anyway {
        return OverridePolicy::Allow;
    }
    if !allow_for.is_empty() {
        return OverridePolicy::AllowFor(allow_for.iter().map(|&c| c.into()).collect());
    }
    policy
        .map(to_policy)
        .unwrap_or_else(|| config.override_policy.clone())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli);

    match &cli.command {
        Command::Run {
            script,
            host,
            select,
            defaults,
            install_anyway,
            policy,
            allow_for,
        } => {
            let source = read_script(script)?;
            let host = load_host(host.as_deref(), &config)?;
            let policy = resolve_policy(&config, *policy, *install_anyway, allow_for);
            // Prompts need a terminal on stdin, which a piped script occupies
            let interactive = script != "-" && io::stdin().is_terminal();

            let mut engine = WizardEngine::new(Arc::new(host)).with_policy(policy);
            info!(run_id = %engine.run_id(), script = %script, "running wizard");
            let first = engine.start(&source)?;

            let mut answers = Answers::new(select.clone(), *defaults, interactive);
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let step = if cli.format == OutputFormat::Json {
                drive(&mut engine, first, &mut answers, &mut input, &mut io::stderr())?
            } else {
                drive(&mut engine, first, &mut answers, &mut input, &mut io::stdout())?
            };

            match step {
                Step::Completed(plan) => {
                    if cli.format == OutputFormat::Json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "status": "completed",
                                "run_id": engine.run_id().to_string(),
                                "requirements": engine.requirement_results(),
                                "plan": plan,
                            })
                        );
                    } else {
                        print_unmet(engine.requirement_results());
                        print!("{}", complete_view(&plan));
                    }
                    Ok(())
                }
                Step::Failed(e) => Err(e.into()),
                Step::Cancelled(reason) => Err(CliError::Cancelled(reason)),
                Step::AwaitingSelection(_) | Step::AwaitingOverride(_) => Err(CliError::Runtime(
                    "Wizard stopped before completing".to_string(),
                )),
            }
        }

        Command::Check { script } => {
            let source = read_script(script)?;
            let parsed = parse(&source).map_err(|e| CliError::Parse(e.to_string()))?;
            if cli.format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "statements": parsed.statements.len(),
                        "requirements": parsed.requirements,
                    })
                );
            } else {
                println!(
                    "OK: {} top-level statements, {} version requirements",
                    parsed.statements.len(),
                    parsed.requirements.len()
                );
                for req in &parsed.requirements {
                    println!("  {} >= {}", req.component, req.minimum);
                }
            }
            Ok(())
        }

        Command::Requires { script, host } => {
            let source = read_script(script)?;
            let parsed = parse(&source).map_err(|e| CliError::Parse(e.to_string()))?;
            let host = load_host(host.as_deref(), &config)?;
            let results = requirements::check(&parsed.requirements, &host);
            if !requirements::all_passed(&results) {
                return Err(CliError::Requirement(results));
            }
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "status": "ok", "requirements": results }));
            } else {
                print!("{}", requires_view(&results));
            }
            Ok(())
        }

        Command::Config {
            policy,
            default_host,
        } => {
            let mut config = config;
            let changed = policy.is_some() || default_host.is_some();
            if let Some(policy) = policy {
                config.override_policy = to_policy(*policy);
            }
            if let Some(path) = default_host {
                config.default_host_profile = Some(path.clone());
            }
            if changed {
                match &cli.config {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
            }
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| CliError::Io(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
    }
}

/// Warns about requirements that were bypassed by the override policy.
fn print_unmet(results: &[RequirementResult]) {
    let unmet: Vec<_> = results.iter().filter(|r| !r.passed).cloned().collect();
    if !unmet.is_empty() {
        println!("Installing despite unmet requirements:");
        print!("{}", requires_view(&unmet));
    }
}
