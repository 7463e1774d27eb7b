//! CLI binary for running and validating scripted chat flows.
//!
//! Scripts are JSON arrays of steps:
//! `[{"id": "start", "next": "end", "input": "text", "message": "Hi"}, ...]`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scripted_chat_engine::{
    validate, BlockReason, EmailFormat, FlowConfig, FlowEngine, FlowObserver, InputKind, Script,
    Severity, Step, Transition,
};
use scripted_chat_types::ScriptError;

#[derive(Parser)]
#[command(name = "chatflow", version, about = "Run scripted chat flows in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script interactively
    Run {
        /// Path to the script .json file
        script: PathBuf,

        /// Seed a custom variable (repeatable), e.g. --var company=Acme
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Print the recorded results as JSON when the flow ends
        #[arg(long)]
        transcript: bool,
    },

    /// Validate a script .json file
    Validate {
        /// Path to the script .json file
        script: PathBuf,
    },

    /// Show information about a script
    Info {
        /// Path to the script .json file
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the conversation.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Run {
            script,
            vars,
            transcript,
        } => cmd_run(&script, vars.into_iter().collect(), transcript).await,
        Commands::Validate { script } => cmd_validate(&script),
        Commands::Info { script } => cmd_info(&script),
    };

    if let Err(err) = &outcome {
        if err
            .downcast_ref::<ScriptError>()
            .is_some_and(ScriptError::is_author_error)
        {
            eprintln!("Script error: {err}");
            std::process::exit(2);
        }
    }
    outcome
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("variable name is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Read a script file. Email steps get the built-in email validator.
fn load_script(path: &Path) -> anyhow::Result<Script> {
    let source = std::fs::read_to_string(path).map_err(ScriptError::from)?;
    let steps: Vec<Step> = serde_json::from_str(&source).map_err(ScriptError::from)?;
    tracing::debug!(path = %path.display(), steps = steps.len(), "Script loaded");

    let steps = steps
        .into_iter()
        .map(|step| match step.input {
            Some(InputKind::Email) => step.with_before_proceed(EmailFormat),
            _ => step,
        })
        .collect();
    Ok(Script::new(steps)?)
}

/// Turn a line of input into step values. Text and email steps take the
/// whole line; choice steps take comma-separated entries.
fn parse_values(step: &Step, line: &str) -> Vec<Option<String>> {
    let line = line.trim();
    match step.input {
        Some(_) if line.is_empty() => Vec::new(),
        Some(_) => vec![Some(line.to_string())],
        None => line
            .split(',')
            .map(str::trim)
            .filter(|choice| !choice.is_empty())
            .map(|choice| Some(choice.to_string()))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// ConsoleObserver
// ---------------------------------------------------------------------------

struct ConsoleObserver;

impl FlowObserver for ConsoleObserver {
    fn on_new_user_message(&self, values: &[Option<String>]) {
        let shown: Vec<_> = values.iter().map(|v| v.as_deref().unwrap_or("")).collect();
        println!("  you: {}", shown.join(", "));
    }

    fn on_new_step_message(&self, message: &str) {
        println!("\n{message}");
    }

    fn on_continue(&self, next_step: &Step) {
        let hint = match next_step.input {
            Some(InputKind::Text) => "text",
            Some(InputKind::Email) => "email",
            None => "comma-separated choices",
        };
        println!("  [{hint}]");
    }

    fn on_end(&self) {
        println!("\n-- conversation finished --");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_run(
    path: &Path,
    vars: HashMap<String, String>,
    transcript: bool,
) -> anyhow::Result<()> {
    let script = load_script(path)?;
    let config = FlowConfig::new(script)
        .with_variables(vars)
        .with_observer(Arc::new(ConsoleObserver))
        .strict(true);
    let mut engine = FlowEngine::new(config)?;

    engine.start().await;

    let stdin = std::io::stdin();
    while !engine.is_ended() {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            tracing::info!(step = %engine.current_step().id, "Input closed before the flow ended");
            break;
        }

        let values = parse_values(engine.current_step(), &line);
        if let Transition::Blocked(reason) = engine.proceed(values).await? {
            match reason {
                BlockReason::EmptyValues => println!("  (please enter a value)"),
                BlockReason::Validation => println!("  (that doesn't look right, try again)"),
            }
        }
    }

    if transcript {
        println!("{}", serde_json::to_string_pretty(engine.results())?);
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let script = load_script(path)?;
    let diagnostics = validate(&script);

    if diagnostics.is_empty() {
        println!("Script is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(fix) = &diag.fix {
            println!("        fix: {fix}");
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let script = load_script(path)?;

    println!("Steps: {}", script.len());
    println!("Entry: {}", script.entry_step().id);
    match script.terminal_step() {
        Some(end) => println!("End: {}", end.id),
        None => println!("End: (missing)"),
    }

    println!("\nSteps:");
    for step in script.steps() {
        let input = match step.input {
            Some(InputKind::Text) => "text",
            Some(InputKind::Email) => "email",
            None => "choice",
        };
        let next = step.next.as_deref().unwrap_or("-");
        println!("  {} -> {} [{}] {:?}", step.id, next, input, step.message);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
