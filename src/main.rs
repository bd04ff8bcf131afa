use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskbook::{api, config::Config, mcp, store::Workspace, validation};

#[derive(Parser)]
#[command(name = "tbk")]
#[command(about = "Validated hierarchical task store for AI-assisted development")]
struct Cli {
    /// Tasks document (overrides TASKS_FILE_PATH)
    #[arg(long, global = true)]
    tasks_file: Option<PathBuf>,

    /// Definitions document (overrides DEFINITIONS_FILE_PATH)
    #[arg(long, global = true)]
    definitions_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server via stdio
    Mcp,
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Check both documents on disk and exit non-zero if they have errors
    Validate,
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "taskbook=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // stdout is the protocol channel
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, None | Some(Commands::Mcp));
    init_tracing(use_stderr);

    let config = Config::from_env().with_overrides(cli.tasks_file, cli.definitions_file);

    match cli.command {
        Some(Commands::Serve { port }) => {
            let workspace = Workspace::open(&config)?;
            let app = api::create_router(workspace);

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("Taskbook API listening on http://127.0.0.1:{}", port);

            axum::serve(listener, app).await?;
        }
        Some(Commands::Validate) => {
            return validate_files(&config);
        }
        Some(Commands::Mcp) | None => {
            let workspace = Workspace::open(&config)?;
            mcp::run_stdio_server(workspace).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Validate the raw files so structural problems are listed, not fatal.
fn validate_files(config: &Config) -> anyhow::Result<ExitCode> {
    let tasks = read_json(&config.tasks_file)?;
    let definitions = read_json(&config.definitions_file)?;
    let report = validation::validate_project(&tasks, &definitions);

    for finding in &report.errors {
        println!("error   {}: {}", finding.location, finding.message);
    }
    for finding in &report.warnings {
        println!("warning {}: {}", finding.location, finding.message);
    }
    println!(
        "{} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    );

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// A missing or empty file reads as an empty object.
fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if text.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}
