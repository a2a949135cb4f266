//! # Configuration Renderer
//!
//! Command-line tool that loads configuration files and environment variables,
//! merges and resolves them, and prints the result. Useful for checking what an
//! application will actually see before starting it.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use tasker_config::logging::{init_structured_logging, log_error};
use tasker_config::{ChangeEvent, Config, DotenvVariables, LoaderOptions};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Parser)]
#[command(name = "config-render")]
#[command(about = "Load, merge and resolve configuration, then print the result")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file or directory; repeat to layer, later paths win
    #[arg(short, long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Environment variable prefix to load after the files (repeatable)
    #[arg(short = 'p', long = "env-prefix", value_name = "PREFIX")]
    env_prefixes: Vec<String>,

    /// Print only the value at this key path
    #[arg(short, long)]
    key: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// `.env` file consulted for placeholder variables
    #[arg(long, value_name = "PATH")]
    dotenv: Option<PathBuf>,

    /// Keep running and print every change of the selected value
    #[arg(short, long)]
    watch: bool,

    /// Use the structured (environment-driven) logging setup
    #[arg(long)]
    structured_logs: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.structured_logs {
        init_structured_logging();
    } else {
        let level = match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let _subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    if let Err(e) = run(&cli).await {
        log_error("config-render", "render", &format!("{e:#}"), None);
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut options = LoaderOptions::from_env().context("invalid TASKER_CONFIG_* settings")?;
    options.env_prefixes.extend(cli.env_prefixes.iter().cloned());
    if cli.dotenv.is_some() {
        options.dotenv_path = cli.dotenv.clone();
    }

    let mut builder = Config::builder().with_options(options.clone());
    for path in &cli.files {
        builder = builder.with_file(path);
    }
    if let Some(path) = &options.dotenv_path {
        let variables = DotenvVariables::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        builder = builder.with_variables(variables);
    }

    let config = builder.build().context("failed to configure loader")?;
    config.load().await.context("failed to load configuration")?;

    let key = cli.key.as_deref().unwrap_or("");
    let value = config.value(key)?;
    println!("{}", render(value.raw(), cli.format)?);

    if !cli.watch {
        return Ok(());
    }

    info!(key = %key, "Watching for configuration changes");
    let mut changes = config.subscribe(key);
    loop {
        tokio::select! {
            event = changes.recv() => match event {
                Some(event) => print_change(&event, cli.format)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    config.close();
    Ok(())
}

fn print_change(event: &ChangeEvent, format: OutputFormat) -> anyhow::Result<()> {
    let label = if event.path.is_empty() { "<root>" } else { event.path.as_str() };
    println!("# version {} changed {}", event.version, label);
    match &event.current {
        Some(current) => println!("{}", render(current, format)?),
        None => println!("# removed"),
    }
    Ok(())
}

fn render(value: &Value, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
    })
}
