//! akh-plan CLI: hierarchical task planning.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};

use akh_plan::candidate::{HistoricalSample, PlanRequest};
use akh_plan::config::PlannerConfig;
use akh_plan::engine::PlanningEngine;
use akh_plan::estimate::UnitDescriptor;
use akh_plan::unit::Complexity;

#[derive(Parser)]
#[command(name = "akh-plan", version, about = "Hierarchical task-planning engine")]
struct Cli {
    /// Planner config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a plan from a JSON request and print it as JSON.
    Plan {
        /// Path to the JSON plan request.
        #[arg(long)]
        request: PathBuf,

        /// Planning time in seconds since UNIX epoch (default: now).
        #[arg(long)]
        now: Option<u64>,

        /// Print `{ "plan": ..., "timeline": ... }` instead of the bare plan.
        #[arg(long)]
        timeline: bool,
    },

    /// Estimate hours for a single unit of work.
    Estimate {
        /// Work type, e.g. "refactor" or "security".
        #[arg(long)]
        kind: String,

        /// high, medium or low.
        #[arg(long, default_value = "medium")]
        complexity: String,

        /// Magnitude used with historical samples.
        #[arg(long, default_value = "1.0")]
        scope: f64,

        /// Buffer percentage (default: from config).
        #[arg(long)]
        buffer: Option<f64>,

        /// JSON file with historical samples.
        #[arg(long)]
        samples: Option<PathBuf>,
    },

    /// Print or write the planner config.
    Config {
        /// Write to this path instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    // Logs go to stderr; stdout carries JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    config.validate()?;

    match cli.command {
        Commands::Plan {
            request,
            now,
            timeline,
        } => {
            let content = std::fs::read_to_string(&request).into_diagnostic()?;
            let request: PlanRequest = serde_json::from_str(&content).into_diagnostic()?;

            let engine = PlanningEngine::new(config);
            let outcome = match now {
                Some(now) => engine.plan_at(&request, now)?,
                None => engine.plan(&request)?,
            };

            let json = if timeline {
                serde_json::to_string_pretty(&outcome).into_diagnostic()?
            } else {
                outcome.plan.to_json().into_diagnostic()?
            };
            println!("{json}");
        }

        Commands::Estimate {
            kind,
            complexity,
            scope,
            buffer,
            samples,
        } => {
            let complexity = Complexity::from_label(&complexity)
                .ok_or_else(|| miette!("unknown complexity \"{complexity}\", expected high, medium or low"))?;
            let samples: Vec<HistoricalSample> = match samples {
                Some(path) => {
                    let content = std::fs::read_to_string(&path).into_diagnostic()?;
                    serde_json::from_str(&content).into_diagnostic()?
                }
                None => Vec::new(),
            };

            let engine = PlanningEngine::new(config);
            let buffer = buffer.unwrap_or(engine.config().buffer_percent);
            let descriptor = UnitDescriptor::new(&kind)
                .with_complexity(complexity)
                .with_scope(scope);
            let hours = engine.estimator().estimate(&descriptor, &samples, buffer);
            println!("{hours:.1}");
        }

        Commands::Config { output } => {
            let toml = config.to_toml().map_err(|e| miette!(e))?;
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("Wrote planner config to {}", path.display());
                }
                None => print!("{toml}"),
            }
        }
    }

    Ok(())
}
