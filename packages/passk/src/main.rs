//! Command line interface for the pass@k evaluation harness.

use clap::{Parser, Subcommand};
use color_eyre::{Result, Section};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

/// Evaluate LLM-generated code and report pass@k.
#[derive(Parser)]
#[command(name = "passk", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate candidates against their problems' tests.
    Run(cmd::run::Config),

    /// Rebuild the summary from a results CSV or JSON report.
    Report(cmd::report::Config),

    /// Compare an original summary with a refined one.
    Compare(cmd::compare::Config),

    /// Generate candidates by prompting models.
    Generate(cmd::generate::Config),

    /// List the problems in a problem set.
    List(cmd::list::Config),
}

fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout stays clean for reports.
    //
    // Examples:
    // - `PASSK_LOG=debug` to see every execution
    // - `PASSK_LOG=passk::executor=trace` to trace only the executor
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .pretty()
                .with_writer(std::io::stderr)
                .with_filter(
                    EnvFilter::builder()
                        .with_env_var("PASSK_LOG")
                        .with_default_directive(LevelFilter::INFO.into())
                        .from_env_lossy(),
                ),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(config) => cmd::run::main(config),
        Commands::Report(config) => cmd::report::main(config),
        Commands::Compare(config) => cmd::compare::main(config),
        Commands::Generate(config) => cmd::generate::main(config),
        Commands::List(config) => cmd::list::main(config),
    }
    .suggestion("Set `PASSK_LOG=debug` to see each evaluation as it runs.")
}
