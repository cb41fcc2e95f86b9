use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "hypr-lint")]
#[command(about = "Dockerfile linter", long_about = None)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint Dockerfiles
    Check(commands::check::CheckArgs),

    /// List the rule catalog
    Rules(commands::rules::RulesArgs),
}

/// Logs go to stderr. `HYPR_LINT_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "hypr_lint_core=debug,hypr_lint=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("HYPR_LINT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let success = match cli.command {
        Commands::Check(args) => commands::check::check(args)?,
        Commands::Rules(args) => {
            commands::rules::rules(args)?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
