//! facegate: liveness screening and face matching for attendance captures.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, ExitCode};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::Error.into();
        }
    };

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Liveness(args) => commands::liveness::run(args, &config, &mut stdout).await,
        Commands::Enroll(args) => commands::enroll::run(args, &config, &mut stdout).await,
        Commands::Verify(args) => commands::verify::run(args, &config, &mut stdout).await,
        Commands::Compare(args) => commands::compare::run(args, &config, &mut stdout),
        Commands::Encode(args) => commands::encode::run(args, &mut stdout),
    };

    match result {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error.into()
        }
    }
}
