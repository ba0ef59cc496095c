mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_check_urls, run_compare, run_diff_urls, run_report};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr; stdout carries the command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Run(run_args) => {
            run_compare(&raw_args, args.config, args.verbose, run_args).await
        }
        Commands::Report(report_args) => run_report(args.config, report_args).await,
        Commands::CheckUrls(check_args) => {
            run_check_urls(&raw_args, args.config, check_args).await
        }
        Commands::DiffUrls(diff_args) => run_diff_urls(diff_args).await,
    }
}
