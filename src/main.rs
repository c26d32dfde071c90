mod auth;
mod baseline;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod records;
mod regression;
mod stats;
mod store;
mod vcs;

use clap::Parser;
use cli::{Cli, Outcome};
use log::info;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting citrend");

    match cli.execute().await {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::Regressions) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
