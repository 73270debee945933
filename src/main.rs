// main.rs
mod ai_provider;
mod cli;
mod config;
mod core;
mod engine;
mod narrator;
mod shell;

use clap::Parser;
use colored::*;

use cli::{Args, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Play {
            data_dir,
            provider,
            model,
        } => {
            if let Err(e) = shell::handle_play(data_dir, provider, model).await {
                eprintln!("{}: {}", "Session error".red().bold(), e);
                std::process::exit(1);
            }
        }
        Commands::Simulate { seed, duration } => {
            if let Err(e) = cli::handle_simulate(seed, duration) {
                eprintln!("{}: {}", "Simulation error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}
