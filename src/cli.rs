use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use crate::core::{RandomNoise, SimulationTuning, StabilizationSim};

#[derive(Parser)]
#[command(name = "aether-crisis")]
#[command(about = "Interactive tactical training simulation", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive training session
    Play {
        /// Data directory for config and reports
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// AI provider (gemini, ollama)
        #[arg(long)]
        provider: Option<String>,
        /// Model name override
        #[arg(long)]
        model: Option<String>,
    },
    /// Run the stabilization loop unattended and print the score
    Simulate {
        /// Seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,
        /// Countdown budget in seconds
        #[arg(long)]
        duration: Option<u32>,
    },
}

/// Headless stabilization run: no manual input, both cadences stepped
/// from one loop at full speed.
pub fn handle_simulate(seed: Option<u64>, duration: Option<u32>) -> Result<()> {
    let mut tuning = SimulationTuning::default();
    if let Some(secs) = duration {
        tuning.duration_secs = secs;
    }

    let ticks_per_sec = (1000 / tuning.tick_interval_ms).max(1) as u32;
    let mut noise = match seed {
        Some(seed) => RandomNoise::seeded(seed),
        None => RandomNoise::from_entropy(),
    };

    let mut sim = StabilizationSim::new(tuning);
    sim.start();
    while !sim.is_finished() {
        for _ in 0..ticks_per_sec {
            sim.tick(&mut noise);
            if sim.is_finished() {
                break;
            }
        }
        sim.second();
    }

    let score = sim.emit_score().unwrap_or(0);
    println!("{}", "Stabilization sequence complete".cyan().bold());
    println!("Score: {}/100", score.to_string().white().bold());
    println!(
        "Final integrity: {:.0}%  Time remaining: {}s",
        sim.stability(),
        sim.remaining_secs()
    );

    Ok(())
}
