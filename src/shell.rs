use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::ai_provider::AIProviderClient;
use crate::config::Config;
use crate::core::{RandomNoise, SimulationTuning, StabilizationSim, Stage};
use crate::engine::SessionEngine;
use crate::narrator::{Narrator, ServiceNarrator};

pub async fn handle_play(
    data_dir: Option<PathBuf>,
    provider: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let config = Config::new(data_dir)?;
    let ai_config = config.get_ai_config(provider, model)?;
    println!(
        "{}",
        format!("// uplink: {} ({})", ai_config.provider, ai_config.model).dimmed()
    );

    let narrator = ServiceNarrator::new(AIProviderClient::new(ai_config));
    let tuning = config.simulation.clone();
    let engine = SessionEngine::new(narrator, &config);

    ShellSession::new(engine, tuning).run().await
}

/// Terminal frontend. Owns stdin for the whole session so the staged
/// screens and the real-time loop never compete for input.
pub struct ShellSession<N: Narrator> {
    engine: SessionEngine<N>,
    tuning: SimulationTuning,
    input: Lines<BufReader<Stdin>>,
}

impl<N: Narrator> ShellSession<N> {
    pub fn new(engine: SessionEngine<N>, tuning: SimulationTuning) -> Self {
        ShellSession {
            engine,
            tuning,
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.engine.session().stage() {
                Stage::Splash => self.splash().await?,
                Stage::Briefing => self.briefing().await?,
                Stage::TeamSelect => self.team_select().await?,
                Stage::StoryNodeIntro | Stage::StoryNodeClimax => self.story_node().await?,
                Stage::Simulation => self.simulation().await?,
                Stage::Analysis => {
                    if !self.analysis().await? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    async fn splash(&mut self) -> Result<()> {
        println!();
        println!("{}", "  AETHER CRISIS".white().bold());
        println!(
            "{}",
            "  INTERACTIVE TACTICAL TRAINING SIMULATION".cyan()
        );
        println!();
        self.prompt_enter("[ Press Enter to Initialize Protocol ]")
            .await?;
        self.engine.session_mut().start_experience()?;
        Ok(())
    }

    async fn briefing(&mut self) -> Result<()> {
        println!();
        println!("{}", "MISSION BRIEFING".cyan().bold());
        println!();
        println!("  {} 2142", "Year:".white().bold());
        println!("  {} Deep Space Outpost \"Horizon\"", "Location:".white().bold());
        println!("  {} {}", "Status:".white().bold(), "CRITICAL FAILURE".red().bold());
        println!();
        println!(
            "  Communication with the outpost has ceased. Telemetry indicates a core\n\
             \x20 reactor instability and a potential hostile bio-incursion."
        );
        println!();
        println!(
            "  You are the responding officer. Your decisions will determine the\n\
             \x20 survival of the 300 souls on board. The AI will monitor your\n\
             \x20 psychometric response during the simulation."
        );
        println!();
        self.prompt_enter("[ Press Enter to Acknowledge ]").await?;
        self.engine.session_mut().acknowledge_briefing()?;
        Ok(())
    }

    async fn team_select(&mut self) -> Result<()> {
        use crate::core::Role;

        println!();
        println!("{}", "ESTABLISH IDENTITY".cyan().bold());
        println!();
        for (idx, role) in Role::all().iter().enumerate() {
            println!(
                "  {}. {:<11} {}",
                idx + 1,
                role.to_string().white().bold(),
                role.description().dimmed()
            );
        }
        println!();

        let role = loop {
            let answer = self.prompt("Select role [1-3]:").await?;
            match answer.as_str() {
                "1" => break Role::Commander,
                "2" => break Role::Specialist,
                "3" => break Role::Diplomat,
                _ => println!("{}", "Enter 1, 2 or 3.".yellow()),
            }
        };

        let name = loop {
            let answer = self.prompt("Enter operative name:").await?;
            if answer.is_empty() {
                println!("{}", "Operative name must not be empty.".yellow());
                continue;
            }
            break answer;
        };

        {
            let session = self.engine.session_mut();
            session.select_role(role)?;
            session.set_name(&name)?;
        }

        self.loading_notice();
        self.engine.confirm_team().await?;
        Ok(())
    }

    async fn story_node(&mut self) -> Result<()> {
        let stage = self.engine.session().stage();
        let role = self.engine.session().profile().role;
        let (narrative, labels) = {
            let story = self
                .engine
                .session()
                .story()
                .ok_or_else(|| anyhow!("no story content for {} stage", stage))?;
            let labels: Vec<String> = story.options.iter().map(|o| o.label.clone()).collect();
            (story.narrative.clone(), labels)
        };

        println!();
        println!(
            "{}",
            format!("LIVE FEED // {} EYES ONLY", role).to_uppercase().cyan()
        );
        println!();
        println!("  \"{}\"", narrative.white());
        println!();
        for (idx, label) in labels.iter().enumerate() {
            println!("  {}. {}", idx + 1, label.white().bold());
        }
        println!();

        let choice = loop {
            let answer = self.prompt("Your call [1-2]:").await?;
            match answer.as_str() {
                "1" => break labels[0].clone(),
                "2" => break labels[1].clone(),
                _ => println!("{}", "Enter 1 or 2.".yellow()),
            }
        };

        match stage {
            Stage::StoryNodeIntro => {
                self.engine.session_mut().choose_first_option(&choice)?;
            }
            Stage::StoryNodeClimax => {
                self.loading_notice();
                self.engine.choose_second_option(&choice).await?;
            }
            _ => unreachable!("story_node outside a story stage"),
        }
        Ok(())
    }

    async fn simulation(&mut self) -> Result<()> {
        println!();
        println!("{}", "INTERVENTION REQUIRED".white().bold());
        println!("{}", "Stabilize the reactor core manually.".dimmed());
        println!();
        println!(
            "  The core is fluctuating. Keep the marker inside the green band\n\
             \x20 for {} seconds.",
            self.tuning.duration_secs
        );
        println!(
            "  Commands: {} + Enter to inject coolant, {} + Enter to vent pressure.",
            "i".white().bold(),
            "v".white().bold()
        );
        println!();
        self.prompt_enter("[ Press Enter to Engage Systems ]").await?;

        let score = self.run_stabilization().await?;

        self.loading_notice();
        self.engine.complete_simulation(score).await?;
        Ok(())
    }

    /// The real-time loop: the frame cadence, the one-second countdown
    /// and manual input all run under this single task, and both
    /// schedules stop the moment it returns.
    async fn run_stabilization(&mut self) -> Result<u8> {
        let mut sim = StabilizationSim::new(self.tuning.clone());
        let mut noise = RandomNoise::from_entropy();
        sim.start();

        let mut frame = interval(Duration::from_millis(self.tuning.tick_interval_ms.max(1)));
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut countdown = interval(Duration::from_secs(1));
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both intervals fire immediately on creation; consume those.
        frame.tick().await;
        countdown.tick().await;

        println!("{}", "CRITICAL FLUX DETECTED".red().bold());
        render_hud(&sim);

        let mut input_closed = false;
        while !sim.is_finished() {
            tokio::select! {
                _ = frame.tick() => {
                    sim.tick(&mut noise);
                }
                _ = countdown.tick() => {
                    sim.second();
                    render_hud(&sim);
                }
                line = self.input.next_line(), if !input_closed => {
                    match line?.as_deref().map(str::trim) {
                        Some("i") => sim.inject(),
                        Some("v") => sim.vent(),
                        Some(_) => {}
                        // stdin closed: the sequence plays out unattended
                        None => input_closed = true,
                    }
                }
            }
        }

        render_hud(&sim);
        println!("{}", "SEQUENCE COMPLETE".green().bold());
        let score = sim.emit_score().unwrap_or(0);
        println!("Stabilization efficiency: {}/100", score.to_string().white().bold());

        // Let the result sink in before the story moves on.
        sleep(Duration::from_secs(self.tuning.completion_delay_secs)).await;
        Ok(score)
    }

    async fn analysis(&mut self) -> Result<bool> {
        let session = self.engine.session();
        let scenario = session.scenario();

        println!();
        println!("{}", "PERFORMANCE REVIEW".cyan().bold());
        println!();
        println!(
            "  {} {}/100",
            "Total Score:".white().bold(),
            scenario.simulation_score
        );
        println!(
            "  {} {}",
            "Initial Response:".white().bold(),
            scenario.first_choice.as_deref().unwrap_or("-")
        );
        println!(
            "  {} {}",
            "Final Resolution:".white().bold(),
            scenario.second_choice.as_deref().unwrap_or("-")
        );
        println!();
        println!("{}", "AI OFFICER ASSESSMENT".cyan());
        println!();
        if let Some(feedback) = &scenario.feedback {
            for line in feedback.lines() {
                println!("  {}", line);
            }
        }
        println!();

        let answer = self.prompt("Reset simulation? [y/N]:").await?;
        if answer.eq_ignore_ascii_case("y") {
            self.engine.session_mut().reset();
            Ok(true)
        } else {
            println!("{}", "Uplink closed.".dimmed());
            Ok(false)
        }
    }

    fn loading_notice(&self) {
        println!();
        println!("{}", "PROCESSING NEURAL LINK...".cyan().bold());
    }

    async fn prompt(&mut self, label: &str) -> Result<String> {
        print!("{} ", label.green().bold());
        std::io::stdout().flush()?;
        let line = self
            .input
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("input stream closed"))?;
        Ok(line.trim().to_string())
    }

    async fn prompt_enter(&mut self, label: &str) -> Result<()> {
        self.prompt(label).await?;
        Ok(())
    }
}

fn render_hud(sim: &StabilizationSim) {
    let stability = format!("{:>3.0}%", sim.stability().floor());
    let stability = if sim.stability() < 30.0 {
        stability.red().bold()
    } else {
        stability.white()
    };

    let pressure = format!("{:5.1}", sim.pressure());
    let pressure = if sim.tuning().in_band(sim.pressure()) {
        pressure.green()
    } else {
        pressure.yellow()
    };

    println!(
        "  Integrity {}  {} {}  T-{:02}s",
        stability,
        pressure_bar(sim),
        pressure,
        sim.remaining_secs()
    );
}

fn pressure_bar(sim: &StabilizationSim) -> String {
    const CELLS: usize = 50;
    let tuning = sim.tuning();
    let marker = ((sim.pressure() / 100.0) * (CELLS as f64 - 1.0)).round() as usize;
    let band_low = ((tuning.band_low / 100.0) * CELLS as f64).round() as usize;
    let band_high = ((tuning.band_high / 100.0) * CELLS as f64).round() as usize;

    let mut bar = String::with_capacity(CELLS + 2);
    bar.push('[');
    for cell in 0..CELLS {
        if cell == marker {
            bar.push('#');
        } else if cell >= band_low && cell < band_high {
            bar.push('=');
        } else {
            bar.push('-');
        }
    }
    bar.push(']');
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_bar_marks_band_and_marker() {
        let sim = StabilizationSim::new(SimulationTuning::default());
        let bar = pressure_bar(&sim);

        // 50 cells plus the brackets.
        assert_eq!(bar.len(), 52);
        // Initial pressure sits mid-band.
        assert!(bar.contains('#'));
        assert!(bar.contains('='));
        let marker = bar.find('#').unwrap();
        let band_start = bar.find('=').unwrap();
        let band_end = bar.rfind('=').unwrap();
        assert!(band_start < marker && marker < band_end);
    }
}
