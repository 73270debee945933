use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::config::Config;
use crate::core::{NodeContext, Role, Session, StoryContent};
use crate::narrator::Narrator;

/// Record appended to the report log when a session reaches Analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub name: String,
    pub role: Role,
    pub first_choice: Option<String>,
    pub simulation_score: u8,
    pub second_choice: Option<String>,
    pub feedback: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives the scenario state machine through its three generation
/// round-trips. Every call is bounded by the request timeout and any
/// failure resolves into the call-site fallback; the session is never
/// left stalled in a loading state.
pub struct SessionEngine<N: Narrator> {
    session: Session,
    narrator: N,
    request_timeout: Duration,
    reports_file: Option<PathBuf>,
}

impl<N: Narrator> SessionEngine<N> {
    pub fn new(narrator: N, config: &Config) -> Self {
        Self::with_settings(
            narrator,
            Duration::from_secs(config.request_timeout_secs),
            Some(config.reports_file()),
        )
    }

    pub fn with_settings(
        narrator: N,
        request_timeout: Duration,
        reports_file: Option<PathBuf>,
    ) -> Self {
        SessionEngine {
            session: Session::new(),
            narrator,
            request_timeout,
            reports_file,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// TeamSelect → StoryNodeIntro, via the intro generation call.
    pub async fn confirm_team(&mut self) -> Result<()> {
        let ticket = self.session.begin_confirm_team()?;
        let outcome = self.request_story_node(None, NodeContext::Intro).await;
        self.session.apply_intro(ticket, outcome)?;
        Ok(())
    }

    /// Simulation → StoryNodeClimax, via the climax generation call.
    pub async fn complete_simulation(&mut self, score: u8) -> Result<()> {
        let ticket = self.session.begin_simulation_complete(score)?;
        let previous = self.session.scenario().first_choice.clone();
        let outcome = self.request_story_node(previous, NodeContext::Climax).await;
        self.session.apply_climax(ticket, outcome)?;
        Ok(())
    }

    /// StoryNodeClimax → Analysis, via the analysis generation call.
    pub async fn choose_second_option(&mut self, label: &str) -> Result<()> {
        let ticket = self.session.begin_final_choice(label)?;
        let outcome = self.request_analysis().await;
        self.session.apply_analysis(ticket, outcome)?;

        if let Err(e) = self.write_report() {
            tracing::warn!(error = %e, "failed to write session report");
        }
        Ok(())
    }

    async fn request_story_node(
        &self,
        previous_choice: Option<String>,
        context: NodeContext,
    ) -> Option<StoryContent> {
        let call = self.narrator.generate_story_node(
            self.session.profile(),
            previous_choice.as_deref(),
            context,
        );
        let raw = match timeout(self.request_timeout, call).await {
            Err(_) => {
                tracing::warn!(%context, "story generation timed out");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(%context, error = %e, "story generation failed");
                return None;
            }
            Ok(Ok(raw)) => raw,
        };

        match StoryContent::parse(&raw) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(%context, error = %e, "story generation returned malformed content");
                None
            }
        }
    }

    async fn request_analysis(&self) -> Option<String> {
        let call = self
            .narrator
            .generate_analysis(self.session.profile(), self.session.scenario());
        match timeout(self.request_timeout, call).await {
            Err(_) => {
                tracing::warn!("analysis generation timed out");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "analysis generation failed");
                None
            }
            Ok(Ok(text)) => Some(text),
        }
    }

    fn write_report(&self) -> Result<()> {
        let Some(path) = &self.reports_file else {
            return Ok(());
        };

        let scenario = self.session.scenario();
        let report = SessionReport {
            name: self.session.profile().name.clone(),
            role: self.session.profile().role,
            first_choice: scenario.first_choice.clone(),
            simulation_score: scenario.simulation_score,
            second_choice: scenario.second_choice.clone(),
            feedback: scenario.feedback.clone(),
            started_at: self.session.started_at(),
            finished_at: self.session.finished_at().unwrap_or_else(Utc::now),
        };

        let mut reports: Vec<SessionReport> = if path.exists() {
            let content =
                std::fs::read_to_string(path).context("Failed to read reports file")?;
            serde_json::from_str(&content).context("Failed to parse reports file")?
        } else {
            Vec::new()
        };

        reports.push(report);

        let content =
            serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?;
        std::fs::write(path, content).context("Failed to write reports file")?;

        Ok(())
    }
}
