use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Result, SessionError};
use super::profile::{Role, UserProfile};
use super::story::{NodeContext, StoryContent, ANALYSIS_FALLBACK};

/// Which screen is active. Progression is strictly forward; a full
/// reset is the only way back to Splash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Splash,
    Briefing,
    TeamSelect,
    StoryNodeIntro,
    Simulation,
    StoryNodeClimax,
    Analysis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Splash => write!(f, "splash"),
            Stage::Briefing => write!(f, "briefing"),
            Stage::TeamSelect => write!(f, "team_select"),
            Stage::StoryNodeIntro => write!(f, "story_node_intro"),
            Stage::Simulation => write!(f, "simulation"),
            Stage::StoryNodeClimax => write!(f, "story_node_climax"),
            Stage::Analysis => write!(f, "analysis"),
        }
    }
}

/// Accumulated record of the session's narrative progress. Fields fill
/// in strictly in declaration order and are only cleared by a reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioState {
    pub first_choice: Option<String>,
    pub simulation_score: u8,
    pub second_choice: Option<String>,
    pub feedback: Option<String>,
}

/// Proof that a generation request was issued against the current
/// session. A reset invalidates all outstanding tickets, so results
/// that arrive late are discarded instead of corrupting the new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
}

/// The scenario state machine. All transitions are synchronous; the
/// awaited generation calls happen between a `begin_*` and its matching
/// `apply_*`, with the ticket carrying the session epoch across the gap.
#[derive(Debug, Clone)]
pub struct Session {
    stage: Stage,
    profile: UserProfile,
    scenario: ScenarioState,
    story: Option<StoryContent>,
    loading: bool,
    epoch: u64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            stage: Stage::Splash,
            profile: UserProfile::default(),
            scenario: ScenarioState::default(),
            story: None,
            loading: false,
            epoch: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn scenario(&self) -> &ScenarioState {
        &self.scenario
    }

    pub fn story(&self) -> Option<&StoryContent> {
        self.story.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn start_experience(&mut self) -> Result<()> {
        self.require_stage(Stage::Splash, "start_experience")?;
        self.stage = Stage::Briefing;
        Ok(())
    }

    pub fn acknowledge_briefing(&mut self) -> Result<()> {
        self.require_stage(Stage::Briefing, "acknowledge_briefing")?;
        self.stage = Stage::TeamSelect;
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.require_stage(Stage::TeamSelect, "set_name")?;
        self.profile.name = name.trim().to_string();
        Ok(())
    }

    pub fn select_role(&mut self, role: Role) -> Result<()> {
        self.require_stage(Stage::TeamSelect, "select_role")?;
        self.profile.role = role;
        Ok(())
    }

    /// Lock the profile in and request the intro narrative. Rejected
    /// while the name is empty; the stage does not move until the
    /// result is applied.
    pub fn begin_confirm_team(&mut self) -> Result<GenerationTicket> {
        self.require_stage(Stage::TeamSelect, "confirm_team")?;
        self.require_idle()?;
        if self.profile.name.is_empty() {
            return Err(SessionError::NameRequired);
        }
        self.loading = true;
        Ok(self.ticket())
    }

    /// Install the intro story node, or the fixed fallback when the
    /// generation attempt produced nothing usable.
    pub fn apply_intro(
        &mut self,
        ticket: GenerationTicket,
        outcome: Option<StoryContent>,
    ) -> Result<()> {
        self.check_ticket(ticket)?;
        if self.stage != Stage::TeamSelect || !self.loading {
            return Err(SessionError::NoRequestPending);
        }
        self.story = Some(outcome.unwrap_or_else(|| {
            tracing::warn!(context = %NodeContext::Intro, "substituting fallback story node");
            StoryContent::fallback_for(NodeContext::Intro)
        }));
        self.stage = Stage::StoryNodeIntro;
        self.loading = false;
        Ok(())
    }

    pub fn choose_first_option(&mut self, label: &str) -> Result<()> {
        self.require_stage(Stage::StoryNodeIntro, "choose_first_option")?;
        self.require_idle()?;
        self.scenario.first_choice = Some(label.to_string());
        self.stage = Stage::Simulation;
        Ok(())
    }

    /// Record the stabilization score and request the climax narrative.
    pub fn begin_simulation_complete(&mut self, score: u8) -> Result<GenerationTicket> {
        self.require_stage(Stage::Simulation, "simulation_complete")?;
        self.require_idle()?;
        self.scenario.simulation_score = score.min(100);
        self.loading = true;
        Ok(self.ticket())
    }

    pub fn apply_climax(
        &mut self,
        ticket: GenerationTicket,
        outcome: Option<StoryContent>,
    ) -> Result<()> {
        self.check_ticket(ticket)?;
        if self.stage != Stage::Simulation || !self.loading {
            return Err(SessionError::NoRequestPending);
        }
        self.story = Some(outcome.unwrap_or_else(|| {
            tracing::warn!(context = %NodeContext::Climax, "substituting fallback story node");
            StoryContent::fallback_for(NodeContext::Climax)
        }));
        self.stage = Stage::StoryNodeClimax;
        self.loading = false;
        Ok(())
    }

    /// Record the final choice and request the performance analysis.
    pub fn begin_final_choice(&mut self, label: &str) -> Result<GenerationTicket> {
        self.require_stage(Stage::StoryNodeClimax, "choose_second_option")?;
        self.require_idle()?;
        self.scenario.second_choice = Some(label.to_string());
        self.loading = true;
        Ok(self.ticket())
    }

    /// Install the analysis text verbatim, or the fixed fallback string.
    pub fn apply_analysis(&mut self, ticket: GenerationTicket, outcome: Option<String>) -> Result<()> {
        self.check_ticket(ticket)?;
        if self.stage != Stage::StoryNodeClimax || !self.loading {
            return Err(SessionError::NoRequestPending);
        }
        self.scenario.feedback = Some(outcome.unwrap_or_else(|| {
            tracing::warn!("substituting fallback analysis");
            ANALYSIS_FALLBACK.to_string()
        }));
        self.stage = Stage::Analysis;
        self.loading = false;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Clear everything and return to Splash. Valid from any stage.
    /// Outstanding generation tickets die with the old epoch.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Session::new();
        self.epoch = epoch;
    }

    fn ticket(&self) -> GenerationTicket {
        GenerationTicket { epoch: self.epoch }
    }

    fn check_ticket(&self, ticket: GenerationTicket) -> Result<()> {
        if ticket.epoch != self.epoch {
            return Err(SessionError::StaleResult);
        }
        Ok(())
    }

    fn require_stage(&self, expected: Stage, action: &'static str) -> Result<()> {
        if self.stage != expected {
            return Err(SessionError::InvalidStage {
                action,
                stage: self.stage,
            });
        }
        Ok(())
    }

    fn require_idle(&self) -> Result<()> {
        if self.loading {
            return Err(SessionError::RequestPending);
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
