use anyhow::Result;

use crate::ai_provider::AIProviderClient;
use crate::core::{NodeContext, ScenarioState, UserProfile};

/// The narrative-generation capability consumed by the session engine.
/// Kept behind a trait so tests can script outcomes, including failures.
#[allow(async_fn_in_trait)]
pub trait Narrator {
    /// Returns raw text expected to parse as a story node. The caller
    /// owns validation and the fallback policy.
    async fn generate_story_node(
        &self,
        profile: &UserProfile,
        previous_choice: Option<&str>,
        context: NodeContext,
    ) -> Result<String>;

    /// Returns free-form analysis text, used verbatim.
    async fn generate_analysis(
        &self,
        profile: &UserProfile,
        scenario: &ScenarioState,
    ) -> Result<String>;
}

pub fn story_prompt(
    profile: &UserProfile,
    previous_choice: Option<&str>,
    context: NodeContext,
) -> String {
    match context {
        NodeContext::Intro => format!(
            "You are the Game Master for a high-stakes sci-fi crisis simulation.\n\
             The user is {}, a {}.\n\
             Write a short, intense narrative paragraph (max 60 words) setting up \
             a critical situation on a failing space station.\n\
             The core is becoming unstable.\n\
             Provide 2 distinct, high-stakes tactical options for the user to proceed.\n\
             Format the output purely as JSON: \
             {{ \"narrative\": \"...\", \"options\": [{{\"label\": \"...\", \"value\": \"...\"}}] }}",
            profile.name, profile.role
        ),
        NodeContext::Climax => format!(
            "The user chose: \"{}\".\n\
             Now, the reactor stabilization sequence has just finished.\n\
             Write a climax narrative paragraph (max 60 words) describing the outcome \
             based on that choice.\n\
             The situation is critical.\n\
             Provide 2 final ethical or strategic options to resolve the story.\n\
             Format the output purely as JSON: \
             {{ \"narrative\": \"...\", \"options\": [{{\"label\": \"...\", \"value\": \"...\"}}] }}",
            previous_choice.unwrap_or("no recorded action")
        ),
    }
}

pub fn analysis_prompt(profile: &UserProfile, scenario: &ScenarioState) -> String {
    format!(
        "Act as a senior training officer in a futuristic simulation.\n\
         Analyze the performance of Trainee {} ({}).\n\n\
         Data:\n\
         - Initial Tactic: {}\n\
         - Simulation Efficiency: {}%\n\
         - Final Decision: {}\n\n\
         Provide a 3-paragraph psychological and strategic evaluation.\n\
         1. Analyze their initial instinct.\n\
         2. Evaluate their ability to handle pressure (simulation score).\n\
         3. Judge their final resolution.\n\n\
         Tone: Professional, stern but constructive, immersive.",
        profile.name,
        profile.role,
        scenario.first_choice.as_deref().unwrap_or("none"),
        scenario.simulation_score,
        scenario.second_choice.as_deref().unwrap_or("none"),
    )
}

/// Narrator backed by a live AI provider.
pub struct ServiceNarrator {
    client: AIProviderClient,
}

impl ServiceNarrator {
    pub fn new(client: AIProviderClient) -> Self {
        ServiceNarrator { client }
    }
}

impl Narrator for ServiceNarrator {
    async fn generate_story_node(
        &self,
        profile: &UserProfile,
        previous_choice: Option<&str>,
        context: NodeContext,
    ) -> Result<String> {
        let prompt = story_prompt(profile, previous_choice, context);
        tracing::debug!(%context, model = self.client.get_model(), "requesting story node");
        self.client.generate(&prompt, true).await
    }

    async fn generate_analysis(
        &self,
        profile: &UserProfile,
        scenario: &ScenarioState,
    ) -> Result<String> {
        let prompt = analysis_prompt(profile, scenario);
        tracing::debug!(model = self.client.get_model(), "requesting analysis");
        self.client.generate(&prompt, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;

    fn profile() -> UserProfile {
        UserProfile {
            name: "Rho".to_string(),
            role: Role::Specialist,
        }
    }

    #[test]
    fn test_intro_prompt_carries_profile() {
        let prompt = story_prompt(&profile(), None, NodeContext::Intro);
        assert!(prompt.contains("Rho"));
        assert!(prompt.contains("Specialist"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn test_climax_prompt_carries_previous_choice() {
        let prompt = story_prompt(&profile(), Some("Seal the Bulkheads"), NodeContext::Climax);
        assert!(prompt.contains("Seal the Bulkheads"));
        assert!(prompt.contains("2 final"));
    }

    #[test]
    fn test_analysis_prompt_carries_scenario() {
        let scenario = ScenarioState {
            first_choice: Some("Seal the Bulkheads".to_string()),
            simulation_score: 87,
            second_choice: Some("confront".to_string()),
            feedback: None,
        };
        let prompt = analysis_prompt(&profile(), &scenario);
        assert!(prompt.contains("Trainee Rho"));
        assert!(prompt.contains("87%"));
        assert!(prompt.contains("confront"));
    }
}
