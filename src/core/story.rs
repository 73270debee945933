use serde::{Deserialize, Serialize};

use super::error::ContentError;

/// Which story beat a generation request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeContext {
    Intro,
    Climax,
}

impl std::fmt::Display for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeContext::Intro => write!(f, "intro"),
            NodeContext::Climax => write!(f, "climax"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryOption {
    pub label: String,
    pub value: String,
}

impl StoryOption {
    pub fn new(label: &str, value: &str) -> Self {
        StoryOption {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// One narrative beat: a paragraph plus exactly two options. Replaced
/// wholesale on every fetch, never merged with prior content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryContent {
    pub narrative: String,
    pub options: Vec<StoryOption>,
}

/// Analysis text substituted when the final generation call fails.
pub const ANALYSIS_FALLBACK: &str =
    "Data corruption detected. Unable to generate psychological profile.";

impl StoryContent {
    /// Parse raw generator output. Anything that is not JSON with a
    /// non-empty narrative and exactly two options is rejected.
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        let content: StoryContent = serde_json::from_str(raw)?;
        if content.narrative.trim().is_empty() {
            return Err(ContentError::EmptyNarrative);
        }
        if content.options.len() != 2 {
            return Err(ContentError::OptionCount(content.options.len()));
        }
        Ok(content)
    }

    pub fn fallback_for(context: NodeContext) -> Self {
        match context {
            NodeContext::Intro => Self::intro_fallback(),
            NodeContext::Climax => Self::climax_fallback(),
        }
    }

    pub fn intro_fallback() -> Self {
        StoryContent {
            narrative: "Critical Alert: Hull breach detected in Sector 4. \
                        Systems are failing rapidly."
                .to_string(),
            options: vec![
                StoryOption::new("Seal the Bulkheads", "defensive"),
                StoryOption::new("Reroute Power to Shields", "offensive"),
            ],
        }
    }

    pub fn climax_fallback() -> Self {
        StoryContent {
            narrative: "The reactor stabilizes, but the intruder is still on board."
                .to_string(),
            options: vec![
                StoryOption::new("Confront Intruder", "confront"),
                StoryOption::new("Lockdown Command Deck", "lockdown"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_node() {
        let raw = r#"{
            "narrative": "The corridor lights flicker out.",
            "options": [
                {"label": "Hold position", "value": "hold"},
                {"label": "Advance", "value": "advance"}
            ]
        }"#;

        let content = StoryContent::parse(raw).unwrap();
        assert_eq!(content.narrative, "The corridor lights flicker out.");
        assert_eq!(content.options.len(), 2);
        assert_eq!(content.options[0].label, "Hold position");
        assert_eq!(content.options[1].value, "advance");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(StoryContent::parse("systems nominal, no data").is_err());
        assert!(StoryContent::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_option_count() {
        let one = r#"{"narrative": "x", "options": [{"label": "a", "value": "a"}]}"#;
        let err = StoryContent::parse(one).unwrap_err();
        assert!(matches!(err, ContentError::OptionCount(1)));

        let three = r#"{"narrative": "x", "options": [
            {"label": "a", "value": "a"},
            {"label": "b", "value": "b"},
            {"label": "c", "value": "c"}
        ]}"#;
        let err = StoryContent::parse(three).unwrap_err();
        assert!(matches!(err, ContentError::OptionCount(3)));
    }

    #[test]
    fn test_parse_rejects_empty_narrative() {
        let raw = r#"{"narrative": "  ", "options": [
            {"label": "a", "value": "a"},
            {"label": "b", "value": "b"}
        ]}"#;
        assert!(matches!(
            StoryContent::parse(raw),
            Err(ContentError::EmptyNarrative)
        ));
    }

    #[test]
    fn test_fallbacks_are_well_formed() {
        for context in [NodeContext::Intro, NodeContext::Climax] {
            let content = StoryContent::fallback_for(context);
            assert!(!content.narrative.is_empty());
            assert_eq!(content.options.len(), 2);
        }
    }
}
