use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ai_provider::{AIConfig, AIProvider};
use crate::core::SimulationTuning;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub default_provider: String,
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub simulation: SimulationTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub default_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("aether-crisis")
        });

        // Ensure data directory exists
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let config_path = data_dir.join("config.json");

        // Try to load existing config
        if config_path.exists() {
            let config_str =
                std::fs::read_to_string(&config_path).context("Failed to read config.json")?;

            match serde_json::from_str::<Config>(&config_str) {
                Ok(mut config) => {
                    config.data_dir = data_dir;
                    config.apply_env_keys();
                    return Ok(config);
                }
                Err(e) => {
                    eprintln!("Failed to parse existing config.json: {}", e);
                    eprintln!("Recreating default configuration...");
                }
            }
        }

        // Create default config
        let mut config = Self::default_config(data_dir);
        config.apply_env_keys();

        let json_str =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config")?;
        std::fs::write(&config_path, json_str).context("Failed to write default config.json")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let json_str = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, json_str).context("Failed to write config.json")?;
        Ok(())
    }

    fn default_config(data_dir: PathBuf) -> Self {
        let mut providers = HashMap::new();

        providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                default_model: "gemini-2.5-flash".to_string(),
                host: None,
                api_key: std::env::var("GEMINI_API_KEY").ok(),
            },
        );

        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                default_model: "qwen2.5".to_string(),
                host: Some("http://localhost:11434".to_string()),
                api_key: None,
            },
        );

        Config {
            data_dir,
            default_provider: "gemini".to_string(),
            providers,
            request_timeout_secs: default_request_timeout(),
            simulation: SimulationTuning::default(),
        }
    }

    // Environment variables fill in API keys the file leaves empty.
    fn apply_env_keys(&mut self) {
        if let Some(gemini) = self.providers.get_mut("gemini") {
            if gemini.api_key.as_ref().map_or(true, |key| key.is_empty()) {
                gemini.api_key = std::env::var("GEMINI_API_KEY").ok();
            }
        }
    }

    pub fn get_provider(&self, provider_name: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_name)
    }

    pub fn get_ai_config(
        &self,
        provider: Option<String>,
        model: Option<String>,
    ) -> Result<AIConfig> {
        let provider_name = provider.as_deref().unwrap_or(&self.default_provider);
        let provider_config = self
            .get_provider(provider_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown provider: {}", provider_name))?;

        let ai_provider: AIProvider = provider_name.parse()?;
        let model_name = model.unwrap_or_else(|| provider_config.default_model.clone());

        Ok(AIConfig {
            provider: ai_provider,
            model: model_name,
            api_key: provider_config.api_key.clone(),
            base_url: provider_config.host.clone(),
            max_tokens: Some(2048),
            temperature: Some(0.7),
        })
    }

    pub fn reports_file(&self) -> PathBuf {
        self.data_dir.join("reports.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "aether-crisis-test-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_default_config_roundtrip() {
        let dir = temp_dir("roundtrip");
        let config = Config::new(Some(dir.clone())).unwrap();
        assert_eq!(config.default_provider, "gemini");
        assert!(config.get_provider("ollama").is_some());

        // A second load reads the file written by the first.
        let reloaded = Config::new(Some(dir.clone())).unwrap();
        assert_eq!(reloaded.default_provider, config.default_provider);
        assert_eq!(reloaded.request_timeout_secs, 30);
        assert_eq!(reloaded.simulation.duration_secs, 30);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_ai_config_resolution() {
        let dir = temp_dir("resolution");
        let config = Config::new(Some(dir.clone())).unwrap();

        let ai = config
            .get_ai_config(Some("ollama".to_string()), None)
            .unwrap();
        assert_eq!(ai.model, "qwen2.5");
        assert!(matches!(ai.provider, AIProvider::Ollama));

        let ai = config
            .get_ai_config(Some("ollama".to_string()), Some("llama3".to_string()))
            .unwrap();
        assert_eq!(ai.model, "llama3");

        assert!(config.get_ai_config(Some("hal9000".to_string()), None).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
