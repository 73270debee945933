use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AIProvider {
    Gemini,
    Ollama,
}

impl std::fmt::Display for AIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AIProvider::Gemini => write!(f, "gemini"),
            AIProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for AIProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(AIProvider::Gemini),
            "ollama" => Ok(AIProvider::Ollama),
            _ => Err(anyhow!("Unknown AI provider: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIConfig {
    pub provider: AIProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for AIConfig {
    fn default() -> Self {
        AIConfig {
            provider: AIProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(2048),
            temperature: Some(0.7),
        }
    }
}

pub struct AIProviderClient {
    config: AIConfig,
    http_client: reqwest::Client,
}

impl AIProviderClient {
    pub fn new(config: AIConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        AIProviderClient {
            config,
            http_client,
        }
    }

    /// Single-turn text generation. With `json_output` the provider is
    /// asked to answer in JSON; the caller still validates the payload.
    pub async fn generate(&self, prompt: &str, json_output: bool) -> Result<String> {
        match self.config.provider {
            AIProvider::Gemini => self.generate_gemini(prompt, json_output).await,
            AIProvider::Ollama => self.generate_ollama(prompt, json_output).await,
        }
    }

    async fn generate_gemini(&self, prompt: &str, json_output: bool) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key required"))?;

        let mut generation_config = serde_json::json!({
            "temperature": self.config.temperature,
            "maxOutputTokens": self.config.max_tokens,
        });
        if json_output {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }

        let request_body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": generation_config,
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.config.model
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_json: serde_json::Value = response.json().await?;

        let content = response_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid Gemini response format"))?
            .to_string();

        Ok(content)
    }

    async fn generate_ollama(&self, prompt: &str, json_output: bool) -> Result<String> {
        let default_url = "http://localhost:11434".to_string();
        let base_url = self.config.base_url.as_ref().unwrap_or(&default_url);

        let mut request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false
        });
        if json_output {
            request_body["format"] = serde_json::json!("json");
        }

        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let response_json: serde_json::Value = response.json().await?;

        let content = response_json["response"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid Ollama response format"))?
            .to_string();

        Ok(content)
    }

    pub fn get_model(&self) -> &str {
        &self.config.model
    }

    pub fn get_provider(&self) -> &AIProvider {
        &self.config.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        let provider: AIProvider = "gemini".parse().unwrap();
        assert!(matches!(provider, AIProvider::Gemini));

        let provider: AIProvider = "Ollama".parse().unwrap();
        assert!(matches!(provider, AIProvider::Ollama));

        assert!("claude".parse::<AIProvider>().is_err());
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let client = AIProviderClient::new(AIConfig::default());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(client.generate("hello", false));
        assert!(result.is_err());
    }
}
