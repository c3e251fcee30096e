use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::models::{ModelDescriptor, Provider};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Text generation behind one call shape, whatever the provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &ModelDescriptor,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Generation>;
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

pub struct LlmClient {
    client: Client,
    anthropic_api_key: Option<String>,
    openai_api_key: Option<String>,
    anthropic_url: String,
    openai_url: String,
}

impl LlmClient {
    pub fn new(
        anthropic_api_key: Option<String>,
        openai_api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            anthropic_api_key,
            openai_api_key,
            anthropic_url: ANTHROPIC_API_URL.to_string(),
            openai_url: OPENAI_API_URL.to_string(),
        })
    }

    /// Point the client at other endpoints, e.g. a proxy.
    pub fn with_endpoints(mut self, anthropic_url: String, openai_url: String) -> Self {
        self.anthropic_url = anthropic_url;
        self.openai_url = openai_url;
        self
    }

    async fn generate_with_anthropic(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Generation> {
        let api_key = self.anthropic_api_key.as_deref().ok_or_else(|| {
            AppError::Generation("anthropic_api_key is not configured".to_string())
        })?;

        let request = AnthropicRequest {
            model,
            max_tokens,
            system: system_prompt,
            messages: vec![Message {
                role: "user",
                content: user_prompt,
            }],
        };

        let response = self
            .client
            .post(&self.anthropic_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::Generation(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        let message: AnthropicResponse = response.json().await?;

        let text = message
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| AppError::Generation("No text content in response".to_string()))?;

        Ok(Generation {
            text,
            input_tokens: message.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: message.usage.as_ref().and_then(|u| u.output_tokens),
        })
    }

    async fn generate_with_openai(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Generation> {
        let api_key = self.openai_api_key.as_deref().ok_or_else(|| {
            AppError::Generation("openai_api_key is not configured".to_string())
        })?;

        let request = OpenAiRequest {
            model,
            max_tokens,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.openai_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::Generation(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let completion: OpenAiResponse = response.json().await?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Generation("No content in response".to_string()))?;

        Ok(Generation {
            text,
            input_tokens: completion.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: completion.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        model: &ModelDescriptor,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Generation> {
        match model.provider {
            Provider::Anthropic => {
                self.generate_with_anthropic(model.api_model, system_prompt, user_prompt, max_tokens)
                    .await
            }
            Provider::OpenAi => {
                self.generate_with_openai(model.api_model, system_prompt, user_prompt, max_tokens)
                    .await
            }
        }
    }
}
