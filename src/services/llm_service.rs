use crate::api::middleware::AppError;
use crate::config::LlmConfig;
use crate::models::{Credentials, SchemaDescription, TranslateRequest};
use crate::services::schema_service::SchemaIntrospector;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message used whenever the provider gives us nothing better
pub const GENERIC_PROVIDER_ERROR: &str = "Error processing data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorMessage {
    message: String,
}

/// Language-model collaborator
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, AppError>;
}

/// Chat completions over HTTP, OpenAI wire format
pub struct OpenAiProvider {
    api_url: String,
    http_client: HttpClient,
}

impl OpenAiProvider {
    /// Build the HTTP client once, with the bearer key as a default header.
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Language model API key is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = HttpClient::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for the language model")?;

        Ok(Self {
            api_url: config.api_url.clone(),
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, AppError> {
        let response = self
            .http_client
            .post(&self.api_url)
            .json(request)
            .send()
            .await.map_err(|e| {
            tracing::error!("Failed to call language model at {}: {}", self.api_url, e);
            AppError::Provider {
                status: None,
                message: GENERIC_PROVIDER_ERROR.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Language model returned {}: {}", status, body);

            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| GENERIC_PROVIDER_ERROR.to_string());

            return Err(AppError::Provider {
                status: Some(status.as_u16()),
                message,
            });
        }

        response.json::<ChatCompletionResponse>().await.map_err(|e| {
            tracing::error!("Failed to parse language model response: {}", e);
            AppError::Provider {
                status: None,
                message: GENERIC_PROVIDER_ERROR.to_string(),
            }
        })
    }
}

/// Turns a natural-language request into a SQL statement for the target database
pub struct TranslationService {
    introspector: SchemaIntrospector,
    provider: Arc<dyn CompletionProvider>,
    model: String,
    max_tokens: u32,
}

impl TranslationService {
    pub fn new(
        introspector: SchemaIntrospector,
        provider: Arc<dyn CompletionProvider>,
        config: &LlmConfig,
    ) -> Self {
        Self {
            introspector,
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Validate a wire request, then translate it
    pub async fn translate_request(&self, request: TranslateRequest) -> Result<String, AppError> {
        let user_intent = request
            .user_intent
            .filter(|intent| !intent.trim().is_empty())
            .ok_or_else(|| AppError::Validation("userIntent is required".to_string()))?;
        let credentials = request
            .credentials
            .ok_or_else(|| AppError::Validation("credentials are required".to_string()))?
            .validate()?;

        self.translate(&user_intent, &credentials).await
    }

    /// Returns the model's first answer verbatim. The text is not checked
    /// for being SQL.
    pub async fn translate(&self, user_intent: &str, credentials: &Credentials) -> Result<String, AppError> {
        let schema = self.introspector.introspect(credentials).await?;
        let request = self.build_request(user_intent, credentials, &schema);

        tracing::info!(
            "Translating request for {} database {} ({} tables) with {}",
            credentials.engine,
            credentials.database,
            schema.tables().len(),
            self.model
        );

        let response = self.provider.complete(&request).await?;

        response.first_content().map(str::to_string).ok_or_else(|| {
            tracing::error!("Language model response contained no choices");
            AppError::Provider {
                status: None,
                message: GENERIC_PROVIDER_ERROR.to_string(),
            }
        })
    }

    pub fn build_request(
        &self,
        user_intent: &str,
        credentials: &Credentials,
        schema: &SchemaDescription,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(build_prompt(credentials, schema)),
                ChatMessage::user(user_intent),
            ],
            max_tokens: self.max_tokens,
        }
    }
}

/// System instructions for the model: target dialect, schema and database name
pub fn build_prompt(credentials: &Credentials, schema: &SchemaDescription) -> String {
    let engine = credentials.engine.as_str();
    format!(
        "You are an AI assistant that translates natural language instructions into {engine} commands. \
         Using the provided database schema {schema}, identify the appropriate tables and columns to construct the {engine} command. \
         Respond only with the {engine} command, without any additional text, comments or markdown code fences. \
         Ensure that timestamps follow this format for applicable columns and database types: TIMESTAMP DEFAULT CURRENT_TIMESTAMP. \
         The database name is {database}.",
        engine = engine,
        schema = schema.render(),
        database = credentials.database,
    )
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Replies with fixed text or a fixed failure, keeping every request it saw
    pub(crate) struct FakeProvider {
        outcome: Result<String, (Option<u16>, String)>,
        requests: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl FakeProvider {
        pub fn replying(content: &str) -> Self {
            Self {
                outcome: Ok(content.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(status: Option<u16>, message: &str) -> Self {
            Self {
                outcome: Err((status, message.to_string())),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<ChatCompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionProvider for FakeProvider {
        async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.outcome {
                Ok(content) => Ok(serde_json::from_value(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
                .unwrap()),
                Err((status, message)) => Err(AppError::Provider {
                    status: *status,
                    message: message.clone(),
                }),
            }
        }
    }
}
