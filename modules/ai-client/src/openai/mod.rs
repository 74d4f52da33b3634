mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use std::time::Duration;

use client::{OpenAiClient, OPENAI_API_URL};

use crate::error::{AiError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible chat completions endpoint restricted to strict
/// structured output.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<OpenAiClient> {
        if self.api_key.trim().is_empty() {
            return Err(AiError::Config("OpenAI API key is empty".into()));
        }
        OpenAiClient::new(&self.api_key, &self.base_url, self.timeout)
    }

    /// Request a strict structured response and return the raw JSON text.
    ///
    /// Callers that need to validate beyond the schema (value ranges, line
    /// limits) parse the returned string themselves.
    pub async fn structured_output(
        &self,
        schema_name: &str,
        schema: serde_json::Value,
        system: &str,
        user: &str,
    ) -> Result<String> {
        let request = types::StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: types::supports_temperature(&self.model).then_some(0.0),
            response_format: types::ResponseFormat {
                format_type: "json_schema",
                json_schema: types::JsonSchemaFormat {
                    name: schema_name.to_string(),
                    strict: true,
                    schema,
                },
            },
        };

        self.client()?.structured_output(&request).await
    }
}
