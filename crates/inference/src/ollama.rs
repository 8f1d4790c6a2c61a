use async_trait::async_trait;
use pinplace_core::prompt::build_generation_prompt;
use pinplace_core::{ClassifiedIntent, IntentError, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::IntentClassifier;

const PROVIDER: &str = "ollama";
const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Local Ollama text generation in JSON mode. The generated text must itself
/// be the intent object.
#[derive(Debug, Clone)]
pub struct OllamaClassifier {
    client: Client,
    base: Url,
    model: String,
}

impl OllamaClassifier {
    pub fn new(client: Client, base: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            base,
            model: model.into(),
        }
    }

    pub fn request_body(&self, system_prompt: &str, message: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": build_generation_prompt(system_prompt, message),
            "stream": false,
            "format": "json",
            "options": {
                "temperature": TEMPERATURE,
                "top_p": TOP_P,
            }
        })
    }

    async fn generate(&self, system_prompt: &str, message: &str) -> Result<String, ProviderError> {
        let url = self
            .base
            .join("api/generate")
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;

        let response = self
            .client
            .post(url)
            .json(&self.request_body(system_prompt, message))
            .send()
            .await
            .map_err(|err| ProviderError::transport(PROVIDER, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err))?;
        Ok(body.response)
    }
}

#[async_trait]
impl IntentClassifier for OllamaClassifier {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn classify(
        &self,
        system_prompt: &str,
        message: &str,
    ) -> Result<ClassifiedIntent, IntentError> {
        let generated = self.generate(system_prompt, message).await?;
        ClassifiedIntent::from_json(&generated).inspect_err(|err| {
            debug!(model = %self.model, error = %err, raw = %generated, "model reply failed schema check");
        })
    }
}
