mod ollama;
mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use pinplace_core::config::InferenceSettings;
use pinplace_core::{ClassifiedIntent, ClassifierKind, IntentError};
use reqwest::Client;

pub use ollama::OllamaClassifier;
pub use rules::RuleIntentClassifier;

/// Turns a user message into a validated intent, or fails.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn classify(
        &self,
        system_prompt: &str,
        message: &str,
    ) -> Result<ClassifiedIntent, IntentError>;
}

pub fn from_settings(settings: &InferenceSettings, client: Client) -> Arc<dyn IntentClassifier> {
    match settings.classifier {
        ClassifierKind::Ollama => Arc::new(OllamaClassifier::new(
            client,
            settings.ollama_url.clone(),
            settings.ollama_model.clone(),
        )),
        ClassifierKind::Rules => Arc::new(RuleIntentClassifier),
    }
}
