//! Model gateway: the three agent operations plus the connectivity probe

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{CredentialSource, EffectiveSettings};
use crate::error::ProviderError;
use crate::openai::{CompletionRequest, OpenAiClient};
use crate::parser::extract_array;
use crate::prompts::PromptSet;

const PROBE_PROMPT: &str = "Say this is a test";
const PROBE_MAX_TOKENS: u32 = 7;

/// Text-completion capability the agent loop is driven by
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Minimal request used only to validate the credential
    async fn probe(&self) -> Result<(), ProviderError>;

    async fn fetch_initial_tasks(&self, name: &str, goal: &str) -> Result<Vec<String>, ProviderError>;

    async fn execute_task(&self, name: &str, goal: &str, task: &str) -> Result<String, ProviderError>;

    async fn fetch_followup_tasks(
        &self,
        goal: &str,
        pending: &[String],
        last_task: &str,
        last_result: &str,
        completed: &[String],
    ) -> Result<Vec<String>, ProviderError>;
}

/// Gateway over an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    client: OpenAiClient,
    settings: EffectiveSettings,
    prompts: PromptSet,
}

impl OpenAiGateway {
    pub fn new(client: OpenAiClient, settings: EffectiveSettings, prompts: PromptSet) -> Self {
        Self {
            client,
            settings,
            prompts,
        }
    }

    pub fn credential(&self) -> CredentialSource {
        self.settings.credential
    }

    pub fn settings(&self) -> &EffectiveSettings {
        &self.settings
    }

    async fn complete(&self, prompt: String) -> Result<String, ProviderError> {
        let request = CompletionRequest::prompt(&self.settings.model, prompt, self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        self.client.complete(&self.settings.api_key, &request).await
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn probe(&self) -> Result<(), ProviderError> {
        let request = CompletionRequest::prompt(&self.settings.model, PROBE_PROMPT, 0.0)
            .with_max_tokens(PROBE_MAX_TOKENS);
        self.client.complete(&self.settings.api_key, &request).await?;
        info!(model = %self.settings.model, "Credential probe succeeded");
        Ok(())
    }

    async fn fetch_initial_tasks(&self, name: &str, goal: &str) -> Result<Vec<String>, ProviderError> {
        let output = self.complete(self.prompts.start_goal(name, goal)).await?;
        let tasks = extract_array(&output);
        debug!(count = tasks.len(), "Parsed initial tasks");
        Ok(tasks)
    }

    async fn execute_task(&self, name: &str, goal: &str, task: &str) -> Result<String, ProviderError> {
        self.complete(self.prompts.execute_task(name, goal, task)).await
    }

    async fn fetch_followup_tasks(
        &self,
        goal: &str,
        pending: &[String],
        last_task: &str,
        last_result: &str,
        completed: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        let prompt = self
            .prompts
            .create_tasks(goal, pending, last_task, last_result, completed);
        let output = self.complete(prompt).await?;
        let tasks = extract_array(&output);
        debug!(count = tasks.len(), "Parsed follow-up tasks");
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{bearer_token, body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(credential: CredentialSource) -> EffectiveSettings {
        EffectiveSettings {
            api_key: "sk-test".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.9,
            max_tokens: 750,
            credential,
        }
    }

    fn gateway_for(server: &MockServer) -> OpenAiGateway {
        let client = OpenAiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        OpenAiGateway::new(client, settings(CredentialSource::User), PromptSet::new())
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    #[tokio::test]
    async fn test_probe_uses_minimal_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "max_tokens": 7,
                "temperature": 0.0,
                "messages": [{"role": "user", "content": "Say this is a test"}]
            })))
            .respond_with(reply("This is a test"))
            .expect(1)
            .mount(&server)
            .await;

        gateway_for(&server).probe().await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_failure_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = gateway_for(&server).probe().await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized { status: 401 }));
    }

    #[tokio::test]
    async fn test_initial_tasks_are_parsed_from_prose() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "gpt-3.5-turbo", "temperature": 0.9})))
            .respond_with(reply(r#"Here you go: ["Book a venue", "Order a cake"]"#))
            .mount(&server)
            .await;

        let tasks = gateway_for(&server)
            .fetch_initial_tasks("TaskPilot", "Plan a birthday party")
            .await
            .unwrap();
        assert_eq!(tasks, vec!["Book a venue", "Order a cake"]);
    }

    #[tokio::test]
    async fn test_unparseable_followups_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("Nothing else to do."))
            .mount(&server)
            .await;

        let tasks = gateway_for(&server)
            .fetch_followup_tasks("Goal", &[], "Task", "Result", &["Task".to_string()])
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_execute_returns_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("The venue is booked."))
            .mount(&server)
            .await;

        let result = gateway_for(&server)
            .execute_task("TaskPilot", "Plan", "Book a venue")
            .await
            .unwrap();
        assert_eq!(result, "The venue is booked.");
    }
}
