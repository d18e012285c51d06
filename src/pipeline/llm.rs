//! Completion client: one system prompt + one user prompt in, one trimmed
//! completion out.
//!
//! The pipeline talks to the model through the narrow [`CompletionClient`]
//! trait so tests can plug in canned responses. [`ProviderClient`] is the
//! production implementation on top of any `edgequake_llm` provider.
//!
//! Each call is exactly one request. There is no retry or backoff: a failed
//! call is classified into a [`ReportError`] and returned as-is.

use crate::error::ReportError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A chat-completion backend.
pub trait CompletionClient: Send + Sync {
    /// Send `system` + `user` at `temperature` and return the first
    /// completion's text with surrounding whitespace trimmed.
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> impl Future<Output = Result<String, ReportError>> + Send;
}

impl<C: CompletionClient> CompletionClient for Arc<C> {
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> impl Future<Output = Result<String, ReportError>> + Send {
        (**self).complete(system, user, temperature)
    }
}

/// [`CompletionClient`] over an `edgequake_llm` provider.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    max_tokens: Option<usize>,
}

impl ProviderClient {
    /// `label` names the provider in error messages (e.g. "openai").
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("label", &self.label)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl CompletionClient for ProviderClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, ReportError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = build_options(temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_llm_error(&self.label, &e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content.trim().to_string())
    }
}

/// Build `CompletionOptions` for one call.
fn build_options(temperature: f32, max_tokens: Option<usize>) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens,
        ..Default::default()
    }
}

/// Map a provider error message onto the service-error variants.
///
/// Providers report failures as free text, so this goes by well-known
/// status codes and phrases.
pub fn classify_llm_error(provider: &str, message: &str) -> ReportError {
    let lower = message.to_lowercase();
    let provider = provider.to_string();
    let detail = message.to_string();

    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("api key")
        || lower.contains("api_key")
    {
        ReportError::AuthError { provider, detail }
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit")
    {
        ReportError::RateLimitExceeded { provider, detail }
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ReportError::ApiTimeout { provider, detail }
    } else {
        ReportError::LlmApiError {
            message: format!("{provider}: {detail}"),
        }
    }
}
