//! Generation parameters and model identity/capability metadata.
//!
//! These are provider-agnostic: a [`Parameters`] value is attached to every
//! [`LLMRequest`](crate::llm::LLMRequest), and every [`LanguageModel`](crate::llm::LanguageModel)
//! reports a [`Profile`] describing whichever model it is currently backed by.

use alloc::string::String;

/// Sampling and generation parameters for a single request.
///
/// Providers that don't support a given knob simply ignore it; there is no
/// capability negotiation at this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Sampling temperature, if the provider supports it.
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Ask the provider to surface its reasoning trace as
    /// [`Event::Reasoning`](crate::llm::Event::Reasoning) events, for models that support it.
    pub include_reasoning: bool,
    /// Set by [`LanguageModel::generate`](crate::llm::LanguageModel::generate) once a JSON
    /// schema has been appended to the request; providers with native structured-output
    /// support should branch on this instead of re-deriving it from the messages.
    pub structured_outputs: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            temperature: None,
            top_p: None,
            max_tokens: None,
            include_reasoning: false,
            structured_outputs: false,
        }
    }
}

impl Parameters {
    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    /// Sets the nucleus sampling threshold.
    #[must_use]
    pub fn top_p(mut self, value: f32) -> Self {
        self.top_p = Some(value);
        self
    }

    /// Caps the number of tokens generated.
    #[must_use]
    pub fn max_tokens(mut self, value: u32) -> Self {
        self.max_tokens = Some(value);
        self
    }

    /// Requests (or suppresses) the model's reasoning trace.
    #[must_use]
    pub fn include_reasoning(mut self, value: bool) -> Self {
        self.include_reasoning = value;
        self
    }
}

/// Identity and capability metadata for whichever model is currently
/// selected, returned by [`LanguageModel::profile`](crate::llm::LanguageModel::profile).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    provider: String,
    name: String,
    model_id: String,
    description: String,
    context_window: usize,
}

impl Profile {
    /// Builds a profile. `provider` is the backend's short id (e.g.
    /// `"openai"`), `name` a human label, `model_id` the wire identifier
    /// sent to the provider, and `context_window` the token budget the
    /// caller should plan compression around.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        model_id: impl Into<String>,
        description: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            model_id: model_id.into(),
            description: description.into(),
            context_window,
        }
    }

    /// The backend's short provider id.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Human-readable model label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire identifier sent to the provider's API.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The model's context window, in tokens.
    #[must_use]
    pub const fn context_window(&self) -> usize {
        self.context_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_builder_sets_fields() {
        let params = Parameters::default().temperature(0.2).max_tokens(512).include_reasoning(true);
        assert_eq!(params.temperature, Some(0.2));
        assert_eq!(params.max_tokens, Some(512));
        assert!(params.include_reasoning);
        assert!(!params.structured_outputs);
    }

    #[test]
    fn profile_exposes_its_fields() {
        let profile = Profile::new("openai", "GPT-4o", "gpt-4o", "Flagship model", 128_000);
        assert_eq!(profile.provider(), "openai");
        assert_eq!(profile.model_id(), "gpt-4o");
        assert_eq!(profile.context_window(), 128_000);
    }
}
