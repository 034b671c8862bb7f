//! Configuration types for an SGPA run.
//!
//! All run behaviour is controlled through [`SgpaConfig`], built via its
//! [`SgpaConfigBuilder`]. The model handle is part of the config rather than
//! process-wide state: tests and embedding applications pass their own
//! [`VisionModel`] and nothing else in the crate reaches for a global client.

use crate::error::SgpaError;
use crate::output::Stage;
use crate::pipeline::llm::VisionModel;
use crate::progress::ProgressCallback;
use crate::prompts;
use crate::template::PromptTemplate;
use std::fmt;
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for one SGPA run.
///
/// Built via [`SgpaConfig::builder()`] or using [`SgpaConfig::default()`].
///
/// # Example
/// ```rust
/// use gradesheet_sgpa::SgpaConfig;
///
/// let config = SgpaConfig::builder()
///     .model("gpt-4.1")
///     .max_tokens(512)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SgpaConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`] or `EDGEQUAKE_MODEL`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `vision_model`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed model handle. Takes precedence over `provider_name`.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Sampling temperature for every call. Default: 0.1.
    ///
    /// Transcribing a grade sheet wants the model faithful to what it sees,
    /// not creative.
    pub temperature: f32,

    /// Output cap applied to all three calls. Default: `Some(1024)`.
    ///
    /// One bound for every call: the aggregation reply lists every matched
    /// subject plus the sums, and is the longest of the three; 1024 tokens
    /// covers a forty-subject sheet. `None` leaves the provider default.
    pub max_tokens: Option<usize>,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL uploads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Run the two extraction calls concurrently. Default: false.
    ///
    /// The extractions are independent, so this only changes latency. In the
    /// default sequential mode a failed grades call means the credits call is
    /// never sent; in parallel mode both may already be in flight.
    pub parallel_extraction: bool,

    /// Instruction sent with the result-sheet image.
    pub grades_prompt: PromptTemplate,

    /// Instruction sent with the credits-sheet image.
    pub credits_prompt: PromptTemplate,

    /// Aggregation instruction with `{grades}`, `{credits}` and optionally
    /// `{grade_scale}` placeholders.
    pub aggregation_prompt: PromptTemplate,

    /// Optional progress callback for per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SgpaConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            vision_model: None,
            temperature: 0.1,
            max_tokens: Some(1024),
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            parallel_extraction: false,
            grades_prompt: prompts::default_template(Stage::GradesExtraction),
            credits_prompt: prompts::default_template(Stage::CreditsExtraction),
            aggregation_prompt: prompts::default_template(Stage::Aggregation),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SgpaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SgpaConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field(
                "vision_model",
                &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("parallel_extraction", &self.parallel_extraction)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl SgpaConfig {
    /// Create a new builder for `SgpaConfig`.
    pub fn builder() -> SgpaConfigBuilder {
        SgpaConfigBuilder {
            config: Self::default(),
            grades_prompt: None,
            credits_prompt: None,
            aggregation_prompt: None,
        }
    }
}

/// Builder for [`SgpaConfig`].
///
/// Custom prompts are validated in [`SgpaConfigBuilder::build`].
#[derive(Debug)]
pub struct SgpaConfigBuilder {
    config: SgpaConfig,
    grades_prompt: Option<String>,
    credits_prompt: Option<String>,
    aggregation_prompt: Option<String>,
}

impl SgpaConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    /// Send no output cap; the provider default applies.
    pub fn unbounded_output(mut self) -> Self {
        self.config.max_tokens = None;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn parallel_extraction(mut self, v: bool) -> Self {
        self.config.parallel_extraction = v;
        self
    }

    pub fn grades_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.grades_prompt = Some(prompt.into());
        self
    }

    pub fn credits_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.credits_prompt = Some(prompt.into());
        self
    }

    pub fn aggregation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.aggregation_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SgpaConfig, SgpaError> {
        let mut config = self.config;

        if config.max_tokens == Some(0) {
            return Err(SgpaError::InvalidConfig(
                "max_tokens must be ≥ 1 (use unbounded_output() for no cap)".into(),
            ));
        }
        if config.api_timeout_secs == 0 {
            return Err(SgpaError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if config.download_timeout_secs == 0 {
            return Err(SgpaError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }

        if let Some(ref p) = self.grades_prompt {
            config.grades_prompt = prompts::extraction_template(Stage::GradesExtraction, Some(p.as_str()))?;
        }
        if let Some(ref p) = self.credits_prompt {
            config.credits_prompt = prompts::extraction_template(Stage::CreditsExtraction, Some(p.as_str()))?;
        }
        if let Some(ref p) = self.aggregation_prompt {
            config.aggregation_prompt = prompts::aggregation_template(Some(p.as_str()))?;
        }

        Ok(config)
    }
}
