//! Model interaction: build requests and call the provider.
//!
//! The pipeline only needs one call shape — a prompt, at most one image, an
//! optional output cap, one text reply — so it talks to the provider through
//! the small [`VisionModel`] trait rather than `LLMProvider` directly. The
//! production implementation is [`ProviderModel`]; tests substitute a stub
//! that records requests.
//!
//! There is no retry: a failed call is fatal for the submission and the
//! caller aborts the remaining stages.

use crate::config::SgpaConfig;
use crate::error::SgpaError;
use crate::output::{AggregationResult, ExtractionResult, Stage, StageStats};
use crate::pipeline::encode::EncodedImagePayload;
use crate::prompts::render_aggregation;
use crate::template::PromptTemplate;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// One request to the model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// The stage issuing the call, for logging and error attribution.
    pub stage: Stage,
    /// User-turn text.
    pub prompt: String,
    /// Image attached to the user turn, for extraction calls.
    pub image: Option<EncodedImagePayload>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// The model's answer.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl ModelReply {
    /// A reply with no token accounting.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Why a model call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Credential rejected.
    Auth(String),
    /// Anything else: network, rate limit, bad request, provider outage.
    Api(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Auth(m) => write!(f, "authentication failed: {m}"),
            ModelError::Api(m) => f.write_str(m),
        }
    }
}

impl std::error::Error for ModelError {}

/// A chat-completion endpoint that accepts an optional image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, ModelError>;
}

/// [`VisionModel`] backed by an edgequake-llm provider.
#[derive(Clone)]
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ProviderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderModel")
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
        let messages = build_messages(&request);
        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(ModelReply {
                content: response.content,
                prompt_tokens: response.prompt_tokens,
                completion_tokens: response.completion_tokens,
            }),
            Err(e) => Err(classify_provider_error(&e.to_string())),
        }
    }
}

/// One user turn: the prompt, plus the image for extraction calls.
fn build_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    match &request.image {
        Some(image) => vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![image.to_image_data()],
        )],
        None => vec![ChatMessage::user(request.prompt.as_str())],
    }
}

/// Providers report auth failures in prose; look for the usual markers.
fn classify_provider_error(message: &str) -> ModelError {
    let lower = message.to_ascii_lowercase();
    let auth_markers = [
        "401",
        "403",
        "unauthorized",
        "forbidden",
        "invalid api key",
        "invalid_api_key",
        "incorrect api key",
        "authentication",
    ];
    if auth_markers.iter().any(|m| lower.contains(m)) {
        ModelError::Auth(message.to_string())
    } else {
        ModelError::Api(message.to_string())
    }
}

/// Issue one call, bounded by `api_timeout_secs`, mapping failures to
/// [`SgpaError`] tagged with the request's stage.
async fn call_model(
    model: &dyn VisionModel,
    request: ModelRequest,
    config: &SgpaConfig,
) -> Result<(ModelReply, StageStats), SgpaError> {
    let stage = request.stage;
    let start = Instant::now();

    let outcome = timeout(
        Duration::from_secs(config.api_timeout_secs),
        model.complete(request),
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let reply = match outcome {
        Err(_) => {
            warn!("{stage}: no reply after {}s", config.api_timeout_secs);
            return Err(SgpaError::ApiTimeout {
                stage,
                secs: config.api_timeout_secs,
            });
        }
        Ok(Err(ModelError::Auth(detail))) => {
            warn!("{stage}: credential rejected");
            return Err(SgpaError::AuthError { stage, detail });
        }
        Ok(Err(ModelError::Api(message))) => {
            warn!("{stage}: call failed — {message}");
            return Err(SgpaError::LlmApiError { stage, message });
        }
        Ok(Ok(reply)) => reply,
    };

    debug!(
        "{stage}: {} input tokens, {} output tokens, {}ms",
        reply.prompt_tokens, reply.completion_tokens, duration_ms
    );
    let stats = StageStats {
        input_tokens: reply.prompt_tokens,
        output_tokens: reply.completion_tokens,
        duration_ms,
    };
    Ok((reply, stats))
}

/// Read subject/value pairs out of one image.
///
/// `template.stage()` decides whether this is the grades or the credits
/// call. The reply is returned exactly as received.
pub async fn extract(
    model: &dyn VisionModel,
    payload: EncodedImagePayload,
    template: &PromptTemplate,
    config: &SgpaConfig,
) -> Result<ExtractionResult, SgpaError> {
    let stage = template.stage();
    info!("{stage}: sending {} image ({} bytes base64)", payload.slot(), payload.base64().len());

    let request = ModelRequest {
        stage,
        prompt: template.as_str().to_string(),
        image: Some(payload),
        max_tokens: config.max_tokens,
        temperature: Some(config.temperature),
    };
    let (reply, stats) = call_model(model, request, config).await?;

    Ok(ExtractionResult {
        stage,
        text: reply.content,
        stats,
    })
}

/// Combine the two extraction texts into the final SGPA text.
///
/// Grades are interpolated first, credits second, both verbatim.
pub async fn aggregate(
    model: &dyn VisionModel,
    grades: &str,
    credits: &str,
    template: &PromptTemplate,
    config: &SgpaConfig,
) -> Result<AggregationResult, SgpaError> {
    let prompt = render_aggregation(template, grades, credits);
    info!("{}: sending {} chars of extracted text", Stage::Aggregation, prompt.len());

    let request = ModelRequest {
        stage: Stage::Aggregation,
        prompt,
        image: None,
        max_tokens: config.max_tokens,
        temperature: Some(config.temperature),
    };
    let (reply, stats) = call_model(model, request, config).await?;

    Ok(AggregationResult {
        text: reply.content,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{aggregation_template, extraction_template};
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<ModelRequest>>,
        reply: Result<ModelReply, ModelError>,
    }

    #[async_trait]
    impl VisionModel for Echo {
        async fn complete(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    struct Stall;

    #[async_trait]
    impl VisionModel for Stall {
        async fn complete(&self, _request: ModelRequest) -> Result<ModelReply, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ModelReply::default())
        }
    }

    #[test]
    fn classifies_auth_errors() {
        assert!(matches!(
            classify_provider_error("HTTP 401 Unauthorized"),
            ModelError::Auth(_)
        ));
        assert!(matches!(
            classify_provider_error("Incorrect API key provided: sk-***"),
            ModelError::Auth(_)
        ));
        assert!(matches!(
            classify_provider_error("connection refused"),
            ModelError::Api(_)
        ));
    }

    #[test]
    fn text_only_request_has_no_images() {
        let req = ModelRequest {
            stage: Stage::Aggregation,
            prompt: "sum it".into(),
            image: None,
            max_tokens: None,
            temperature: None,
        };
        assert_eq!(build_messages(&req).len(), 1);
    }

    #[tokio::test]
    async fn aggregate_passes_reply_through_unmodified() {
        let model = Echo {
            seen: Mutex::new(Vec::new()),
            reply: Ok(ModelReply {
                content: "  **SGPA: 8.43**  \n".into(),
                prompt_tokens: 120,
                completion_tokens: 30,
            }),
        };
        let config = SgpaConfig::default();
        let template = aggregation_template(None).unwrap();
        let out = aggregate(&model, "G-TEXT", "C-TEXT", &template, &config)
            .await
            .unwrap();
        assert_eq!(out.text, "  **SGPA: 8.43**  \n");
        assert_eq!(out.stats.input_tokens, 120);
        assert_eq!(out.stats.output_tokens, 30);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].image.is_none());
        assert_eq!(seen[0].max_tokens, config.max_tokens);
    }

    #[tokio::test]
    async fn api_error_is_tagged_with_stage() {
        let model = Echo {
            seen: Mutex::new(Vec::new()),
            reply: Err(ModelError::Api("503 overloaded".into())),
        };
        let template = aggregation_template(None).unwrap();
        let err = aggregate(&model, "g", "c", &template, &SgpaConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Aggregation));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let config = SgpaConfig::builder().api_timeout_secs(1).build().unwrap();
        let template = extraction_template(Stage::GradesExtraction, None).unwrap();
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let upload = crate::pipeline::input::UploadedImage::from_bytes(
            crate::output::UploadSlot::ResultSheet,
            "r.png",
            buf,
        )
        .unwrap();
        let payload = crate::pipeline::encode::encode_image(&upload).unwrap();

        let err = extract(&Stall, payload, &template, &config).await.unwrap_err();
        assert!(matches!(
            err,
            SgpaError::ApiTimeout {
                stage: Stage::GradesExtraction,
                secs: 1
            }
        ));
    }
}
