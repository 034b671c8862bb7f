//! Entry points: run one submission through the pipeline.
//!
//! A submission is two uploads. [`run_pipeline`] is the core and takes an
//! explicit model handle; the `calculate*` functions resolve inputs and the
//! provider first and then delegate to it.
//!
//! Stage order is fixed: grades extraction, credits extraction, aggregation.
//! Any failure ends the run; there is no partial report.

use crate::config::{SgpaConfig, DEFAULT_MODEL};
use crate::error::SgpaError;
use crate::output::{ExtractionResult, RunStats, SgpaReport, Stage, UploadSlot};
use crate::pipeline::encode::{encode_image, EncodedImagePayload};
use crate::pipeline::input::{resolve_input, UploadedImage};
use crate::pipeline::llm::{self, ProviderModel, VisionModel};
use crate::template::PromptTemplate;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The two uploads of one submission. Either may be missing; the pipeline
/// refuses to start unless both are present.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub result_sheet: Option<UploadedImage>,
    pub credits_sheet: Option<UploadedImage>,
}

impl Submission {
    pub fn new(result_sheet: UploadedImage, credits_sheet: UploadedImage) -> Self {
        Self {
            result_sheet: Some(result_sheet),
            credits_sheet: Some(credits_sheet),
        }
    }

    /// Both uploads, or the first missing slot as an error.
    pub fn into_pair(self) -> Result<(UploadedImage, UploadedImage), SgpaError> {
        let result = self.result_sheet.ok_or(SgpaError::MissingUpload {
            slot: UploadSlot::ResultSheet,
        })?;
        let credits = self.credits_sheet.ok_or(SgpaError::MissingUpload {
            slot: UploadSlot::CreditsSheet,
        })?;
        Ok((result, credits))
    }
}

/// Run the three model calls for one submission.
///
/// Both uploads are decoded and encoded before the first call, so an
/// unreadable credits image is reported without spending a grades call.
pub async fn run_pipeline(
    model: &dyn VisionModel,
    submission: Submission,
    config: &SgpaConfig,
) -> Result<SgpaReport, SgpaError> {
    let total_start = Instant::now();
    let (result_sheet, credits_sheet) = submission.into_pair()?;

    // ── Step 1: Preview & encode ─────────────────────────────────────────
    let encode_start = Instant::now();
    let result_preview = result_sheet.preview()?;
    let credits_preview = credits_sheet.preview()?;
    info!("Result sheet: {}", result_preview);
    info!("Credits sheet: {}", credits_preview);

    let result_payload = encode_image(&result_sheet)?;
    let credits_payload = encode_image(&credits_sheet)?;
    drop((result_sheet, credits_sheet));
    let encode_duration_ms = encode_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(&result_preview, &credits_preview);
    }

    // ── Step 2: Extractions ──────────────────────────────────────────────
    let llm_start = Instant::now();
    let (grades, credits) = if config.parallel_extraction {
        debug!("Running both extractions concurrently");
        tokio::try_join!(
            extract_stage(model, result_payload, &config.grades_prompt, config),
            extract_stage(model, credits_payload, &config.credits_prompt, config),
        )?
    } else {
        let grades = extract_stage(model, result_payload, &config.grades_prompt, config).await?;
        let credits = extract_stage(model, credits_payload, &config.credits_prompt, config).await?;
        (grades, credits)
    };

    // ── Step 3: Aggregation ──────────────────────────────────────────────
    stage_started(config, Stage::Aggregation);
    let aggregation = llm::aggregate(
        model,
        &grades.text,
        &credits.text,
        &config.aggregation_prompt,
        config,
    )
    .await;
    stage_finished(
        config,
        Stage::Aggregation,
        aggregation.as_ref().map(|a| a.text.as_str()),
    );
    let aggregation = aggregation?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stage_stats = [&grades.stats, &credits.stats, &aggregation.stats];
    let stats = RunStats {
        total_input_tokens: stage_stats.iter().map(|s| s.input_tokens as u64).sum(),
        total_output_tokens: stage_stats.iter().map(|s| s.output_tokens as u64).sum(),
        encode_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "SGPA run complete: {} tokens in / {} tokens out, {}ms total",
        stats.total_input_tokens, stats.total_output_tokens, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.total_duration_ms);
    }

    Ok(SgpaReport {
        grades,
        credits,
        aggregation,
        stats,
    })
}

/// Compute an SGPA from two image paths or URLs.
///
/// # Errors
/// [`SgpaError::MissingUpload`] if either input is `None`; no file is read
/// and no model call is made in that case.
pub async fn calculate(
    result_input: Option<&str>,
    credits_input: Option<&str>,
    config: &SgpaConfig,
) -> Result<SgpaReport, SgpaError> {
    let (result_input, credits_input) = require_both(result_input, credits_input)?;
    info!("Starting SGPA run: {} + {}", result_input, credits_input);

    let result_sheet =
        resolve_input(UploadSlot::ResultSheet, result_input, config.download_timeout_secs).await?;
    let credits_sheet =
        resolve_input(UploadSlot::CreditsSheet, credits_input, config.download_timeout_secs).await?;

    let model = resolve_model(config)?;
    run_pipeline(
        model.as_ref(),
        Submission::new(result_sheet, credits_sheet),
        config,
    )
    .await
}

/// Compute an SGPA from image bytes already in memory.
pub async fn calculate_from_bytes(
    result_bytes: Option<&[u8]>,
    credits_bytes: Option<&[u8]>,
    config: &SgpaConfig,
) -> Result<SgpaReport, SgpaError> {
    let (result_bytes, credits_bytes) = require_both(result_bytes, credits_bytes)?;
    let submission = Submission::new(
        UploadedImage::from_bytes(UploadSlot::ResultSheet, "result image", result_bytes.to_vec())?,
        UploadedImage::from_bytes(UploadSlot::CreditsSheet, "credits image", credits_bytes.to_vec())?,
    );
    let model = resolve_model(config)?;
    run_pipeline(model.as_ref(), submission, config).await
}

/// Compute an SGPA and write the three panels as Markdown to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn calculate_to_file(
    result_input: Option<&str>,
    credits_input: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &SgpaConfig,
) -> Result<SgpaReport, SgpaError> {
    let report = calculate(result_input, credits_input, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| SgpaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, report.to_markdown())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(report)
}

/// Synchronous wrapper around [`calculate`].
///
/// Creates a temporary tokio runtime internally.
pub fn calculate_sync(
    result_input: Option<&str>,
    credits_input: Option<&str>,
    config: &SgpaConfig,
) -> Result<SgpaReport, SgpaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SgpaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(calculate(result_input, credits_input, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn require_both<T>(result: Option<T>, credits: Option<T>) -> Result<(T, T), SgpaError> {
    match (result, credits) {
        (Some(r), Some(c)) => Ok((r, c)),
        (None, _) => Err(SgpaError::MissingUpload {
            slot: UploadSlot::ResultSheet,
        }),
        (_, None) => Err(SgpaError::MissingUpload {
            slot: UploadSlot::CreditsSheet,
        }),
    }
}

async fn extract_stage(
    model: &dyn VisionModel,
    payload: EncodedImagePayload,
    template: &PromptTemplate,
    config: &SgpaConfig,
) -> Result<ExtractionResult, SgpaError> {
    let stage = template.stage();
    stage_started(config, stage);
    let result = llm::extract(model, payload, template, config).await;
    stage_finished(config, stage, result.as_ref().map(|r| r.text.as_str()));
    result
}

fn stage_started(config: &SgpaConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_finished(config: &SgpaConfig, stage: Stage, outcome: Result<&str, &SgpaError>) {
    if let Some(ref cb) = config.progress_callback {
        match outcome {
            Ok(text) => cb.on_stage_complete(stage, text),
            Err(e) => cb.on_stage_error(stage, &e.to_string()),
        }
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SgpaError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SgpaError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the model handle, from most-specific to least-specific.
///
/// 1. **Pre-built handle** (`config.vision_model`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — the factory
///    reads the matching API key (`OPENAI_API_KEY`, …) from the environment,
///    where the secrets file has already exported it.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY` present** — OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_model(config: &SgpaConfig) -> Result<Arc<dyn VisionModel>, SgpaError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }
    resolve_provider(config).map(|p| Arc::new(ProviderModel::new(p)) as Arc<dyn VisionModel>)
}

fn resolve_provider(config: &SgpaConfig) -> Result<Arc<dyn LLMProvider>, SgpaError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let model = config.model.as_deref().unwrap_or(&env_model);
            return create_vision_provider(&prov, model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SgpaError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected.\n\
                Add an [llm] api_key to secrets.toml, or set OPENAI_API_KEY / ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_both_reports_first_missing_slot() {
        let err = require_both::<&str>(None, None).unwrap_err();
        assert!(matches!(
            err,
            SgpaError::MissingUpload {
                slot: UploadSlot::ResultSheet
            }
        ));
        let err = require_both(Some("r.png"), None).unwrap_err();
        assert!(matches!(
            err,
            SgpaError::MissingUpload {
                slot: UploadSlot::CreditsSheet
            }
        ));
        assert_eq!(require_both(Some(1), Some(2)).unwrap(), (1, 2));
    }

    #[test]
    fn empty_submission_is_rejected() {
        let err = Submission::default().into_pair().unwrap_err();
        assert!(err.to_string().contains("result sheet"));
    }

    #[test]
    fn run_pipeline_without_uploads_never_calls_model() {
        struct Unreachable;

        #[async_trait::async_trait]
        impl VisionModel for Unreachable {
            async fn complete(
                &self,
                _request: crate::pipeline::llm::ModelRequest,
            ) -> Result<crate::pipeline::llm::ModelReply, crate::pipeline::llm::ModelError> {
                panic!("model must not be called");
            }
        }

        let config = SgpaConfig::default();
        let outcome =
            tokio_test::block_on(run_pipeline(&Unreachable, Submission::default(), &config));
        tokio_test::assert_err!(outcome);
    }

    #[tokio::test]
    async fn calculate_with_missing_input_reads_nothing() {
        let err = calculate(Some("/no/such/result.png"), None, &SgpaConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SgpaError::MissingUpload {
                slot: UploadSlot::CreditsSheet
            }
        ));
    }
}
