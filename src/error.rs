//! Error types for the gradesheet-sgpa library.
//!
//! Every failure is fatal for the current submission: a run either produces
//! all three texts or none of them. [`SgpaError`] groups the failures by the
//! layer that raised them, and [`SgpaError::kind`] collapses them into the
//! three classes a presentation layer actually reacts to:
//!
//! * [`ErrorKind::InputValidation`] — ask the user for a (different) image;
//!   no model call was issued.
//! * [`ErrorKind::Transport`] — a model call could not be completed; the
//!   remaining stages were not run.
//! * [`ErrorKind::Configuration`] — credentials, provider or prompt templates
//!   are unusable; fix the setup and retry.
//!
//! Model output that ignores the requested format, or an SGPA that is simply
//! wrong, is not an error at all: the pipeline never inspects model text.

use crate::output::{Stage, UploadSlot};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the gradesheet-sgpa library.
#[derive(Debug, Error)]
pub enum SgpaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// One of the two required uploads was not supplied.
    #[error("Missing {slot}.\nPlease upload {}.", .slot.upload_hint())]
    MissingUpload { slot: UploadSlot },

    /// Upload path does not exist.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload is empty (zero bytes).
    #[error("Uploaded {slot} '{origin}' is empty")]
    EmptyUpload { slot: UploadSlot, origin: String },

    /// The upload is not one of the accepted raster formats.
    #[error("Uploaded {slot} '{origin}' is not a PNG or JPEG image (detected: {detected})")]
    UnsupportedFormat {
        slot: UploadSlot,
        origin: String,
        detected: String,
    },

    /// The bytes claim a supported format but cannot be decoded.
    #[error("Could not read {slot} '{origin}': {detail}")]
    UnreadableImage {
        slot: UploadSlot,
        origin: String,
        detail: String,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Secrets / config errors ───────────────────────────────────────────
    /// The secrets file exists but could not be read.
    #[error("Failed to read secrets file '{path}': {source}")]
    SecretsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The secrets file is not valid TOML or has the wrong shape.
    #[error("Secrets file '{path}' is malformed: {detail}\nExpected an [llm] table with an api_key entry.")]
    SecretsMalformed { path: PathBuf, detail: String },

    /// A prompt template is missing a placeholder or names an unknown one.
    #[error("Invalid {stage} prompt template: {detail}")]
    InvalidTemplate { stage: Stage, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider rejected the credential (401/403).
    #[error("Authentication error during {stage}: {detail}\nCheck the api_key in your secrets file.")]
    AuthError { stage: Stage, detail: String },

    /// The model call failed (network, provider-side rejection, bad request).
    #[error("LLM API error during {stage}: {message}")]
    LlmApiError { stage: Stage, message: String },

    /// The model call did not return within the configured timeout.
    #[error("LLM call timed out after {secs}s during {stage}\nIncrease --api-timeout.")]
    ApiTimeout { stage: Stage, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`SgpaError`] for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing upload; no model call was made.
    InputValidation,
    /// A model call failed; the run was aborted at that stage.
    Transport,
    /// Credentials, provider or template setup is unusable.
    Configuration,
    /// Local I/O or runtime failure unrelated to the inputs.
    Internal,
}

impl SgpaError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SgpaError::MissingUpload { .. }
            | SgpaError::FileNotFound { .. }
            | SgpaError::PermissionDenied { .. }
            | SgpaError::EmptyUpload { .. }
            | SgpaError::UnsupportedFormat { .. }
            | SgpaError::UnreadableImage { .. }
            | SgpaError::DownloadFailed { .. }
            | SgpaError::DownloadTimeout { .. } => ErrorKind::InputValidation,

            SgpaError::AuthError { .. }
            | SgpaError::LlmApiError { .. }
            | SgpaError::ApiTimeout { .. } => ErrorKind::Transport,

            SgpaError::SecretsUnreadable { .. }
            | SgpaError::SecretsMalformed { .. }
            | SgpaError::InvalidTemplate { .. }
            | SgpaError::InvalidConfig(_)
            | SgpaError::ProviderNotConfigured { .. } => ErrorKind::Configuration,

            SgpaError::OutputWriteFailed { .. } | SgpaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The pipeline stage that failed, for LLM errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SgpaError::AuthError { stage, .. }
            | SgpaError::LlmApiError { stage, .. }
            | SgpaError::ApiTimeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_upload_prompts_for_input() {
        let e = SgpaError::MissingUpload {
            slot: UploadSlot::CreditsSheet,
        };
        let msg = e.to_string();
        assert!(msg.contains("credits sheet"), "got: {msg}");
        assert!(msg.contains("Please upload"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::InputValidation);
        assert_eq!(e.stage(), None);
    }

    #[test]
    fn llm_error_carries_stage() {
        let e = SgpaError::LlmApiError {
            stage: Stage::GradesExtraction,
            message: "connection reset".into(),
        };
        assert!(e.to_string().contains("grades extraction"));
        assert!(e.to_string().contains("connection reset"));
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert_eq!(e.stage(), Some(Stage::GradesExtraction));
    }

    #[test]
    fn auth_error_display() {
        let e = SgpaError::AuthError {
            stage: Stage::Aggregation,
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("invalid key"));
        assert!(e.to_string().contains("secrets"));
        assert_eq!(e.kind(), ErrorKind::Transport);
    }

    #[test]
    fn api_timeout_display() {
        let e = SgpaError::ApiTimeout {
            stage: Stage::CreditsExtraction,
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("credits extraction"));
    }

    #[test]
    fn template_error_is_configuration() {
        let e = SgpaError::InvalidTemplate {
            stage: Stage::Aggregation,
            detail: "missing {credits}".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }
}
