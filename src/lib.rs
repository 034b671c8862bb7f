//! # gradesheet-sgpa
//!
//! Compute a Semester Grade Point Average (SGPA) from two photographs: a
//! result sheet (subjects and letter grades) and a credits sheet (subjects
//! and credit points), using a Vision Language Model for all the reading and
//! the arithmetic.
//!
//! The crate never parses what the model says. It encodes the images, builds
//! the prompts, makes the calls in order and hands back the replies verbatim.
//! Whether the subjects were matched correctly, or the SGPA is right, is
//! entirely up to the model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! result image ─┐
//!               ├─ 1. Input    path / URL → bytes, PNG or JPEG only
//! credits image ┘
//!  │
//!  ├─ 2. Encode   decode → PNG → base64 payload
//!  ├─ 3. Extract  VLM call per image → "Subject: value" text (grades, then credits)
//!  ├─ 4. Aggregate text-only call: both texts + grade scale + formula → SGPA text
//!  └─ 5. Output   three panels + token / timing stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gradesheet_sgpa::{calculate, SgpaConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SgpaConfig::default();
//!     let report = calculate(Some("result.png"), Some("credits.jpg"), &config).await?;
//!     println!("{}", report.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Grading Scale
//!
//! | Grade | Points |
//! |-------|--------|
//! | O     | 10     |
//! | A+    | 9      |
//! | A     | 8      |
//! | B+    | 7      |
//! | B     | 6      |
//!
//! SGPA = Σ(credit points × grade points) / Σ credit points.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sgpa` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod calculate;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod secrets;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use calculate::{
    calculate, calculate_from_bytes, calculate_sync, calculate_to_file, resolve_model,
    run_pipeline, Submission,
};
pub use config::{SgpaConfig, SgpaConfigBuilder, DEFAULT_MODEL};
pub use error::{ErrorKind, SgpaError};
pub use output::{
    AggregationResult, ExtractionResult, RunStats, SgpaReport, Stage, StageStats, UploadSlot,
};
pub use pipeline::encode::{encode_image, EncodedImagePayload};
pub use pipeline::input::{ImagePreview, UploadedImage};
pub use pipeline::llm::{ModelError, ModelReply, ModelRequest, ProviderModel, VisionModel};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use secrets::Secrets;
pub use template::PromptTemplate;
