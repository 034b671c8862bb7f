//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::SgpaConfigBuilder::progress_callback`] to receive events
//! as the pipeline runs. `on_stage_complete` carries the stage's text, so a
//! presentation layer can show the grades panel while the credits call is
//! still in flight.
//!
//! # Example
//!
//! ```rust
//! use gradesheet_sgpa::{PipelineProgressCallback, SgpaConfig, Stage};
//! use std::sync::Arc;
//!
//! struct PrintPanels;
//!
//! impl PipelineProgressCallback for PrintPanels {
//!     fn on_stage_complete(&self, stage: Stage, text: &str) {
//!         println!("## {}\n{}", stage.panel_title(), text);
//!     }
//! }
//!
//! let config = SgpaConfig::builder()
//!     .progress_callback(Arc::new(PrintPanels))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use crate::pipeline::input::ImagePreview;
use std::sync::Arc;

/// Called by the pipeline as it moves through its stages.
///
/// All methods default to no-ops. With `parallel_extraction` enabled the two
/// extraction stages report concurrently, so implementations must be
/// `Send + Sync` and guard any shared state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Both uploads were accepted; called before any model call.
    fn on_run_start(&self, result_sheet: &ImagePreview, credits_sheet: &ImagePreview) {
        let _ = (result_sheet, credits_sheet);
    }

    /// The stage's model call is about to be sent.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// The stage's model call returned; `text` is the reply verbatim.
    fn on_stage_complete(&self, stage: Stage, text: &str) {
        let _ = (stage, text);
    }

    /// The stage failed; the run stops here.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// All three stages completed.
    fn on_run_complete(&self, total_duration_ms: u64) {
        let _ = total_duration_ms;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SgpaConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, text: &str) {
            self.events.lock().unwrap().push(format!("done {stage}: {text}"));
        }

        fn on_stage_error(&self, stage: Stage, error: &str) {
            self.events.lock().unwrap().push(format!("error {stage}: {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::GradesExtraction);
        cb.on_stage_complete(Stage::GradesExtraction, "- Math: A");
        cb.on_stage_error(Stage::CreditsExtraction, "boom");
        cb.on_run_complete(10);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_stage_start(Stage::Aggregation);
        cb.on_stage_complete(Stage::Aggregation, "SGPA: 9.0");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start aggregation", "done aggregation: SGPA: 9.0"]
        );
    }
}
