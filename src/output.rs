//! Result types produced by one SGPA run.
//!
//! Every value here is request-scoped: it is built by a single call to
//! [`crate::calculate::run_pipeline`] and never cached. The texts are the
//! model's replies exactly as received; nothing in this crate parses them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two required uploads an image fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSlot {
    /// The result sheet: subjects and their letter grades.
    ResultSheet,
    /// The credits sheet: subjects and their credit points.
    CreditsSheet,
}

impl UploadSlot {
    /// What the user should supply when this slot is empty.
    pub fn upload_hint(&self) -> &'static str {
        match self {
            UploadSlot::ResultSheet => "your result image (shows subjects & grades)",
            UploadSlot::CreditsSheet => "your credits image (shows subjects & credit points)",
        }
    }
}

impl fmt::Display for UploadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSlot::ResultSheet => f.write_str("result sheet"),
            UploadSlot::CreditsSheet => f.write_str("credits sheet"),
        }
    }
}

/// One of the three model calls, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GradesExtraction,
    CreditsExtraction,
    Aggregation,
}

impl Stage {
    /// All stages in the order a sequential run issues them.
    pub const ALL: [Stage; 3] = [
        Stage::GradesExtraction,
        Stage::CreditsExtraction,
        Stage::Aggregation,
    ];

    /// Heading shown above this stage's text panel.
    pub fn panel_title(&self) -> &'static str {
        match self {
            Stage::GradesExtraction => "Extracted Subjects & Grades",
            Stage::CreditsExtraction => "Extracted Subjects & Credits",
            Stage::Aggregation => "Final SGPA Calculation",
        }
    }

    /// Status line shown while this stage's call is in flight.
    pub fn progress_message(&self) -> &'static str {
        match self {
            Stage::GradesExtraction => "Extracting subjects & grades from result image…",
            Stage::CreditsExtraction => "Extracting subjects & credit points from credits image…",
            Stage::Aggregation => "Calculating SGPA…",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::GradesExtraction => f.write_str("grades extraction"),
            Stage::CreditsExtraction => f.write_str("credits extraction"),
            Stage::Aggregation => f.write_str("aggregation"),
        }
    }
}

/// Token and timing figures for one model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    /// Prompt tokens reported by the provider (0 if not reported).
    pub input_tokens: usize,
    /// Completion tokens reported by the provider (0 if not reported).
    pub output_tokens: usize,
    /// Wall-clock time for the call.
    pub duration_ms: u64,
}

/// Free-form text returned by an extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// [`Stage::GradesExtraction`] or [`Stage::CreditsExtraction`].
    pub stage: Stage,
    /// The model reply, verbatim.
    pub text: String,
    pub stats: StageStats,
}

/// Free-form text returned by the aggregation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    /// The model reply, verbatim. Contains the matched subjects, the sums and
    /// the SGPA as the model chose to render them.
    pub text: String,
    pub stats: StageStats,
}

/// Run-level totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Time spent decoding and re-encoding both uploads.
    pub encode_duration_ms: u64,
    /// Time spent in model calls (wall-clock; overlapping calls count once).
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one submission produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgpaReport {
    pub grades: ExtractionResult,
    pub credits: ExtractionResult,
    pub aggregation: AggregationResult,
    pub stats: RunStats,
}

impl SgpaReport {
    /// The final text to show the user.
    pub fn sgpa_text(&self) -> &str {
        &self.aggregation.text
    }

    /// Text of the given stage.
    pub fn text_for(&self, stage: Stage) -> &str {
        match stage {
            Stage::GradesExtraction => &self.grades.text,
            Stage::CreditsExtraction => &self.credits.text,
            Stage::Aggregation => &self.aggregation.text,
        }
    }

    /// Render the three panels as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for stage in Stage::ALL {
            out.push_str(&format!("## {}\n\n", stage.panel_title()));
            let text = self.text_for(stage).trim_end();
            out.push_str(text);
            out.push_str("\n\n");
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}
