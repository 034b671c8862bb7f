//! Built-in prompts for the three model calls.
//!
//! Every prompt lives here so changing what the model is asked to produce
//! means editing exactly one place, and so tests can inspect prompts without
//! a model. Callers override any of them through
//! [`crate::config::SgpaConfigBuilder`]; the constants are used otherwise.
//!
//! The grading scale is data ([`GRADE_POINTS`]) and is rendered into the
//! aggregation prompt through the `{grade_scale}` placeholder.

use crate::error::SgpaError;
use crate::output::Stage;
use crate::template::PromptTemplate;
use std::collections::HashMap;

/// Letter grade → grade point.
pub const GRADE_POINTS: &[(&str, u8)] = &[("O", 10), ("A+", 9), ("A", 8), ("B+", 7), ("B", 6)];

/// Instruction sent with the result-sheet image.
pub const GRADES_EXTRACTION_PROMPT: &str = "Extract subjects and grades from this result image.
Format the response as:
**Subjects & Grades:**
- Subject 1: Grade
- Subject 2: Grade
...";

/// Instruction sent with the credits-sheet image.
pub const CREDITS_EXTRACTION_PROMPT: &str = "Extract subjects and credit points from this credits image.
Format the response as:
**Subjects & Credits:**
- Subject 1: Credit Points
- Subject 2: Credit Points
...";

/// Instruction for the text-only aggregation call.
///
/// `{grades}` and `{credits}` receive the two extraction replies verbatim,
/// grades first. `{grade_scale}` receives [`grade_scale_text`].
pub const AGGREGATION_PROMPT: &str = "Match the subjects, grades, and credit points from the data below:

**Subjects & Grades:**
{grades}

**Subjects & Credits:**
{credits}

Then calculate the SGPA using this method:
1. Convert grades to values: {grade_scale}.
2. Multiply each subject's credit points by its grade value.
3. Sum these values and divide by the total credit points.

Format the final response as:
**Matched Subjects (Grades & Credits):**
- Subject 1: Grade (Credit Points)
- Subject 2: Grade (Credit Points)
...

**Total Grade Points: X**
**Total Credit Points: Y**
**SGPA: Z.ZZ**";

/// Placeholders an aggregation template must contain.
pub const AGGREGATION_REQUIRED: &[&str] = &["grades", "credits"];
/// Placeholders an aggregation template may contain.
pub const AGGREGATION_ALLOWED: &[&str] = &["grades", "credits", "grade_scale"];

/// Render [`GRADE_POINTS`] as `O=10, A+=9, …`.
pub fn grade_scale_text() -> String {
    GRADE_POINTS
        .iter()
        .map(|(grade, points)| format!("{grade}={points}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The built-in template for `stage`.
pub fn default_template(stage: Stage) -> PromptTemplate {
    let text = match stage {
        Stage::GradesExtraction => GRADES_EXTRACTION_PROMPT,
        Stage::CreditsExtraction => CREDITS_EXTRACTION_PROMPT,
        Stage::Aggregation => AGGREGATION_PROMPT,
    };
    PromptTemplate::builtin(stage, text)
}

/// Build the extraction template for `stage`, using `custom` if given.
///
/// Extraction prompts are sent verbatim: the image is attached to the
/// request, not interpolated into the text, so `{...}` in a custom prompt is
/// left alone.
pub fn extraction_template(stage: Stage, custom: Option<&str>) -> Result<PromptTemplate, SgpaError> {
    let text = match (stage, custom) {
        (_, Some(custom)) => custom,
        (Stage::GradesExtraction, None) => GRADES_EXTRACTION_PROMPT,
        (Stage::CreditsExtraction, None) => CREDITS_EXTRACTION_PROMPT,
        (Stage::Aggregation, None) => {
            return Err(SgpaError::Internal(
                "aggregation is not an extraction stage".into(),
            ))
        }
    };
    PromptTemplate::literal(stage, text)
}

/// Build the aggregation template, using `custom` if given.
pub fn aggregation_template(custom: Option<&str>) -> Result<PromptTemplate, SgpaError> {
    PromptTemplate::new(
        Stage::Aggregation,
        custom.unwrap_or(AGGREGATION_PROMPT),
        AGGREGATION_REQUIRED,
        AGGREGATION_ALLOWED,
    )
}

/// Fill an aggregation template with the two extraction texts.
pub fn render_aggregation(template: &PromptTemplate, grades: &str, credits: &str) -> String {
    let scale = grade_scale_text();
    let values = HashMap::from([
        ("grades", grades),
        ("credits", credits),
        ("grade_scale", scale.as_str()),
    ]);
    template.render(&values)
}
