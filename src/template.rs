//! Prompt templates with named `{placeholder}` slots.
//!
//! Templates are plain data so the three model calls share one code path and
//! differ only in the text they send. Placeholders are validated when the
//! template is built, not when it is rendered, so a bad custom prompt fails
//! at configuration time before any upload is read.
//!
//! Substituted values are inserted verbatim and never re-scanned: a model
//! reply that happens to contain `{credits}` stays as-is in the prompt.

use crate::error::SgpaError;
use crate::output::Stage;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};

/// `{name}` where name is lowercase ASCII / digits / underscore.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// A validated prompt template for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    stage: Stage,
    text: String,
    placeholders: BTreeSet<String>,
}

impl PromptTemplate {
    /// Parse `text`, requiring every name in `required` to appear and
    /// rejecting any name outside `allowed`.
    pub fn new(
        stage: Stage,
        text: impl Into<String>,
        required: &[&str],
        allowed: &[&str],
    ) -> Result<Self, SgpaError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SgpaError::InvalidTemplate {
                stage,
                detail: "template is empty".into(),
            });
        }

        let placeholders: BTreeSet<String> = PLACEHOLDER
            .captures_iter(&text)
            .map(|c| c[1].to_string())
            .collect();

        if let Some(unknown) = placeholders.iter().find(|p| !allowed.contains(&p.as_str())) {
            return Err(SgpaError::InvalidTemplate {
                stage,
                detail: format!(
                    "unknown placeholder {{{unknown}}}; allowed: {}",
                    format_names(allowed)
                ),
            });
        }
        if let Some(missing) = required.iter().find(|r| !placeholders.contains(**r)) {
            return Err(SgpaError::InvalidTemplate {
                stage,
                detail: format!("missing required placeholder {{{missing}}}"),
            });
        }

        Ok(Self {
            stage,
            text,
            placeholders,
        })
    }

    /// A template that is sent as-is and never rendered. Braces carry no
    /// meaning, so only emptiness is checked.
    pub fn literal(stage: Stage, text: impl Into<String>) -> Result<Self, SgpaError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SgpaError::InvalidTemplate {
                stage,
                detail: "template is empty".into(),
            });
        }
        Ok(Self {
            stage,
            text,
            placeholders: BTreeSet::new(),
        })
    }

    /// Wrap a built-in prompt without validation.
    pub(crate) fn builtin(stage: Stage, text: &'static str) -> Self {
        Self {
            stage,
            text: text.to_string(),
            placeholders: PLACEHOLDER
                .captures_iter(text)
                .map(|c| c[1].to_string())
                .collect(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Placeholder names used by this template, sorted.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    /// Substitute every placeholder. Names absent from `values` render empty.
    pub fn render(&self, values: &HashMap<&str, &str>) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &Captures<'_>| {
                values.get(&caps[1]).copied().unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

fn format_names(names: &[&str]) -> String {
    if names.is_empty() {
        return "none".into();
    }
    names
        .iter()
        .map(|n| format!("{{{n}}}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_values_verbatim() {
        let t = PromptTemplate::new(
            Stage::Aggregation,
            "A:\n{grades}\nB:\n{credits}",
            &["grades", "credits"],
            &["grades", "credits"],
        )
        .unwrap();
        let values = HashMap::from([("grades", "- Math: {credits}"), ("credits", "- Math: 4")]);
        assert_eq!(t.render(&values), "A:\n- Math: {credits}\nB:\n- Math: 4");
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let err = PromptTemplate::new(
            Stage::Aggregation,
            "{grades} {credits} {gpa}",
            &["grades", "credits"],
            &["grades", "credits"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("{gpa}"), "got: {err}");
    }

    #[test]
    fn rejects_missing_required() {
        let err = PromptTemplate::new(
            Stage::Aggregation,
            "only {grades}",
            &["grades", "credits"],
            &["grades", "credits"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("{credits}"), "got: {err}");
    }

    #[test]
    fn braces_that_are_not_placeholders_are_kept() {
        let t = PromptTemplate::new(Stage::GradesExtraction, "Use {\"a\": 1} and {Upper}", &[], &[])
            .unwrap();
        assert_eq!(t.placeholders().count(), 0);
        assert_eq!(t.render(&HashMap::new()), "Use {\"a\": 1} and {Upper}");
    }

    #[test]
    fn literal_keeps_braces_and_has_no_placeholders() {
        let t = PromptTemplate::literal(Stage::GradesExtraction, "- {subject}: {grade}").unwrap();
        assert_eq!(t.placeholders().count(), 0);
        assert_eq!(t.as_str(), "- {subject}: {grade}");
        assert!(PromptTemplate::literal(Stage::GradesExtraction, " ").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(PromptTemplate::new(Stage::CreditsExtraction, "  \n", &[], &[]).is_err());
    }
}
