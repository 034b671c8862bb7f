//! Local secrets store for the model credential.
//!
//! The credential lives in a TOML file kept out of version control:
//!
//! ```toml
//! [llm]
//! provider = "openai"        # optional
//! model    = "gpt-4.1-mini"  # optional
//! api_key  = "sk-..."
//! ```
//!
//! A file holding only the older `[huggingface]` table with an `api_key` is
//! still accepted and read as the `huggingface` provider.
//!
//! It is read once at process start. edgequake-llm providers read their key
//! from the environment, so [`Secrets::apply_to_env`] exports it under the
//! provider's conventional variable. A variable that is already set wins over
//! the file.

use crate::error::SgpaError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit secrets file.
pub const SECRETS_PATH_ENV: &str = "SGPA_SECRETS";

/// Files tried, in order, when no path is given.
pub const DEFAULT_SECRETS_PATHS: &[&str] = &["secrets.toml", ".streamlit/secrets.toml"];

#[derive(Deserialize)]
struct SecretsFile {
    llm: Option<LlmSecrets>,
    huggingface: Option<LegacyKey>,
}

#[derive(Deserialize)]
struct LegacyKey {
    api_key: String,
}

/// The `[llm]` table.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LlmSecrets {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: String,
}

impl fmt::Debug for LlmSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSecrets")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Secrets loaded from disk, with the path they came from.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub path: PathBuf,
    pub llm: LlmSecrets,
}

impl Secrets {
    /// Parse the secrets file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SgpaError> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|source| SgpaError::SecretsUnreadable {
            path: path.clone(),
            source,
        })?;
        let llm = Self::parse(&path, &raw)?;
        debug!("Loaded secrets from {}", path.display());
        Ok(Self { path, llm })
    }

    fn parse(path: &Path, raw: &str) -> Result<LlmSecrets, SgpaError> {
        let file: SecretsFile = toml::from_str(raw).map_err(|e| SgpaError::SecretsMalformed {
            path: path.to_path_buf(),
            detail: e.message().to_string(),
        })?;
        let llm = match (file.llm, file.huggingface) {
            (Some(llm), _) => llm,
            (None, Some(legacy)) => {
                warn!("{}: [huggingface] table is deprecated, use [llm]", path.display());
                LlmSecrets {
                    provider: Some("huggingface".into()),
                    model: None,
                    api_key: legacy.api_key,
                }
            }
            (None, None) => {
                return Err(SgpaError::SecretsMalformed {
                    path: path.to_path_buf(),
                    detail: "no [llm] table".into(),
                })
            }
        };
        if llm.api_key.trim().is_empty() {
            return Err(SgpaError::SecretsMalformed {
                path: path.to_path_buf(),
                detail: "api_key is empty".into(),
            });
        }
        Ok(llm)
    }

    /// Locate and load the secrets file.
    ///
    /// An explicit path (argument, then `SGPA_SECRETS`) must exist. Without
    /// one, [`DEFAULT_SECRETS_PATHS`] are tried relative to the working
    /// directory and `Ok(None)` is returned if none exists, leaving the
    /// environment as the only credential source.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>, SgpaError> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        if let Ok(path) = std::env::var(SECRETS_PATH_ENV) {
            if !path.is_empty() {
                return Self::load(path).map(Some);
            }
        }
        for candidate in DEFAULT_SECRETS_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                return Self::load(path).map(Some);
            }
        }
        debug!("No secrets file found; relying on environment");
        Ok(None)
    }

    /// The variables [`apply_to_env`](Self::apply_to_env) would set, given
    /// a lookup for the current environment.
    pub fn env_assignments(
        &self,
        current: impl Fn(&str) -> Option<String>,
    ) -> Vec<(String, String)> {
        let var = api_key_env_var(self.llm.provider.as_deref());
        let already_set = current(&var).map(|v| !v.is_empty()).unwrap_or(false);
        if already_set {
            debug!("{var} already set; secrets file key not exported");
            Vec::new()
        } else {
            vec![(var, self.llm.api_key.clone())]
        }
    }

    /// Export the credential for the provider. Call before any provider is
    /// constructed and before spawning threads that read the environment.
    pub fn apply_to_env(&self) {
        for (key, value) in self.env_assignments(|k| std::env::var(k).ok()) {
            std::env::set_var(&key, value);
            info!("Credential from {} exported as {}", self.path.display(), key);
        }
    }
}

/// The environment variable a provider reads its key from.
pub fn api_key_env_var(provider: Option<&str>) -> String {
    match provider.map(|p| p.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("openai") => "OPENAI_API_KEY".into(),
        Some("anthropic") => "ANTHROPIC_API_KEY".into(),
        Some("gemini") | Some("google") => "GEMINI_API_KEY".into(),
        Some("azure") => "AZURE_OPENAI_API_KEY".into(),
        Some("mistral") => "MISTRAL_API_KEY".into(),
        Some("openrouter") => "OPENROUTER_API_KEY".into(),
        Some("xai") => "XAI_API_KEY".into(),
        Some("huggingface") | Some("hf") | Some("hugging-face") | Some("hugging_face") => {
            "HF_TOKEN".into()
        }
        Some(other) => format!("{}_API_KEY", other.to_ascii_uppercase().replace('-', "_")),
    }
}
