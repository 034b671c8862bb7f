//! Secrets file → environment → provider resolution.
//!
//! Kept in its own test binary: it mutates process environment variables,
//! which must not race the pipeline tests.

use gradesheet_sgpa::{resolve_model, Secrets, SgpaConfig};
use std::io::Write;

#[test]
fn legacy_huggingface_secrets_resolve_a_provider() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "[huggingface]\napi_key = \"hf_test_token\"").unwrap();

    let secrets = Secrets::load(f.path()).expect("legacy table is accepted");
    assert_eq!(
        secrets.env_assignments(|_| None),
        vec![("HF_TOKEN".to_string(), "hf_test_token".to_string())]
    );

    secrets.apply_to_env();
    let token = std::env::var("HF_TOKEN").expect("HF_TOKEN exported");
    assert!(!token.is_empty());

    let config = SgpaConfig::builder()
        .provider_name(secrets.llm.provider.clone().unwrap_or_default())
        .build()
        .unwrap();
    if let Err(err) = resolve_model(&config) {
        panic!("huggingface provider should resolve: {err}");
    }
}
