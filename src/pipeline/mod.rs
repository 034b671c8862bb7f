//! Pipeline stages for one SGPA submission.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the model call can be stubbed without touching
//! image handling.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm::extract (grades)  ──┐
//! input ──▶ encode ──▶ llm::extract (credits) ──┴──▶ llm::aggregate
//! (path/URL) (base64)   (VLM, image + prompt)         (LLM, text only)
//! ```
//!
//! 1. [`input`]  — read a path or URL, sniff PNG/JPEG, reject anything else
//! 2. [`encode`] — decode and re-encode as PNG, base64-wrap for the request body
//! 3. [`llm`]    — the only stage with network I/O; one call per invocation,
//!    no retry

pub mod encode;
pub mod input;
pub mod llm;
