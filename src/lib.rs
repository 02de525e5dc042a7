#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: counts in this codebase are bounded by manifest sizes.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
//
// Return value wrapping: some functions use Result for consistency even when they
// currently can't fail, allowing future error conditions without breaking the API.
#![allow(clippy::unnecessary_wraps)]

/// The editset crate version (matches `Cargo.toml`).
pub const EDITSET_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod prompts;
pub mod types;

pub use builder::{BuildOptions, BuildReport, build_testset, load_source_index};
pub use config::{EngineConfig, PromptConfig};
pub use engine::{
    PromptEngine, RunStats,
    backend::{OpenAiBackend, SamplingOptions, VlmBackend, VlmRequest},
};
pub use error::{EditsetError, Result};
pub use extract::{Extraction, extract_braced_object};
pub use manifest::RecordSet;
pub use prompts::{PromptFamily, render_direct_caption_prompt};
pub use types::{AuditItem, AuditLog, CandidateInstruction, Mode, TestRecord};
