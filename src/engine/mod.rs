//! Batch prompting engine.
//!
//! Builds a work list from the manifest, processes it in fixed-size chunks
//! against the inference backend, merges structured fields back into the
//! record set, and rewrites the whole manifest after every chunk. The
//! checkpoint-on-every-step policy trades I/O for crash resilience: a failure
//! mid-run loses at most one chunk of progress.

pub mod backend;

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::extract::{Extraction, extract_braced_object};
use crate::manifest::RecordSet;
use crate::prompts::{PromptFamily, render_direct_caption_prompt};
use crate::types::Mode;
use backend::{SamplingOptions, VlmBackend, VlmRequest};

/// Target field for direct-caption (egovid) generations. A record with this
/// field already populated is never re-prompted.
pub const DIRECT_CAPTION_FIELD: &str = "lf_prompt_v4_minimal";

/// Source field the direct-caption template is conditioned on.
const INSTRUCTION_FIELD: &str = "instruction";

/// Ephemeral unit of work: consumed exactly once during batch construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub record_index: usize,
    pub field: String,
    pub prompt: String,
}

/// Counters reported at the end of a run and persisted as the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub items_total: usize,
    pub items_completed: usize,
    pub inputs_dropped: usize,
    pub batches_failed: usize,
}

#[derive(Debug, Clone)]
pub struct PromptEngine {
    batch_size: usize,
    sampling: SamplingOptions,
    families: Vec<PromptFamily>,
}

impl PromptEngine {
    #[must_use]
    pub fn new(batch_size: usize, sampling: SamplingOptions, families: Vec<PromptFamily>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            sampling,
            families,
        }
    }

    /// Enumerate the (record, field, prompt) tuples for this run.
    ///
    /// Records whose first frame is absent from disk are skipped silently; a
    /// pre-condition filter, not an error. Egovid records are skipped when
    /// the target field is already populated (idempotent restarts).
    /// Multi-candidate items carry no such check: overwrite semantics.
    #[must_use]
    pub fn build_work_list(&self, records: &RecordSet, mode: Mode) -> Vec<WorkItem> {
        let mut work = Vec::new();
        for index in 0..records.len() {
            let Some(first_frame) = records.str_field(index, "first_frame_path") else {
                continue;
            };
            if first_frame.is_empty() || !Path::new(first_frame).exists() {
                tracing::debug!(index, path = first_frame, "first frame absent, skipping");
                continue;
            }

            if mode.is_multi_candidate() {
                for family in &self.families {
                    work.push(WorkItem {
                        record_index: index,
                        field: family.field_name().to_string(),
                        prompt: family.render(),
                    });
                }
            } else if !records.has_nonempty(index, DIRECT_CAPTION_FIELD) {
                let instruction = records
                    .str_field(index, INSTRUCTION_FIELD)
                    .unwrap_or_default();
                work.push(WorkItem {
                    record_index: index,
                    field: DIRECT_CAPTION_FIELD.to_string(),
                    prompt: render_direct_caption_prompt(instruction),
                });
            }
        }
        work
    }

    /// Process the full work list in chunks, checkpointing after each.
    pub fn run(
        &self,
        records: &mut RecordSet,
        mode: Mode,
        backend: &dyn VlmBackend,
        manifest_path: &Path,
    ) -> Result<RunStats> {
        let work = self.build_work_list(records, mode);
        let mut stats = RunStats {
            items_total: work.len(),
            ..RunStats::default()
        };
        if work.is_empty() {
            tracing::info!(mode = %mode, "no work to process");
            return Ok(stats);
        }

        let total_chunks = work.len().div_ceil(self.batch_size);
        tracing::info!(
            mode = %mode,
            backend = backend.name(),
            items = work.len(),
            chunks = total_chunks,
            "starting inference"
        );

        for (chunk_index, chunk) in work.chunks(self.batch_size).enumerate() {
            let mut inputs: Vec<VlmRequest> = Vec::with_capacity(chunk.len());
            let mut kept: Vec<&WorkItem> = Vec::with_capacity(chunk.len());

            for item in chunk {
                match prepare_input(records, item) {
                    Ok(request) => {
                        inputs.push(request);
                        kept.push(item);
                    }
                    Err(err) => {
                        stats.inputs_dropped += 1;
                        tracing::warn!(
                            index = item.record_index,
                            error = %err,
                            "dropping item, input preparation failed"
                        );
                    }
                }
            }

            if !inputs.is_empty() {
                match backend.generate(&inputs, &self.sampling) {
                    Ok(outputs) => {
                        // Outputs align positionally with the surviving inputs.
                        for (item, text) in kept.iter().zip(outputs) {
                            apply_response(records, mode, item, text.trim());
                            stats.items_completed += 1;
                        }
                    }
                    Err(err) => {
                        stats.batches_failed += 1;
                        tracing::error!(
                            chunk = chunk_index + 1,
                            error = %err,
                            "batch inference failed, updates not applied"
                        );
                    }
                }
            }

            records.checkpoint(manifest_path)?;
            tracing::info!(chunk = chunk_index + 1, total = total_chunks, "batch done");
        }

        Ok(stats)
    }
}

/// Read and revalidate a work item's first-frame image. The decode catches
/// files that vanished or rotted between work-list construction and batch
/// assembly; a failure drops only this item.
fn prepare_input(records: &RecordSet, item: &WorkItem) -> Result<VlmRequest> {
    let path = records
        .str_field(item.record_index, "first_frame_path")
        .unwrap_or_default();
    let image_bytes = fs_err::read(path)?;
    image::load_from_memory(&image_bytes).map_err(|err| crate::EditsetError::Backend {
        reason: format!("undecodable image {path}: {err}"),
    })?;
    Ok(VlmRequest {
        prompt: item.prompt.clone(),
        image_bytes,
        mime: mime_for_path(path),
    })
}

fn mime_for_path(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Merge one completion back into its record, per mode.
fn apply_response(records: &mut RecordSet, mode: Mode, item: &WorkItem, text: &str) {
    if !mode.is_multi_candidate() {
        records.set_field(item.record_index, &item.field, Value::String(text.to_string()));
        return;
    }

    match extract_braced_object(text) {
        Extraction::Object(map) => {
            let prefix = item.field.split('_').next().unwrap_or(&item.field);
            for (key, value) in map {
                records.set_field(item.record_index, &format!("{prefix}_{key}"), value);
            }
        }
        Extraction::NoBraces => {
            records.set_field(
                item.record_index,
                &format!("{}_raw", item.field),
                Value::String(text.to_string()),
            );
        }
        Extraction::Malformed => {
            records.set_field(
                item.record_index,
                &format!("{}_error", item.field),
                Value::String(text.to_string()),
            );
        }
    }
}
