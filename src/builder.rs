//! Testset builder: normalizes a heterogeneous source index into a flat,
//! validated manifest plus an audit log.
//!
//! Two strategies, selected by mode. Drone/walk records carry several
//! candidate instructions behind a field-key convention; egovid records
//! declare a single image path directly. Either way a record is emitted only
//! when its last-frame image existed on disk at build time. Missing images
//! are counted and skipped, never fatal; an unreadable source index is.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{EditsetError, Result};
use crate::manifest::write_json_atomic;
use crate::types::{AuditItem, AuditLog, CandidateInstruction, Mode, TestRecord};

/// Candidate instruction keys: two uppercase letters, digits, `_MOD_`, digits.
#[allow(clippy::unwrap_used)]
static CANDIDATE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}\d+_MOD_\d+$").unwrap());

/// Candidate artifacts are sibling images named after their key.
const CANDIDATE_IMAGE_EXT: &str = "jpg";

/// Only the first few missing artifacts are reported individually.
const MISSING_REPORT_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: Mode,
    pub source_json: PathBuf,
    /// Fallback base directory for egovid image verification. Ignored by the
    /// pattern strategy, which resolves artifacts from each record's own
    /// frame directory.
    pub image_dir: PathBuf,
    pub output_path: PathBuf,
    /// Records whose identifier is not listed are skipped with no diagnostic.
    pub filter_ids: Option<HashSet<String>>,
    /// Audit-log destination; defaults to `<output_dir>/logs/<mode>.json`.
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Test records written to the manifest.
    pub emitted: usize,
    /// Candidate keys inspected (pattern strategy) or records inspected
    /// (direct strategy).
    pub candidates_seen: usize,
    /// Candidates or records dropped because their image was absent.
    pub files_missing: usize,
}

/// Load the source index. A JSON array is keyed by each item's `id`; a JSON
/// object is used as-is. Encounter order is preserved either way.
pub fn load_source_index(path: &Path) -> Result<Map<String, Value>> {
    let bytes = fs_err::read(path).map_err(|err| EditsetError::InvalidSourceIndex {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|err| EditsetError::InvalidSourceIndex {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            let mut map = Map::new();
            for item in items {
                let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else {
                    return Err(EditsetError::InvalidSourceIndex {
                        path: path.to_path_buf(),
                        reason: "array item missing string `id` field".into(),
                    });
                };
                map.insert(id, item);
            }
            Ok(map)
        }
        _ => Err(EditsetError::InvalidSourceIndex {
            path: path.to_path_buf(),
            reason: "expected a JSON object or array at the top level".into(),
        }),
    }
}

/// Parse the candidate instructions out of a source record, in field order.
///
/// This is the single place that knows about the key convention; the rest of
/// the builder works against the returned typed list.
#[must_use]
pub fn parse_candidates(item: &Map<String, Value>) -> Vec<CandidateInstruction> {
    item.iter()
        .filter(|(key, _)| CANDIDATE_KEY.is_match(key))
        .filter_map(|(key, value)| {
            value.as_str().map(|text| CandidateInstruction {
                key: key.clone(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Build the testset manifest and its audit log.
pub fn build_testset(opts: &BuildOptions) -> Result<BuildReport> {
    let source = load_source_index(&opts.source_json)?;
    tracing::info!(
        mode = %opts.mode,
        source = %opts.source_json.display(),
        records = source.len(),
        "loaded source index"
    );

    let mut testset: Vec<TestRecord> = Vec::new();
    let mut report = BuildReport::default();

    for (original_id, item) in &source {
        if let Some(filter) = &opts.filter_ids {
            if !filter.contains(original_id) {
                continue;
            }
        }
        let Some(item) = item.as_object() else {
            continue;
        };

        if opts.mode.is_multi_candidate() {
            collect_pattern_records(opts.mode, original_id, item, &mut testset, &mut report);
        } else {
            collect_direct_record(
                original_id,
                item,
                &opts.image_dir,
                &mut testset,
                &mut report,
            );
        }
    }

    tracing::info!(
        emitted = report.emitted,
        candidates = report.candidates_seen,
        missing = report.files_missing,
        "build complete"
    );

    write_json_atomic(&opts.output_path, &testset)?;

    let log_path = opts
        .log_path
        .clone()
        .unwrap_or_else(|| default_log_path(&opts.output_path, opts.mode));
    let log = AuditLog {
        mode: opts.mode,
        total_count: testset.len(),
        items: testset
            .iter()
            .map(|record| AuditItem {
                test_id: record.test_id.clone(),
                last_frame_path: record.last_frame_path.clone(),
            })
            .collect(),
    };
    write_json_atomic(&log_path, &log)?;
    tracing::info!(log = %log_path.display(), "audit log written");

    Ok(report)
}

/// Pattern-extraction strategy: one test record per candidate whose sibling
/// image `<frame_dir>/<key>.jpg` exists.
fn collect_pattern_records(
    mode: Mode,
    original_id: &str,
    item: &Map<String, Value>,
    testset: &mut Vec<TestRecord>,
    report: &mut BuildReport,
) {
    let frame_dir = item
        .get("last_frame_path")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if frame_dir.is_empty() {
        return;
    }

    for candidate in parse_candidates(item) {
        report.candidates_seen += 1;
        let artifact =
            Path::new(frame_dir).join(format!("{}.{CANDIDATE_IMAGE_EXT}", candidate.key));
        if artifact.exists() {
            testset.push(TestRecord {
                test_id: format!("{original_id}_{}", candidate.key),
                original_id: original_id.to_string(),
                prompt: candidate.text,
                prompt_key: candidate.key,
                last_frame_path: artifact.to_string_lossy().into_owned(),
                first_frame_path: item
                    .get("first_frame_path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                mode,
                extra: Map::new(),
            });
            report.emitted += 1;
        } else {
            report.files_missing += 1;
            if report.files_missing <= MISSING_REPORT_LIMIT {
                tracing::warn!(artifact = %artifact.display(), "candidate image missing");
            }
        }
    }
}

/// Direct-path strategy: one test record per source record whose declared
/// last-frame path exists, caption taken from the preferred field with a
/// fallback.
fn collect_direct_record(
    original_id: &str,
    item: &Map<String, Value>,
    image_dir: &Path,
    testset: &mut Vec<TestRecord>,
    report: &mut BuildReport,
) {
    let Some(declared) = item
        .get("last_frame_path")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
    else {
        return;
    };
    report.candidates_seen += 1;

    let Some(resolved) = resolve_image_path(declared, image_dir) else {
        report.files_missing += 1;
        if report.files_missing <= MISSING_REPORT_LIMIT {
            tracing::warn!(path = declared, "declared last frame not found on disk");
        }
        return;
    };

    let prompt = item
        .get("lf_prompt_v4_minimal")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .or_else(|| item.get("instruction").and_then(Value::as_str))
        .unwrap_or_default();

    testset.push(TestRecord {
        test_id: original_id.to_string(),
        original_id: original_id.to_string(),
        prompt: prompt.to_string(),
        prompt_key: "lf_prompt_v4_minimal".to_string(),
        last_frame_path: resolved,
        first_frame_path: item
            .get("first_frame_path")
            .and_then(Value::as_str)
            .map(str::to_string),
        mode: Mode::Egovid,
        extra: Map::new(),
    });
    report.emitted += 1;
}

/// Try the declared path as-is, then relative to the verification directory.
fn resolve_image_path(declared: &str, image_dir: &Path) -> Option<String> {
    let direct = Path::new(declared);
    if direct.exists() {
        return Some(declared.to_string());
    }
    let joined = image_dir.join(declared);
    if joined.exists() {
        return Some(joined.to_string_lossy().into_owned());
    }
    None
}

fn default_log_path(output_path: &Path, mode: Mode) -> PathBuf {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join("logs").join(format!("{mode}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_key_pattern_matches_convention_only() {
        assert!(CANDIDATE_KEY.is_match("SC1_MOD_1"));
        assert!(CANDIDATE_KEY.is_match("AB12_MOD_34"));
        assert!(!CANDIDATE_KEY.is_match("SC1_MOD_"));
        assert!(!CANDIDATE_KEY.is_match("sc1_MOD_1"));
        assert!(!CANDIDATE_KEY.is_match("S1_MOD_1"));
        assert!(!CANDIDATE_KEY.is_match("SC1_MODE_1"));
        assert!(!CANDIDATE_KEY.is_match("XSC1_MOD_1"));
    }

    #[test]
    fn parse_candidates_keeps_field_order_and_skips_non_strings() {
        let item: Map<String, Value> = serde_json::from_str(
            r#"{
                "last_frame_path": "/frames",
                "SC2_MOD_1": "swap background",
                "SC1_MOD_1": "pan left",
                "SC1_MOD_2": 42
            }"#,
        )
        .unwrap();
        let candidates = parse_candidates(&item);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key, "SC2_MOD_1");
        assert_eq!(candidates[1].text, "pan left");
    }
}
