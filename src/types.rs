//! Public types shared by the testset builder and the prompting engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EditsetError;

/// Dataset mode. Selects the normalization strategy at build time and the
/// work-list rules at prompting time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Drone,
    Walk,
    Egovid,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drone => "drone",
            Self::Walk => "walk",
            Self::Egovid => "egovid",
        }
    }

    /// Drone and walk records carry several regex-matched candidate
    /// instructions; egovid records carry a single declared image path.
    #[must_use]
    pub fn is_multi_candidate(self) -> bool {
        matches!(self, Self::Drone | Self::Walk)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = EditsetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "drone" => Ok(Self::Drone),
            "walk" => Ok(Self::Walk),
            "egovid" => Ok(Self::Egovid),
            other => Err(EditsetError::UnknownMode {
                value: other.to_string(),
            }),
        }
    }
}

/// One candidate edit instruction parsed from a source record.
///
/// Source records name their candidates through a field-key convention
/// (`SC<digits>_MOD_<digits>`); parsing happens once at ingestion so the rest
/// of the builder works against a typed list instead of re-scanning fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInstruction {
    /// The matched field key, e.g. `SC4_MOD_2`.
    pub key: String,
    /// The instruction text stored under that key.
    pub text: String,
}

/// A validated testset entry, one per verified edit candidate.
///
/// Written once by the builder and never mutated by it. The prompting engine
/// later adds generated fields; those ride along in `extra` so the record
/// count stays invariant while the field set grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRecord {
    /// Unique within a manifest: the original id, or `<id>_<key>` when the
    /// record came from a matched candidate key.
    pub test_id: String,
    /// Back-reference to the source record. Not an ownership relation.
    pub original_id: String,
    pub prompt: String,
    pub prompt_key: String,
    /// Verified to exist on disk at build time.
    pub last_frame_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_frame_path: Option<String>,
    pub mode: Mode,
    /// Fields added after the build (generated captions, raw fallbacks).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One audit-log line per emitted test record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditItem {
    pub test_id: String,
    pub last_frame_path: String,
}

/// Secondary build output for quick cross-run diffing. Not re-ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditLog {
    pub mode: Mode,
    pub total_count: usize,
    pub items: Vec<AuditItem>,
}
