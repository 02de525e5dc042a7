//! Prompting-run configuration.
//!
//! One explicit value constructed at startup: file-sourced defaults overlaid
//! by CLI overrides, then passed by reference into the engine. No ambient
//! global state.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::prompts::PromptFamily;
use crate::types::Mode;

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub paths: PathsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Mode used when the CLI does not override it.
    #[serde(default)]
    pub input_mode: Option<String>,
    /// Base manifest path. Multi-candidate modes derive a per-mode variant
    /// from it; egovid uses it directly.
    pub json_file: PathBuf,
    /// Root directory for run artifacts (the engine's run summary).
    pub result_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Model identifier passed through to the inference backend.
    pub vlm_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// OpenAI-compatible inference endpoint.
    pub endpoint: String,
    pub batch_size: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Active template families for multi-candidate modes. `None` means the
    /// per-mode defaults.
    pub families: Option<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/v1".to_string(),
            batch_size: 50,
            temperature: 0.2,
            max_tokens: 1024,
            families: None,
        }
    }
}

impl PromptConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs_err::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// CLI override wins; otherwise the configured mode; otherwise egovid.
    pub fn resolve_mode(&self, cli_override: Option<Mode>) -> Result<Mode> {
        if let Some(mode) = cli_override {
            return Ok(mode);
        }
        match self.paths.input_mode.as_deref() {
            Some(value) => value.parse(),
            None => Ok(Mode::Egovid),
        }
    }

    /// Multi-candidate modes read `<mode>.json` next to the configured base
    /// manifest; egovid reads the base manifest itself.
    #[must_use]
    pub fn manifest_path(&self, mode: Mode) -> PathBuf {
        if mode.is_multi_candidate() {
            let dir = self
                .paths
                .json_file
                .parent()
                .unwrap_or_else(|| Path::new("."));
            dir.join(format!("{mode}.json"))
        } else {
            self.paths.json_file.clone()
        }
    }

    /// Resolve the active template families for a run.
    pub fn families(&self, mode: Mode) -> Result<Vec<PromptFamily>> {
        match &self.engine.families {
            Some(names) => names.iter().map(|name| name.parse()).collect(),
            None => Ok(PromptFamily::defaults_for(mode)),
        }
    }

    #[must_use]
    pub fn run_log_path(&self, mode: Mode) -> PathBuf {
        self.paths
            .result_root
            .join("logs")
            .join(format!("prompt_{mode}.json"))
    }
}
