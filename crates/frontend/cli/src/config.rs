//! Scene configuration: which segments map where, and decode limits

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gbi_core::BankTable;
use gbi_f3dex2::DecodeOptions;
use serde::{Deserialize, Serialize};

/// Contents of a `--config` file
///
/// ```json
/// { "banks": { "6": { "base": 0, "size": 65536 } },
///   "options": { "limits": { "max_call_depth": 32 } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub banks: BankTable,
    #[serde(default)]
    pub options: DecodeOptions,
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `SEG=BASE[:SIZE]` overrides on top of the file's bank table
    pub fn apply_bank_specs(&mut self, specs: &[String]) -> Result<()> {
        for spec in specs {
            let (segment, bank) = BankTable::parse_bank_spec(spec)?;
            self.banks.insert(segment, bank);
        }
        Ok(())
    }
}
