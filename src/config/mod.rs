//! Configuration du scanner

use crate::scan::{default_skip_regions, SkipRegion, SkipRegions, DEFAULT_SEARCH_WINDOW};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration principale du scanner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Fenêtre de recherche du terminateur d'un bloc compressé
    pub search_window: usize,
    /// Analyse des trous sur le pool rayon
    pub parallel_gaps: bool,
    pub skip_regions: Vec<SkipRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub results_csv: String,
    pub map_csv: String,
    /// Écrit le contenu de chaque bloc découvert
    pub write_payloads: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub directory: PathBuf,
    pub text_summary_csv: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            search_window: DEFAULT_SEARCH_WINDOW,
            parallel_gaps: false,
            skip_regions: default_skip_regions(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("extracted_files"),
            results_csv: "rom_scan_results.csv".to_string(),
            map_csv: "rom_map.csv".to_string(),
            write_payloads: true,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("extracted_assets"),
            text_summary_csv: "text_blocks_summary.csv".to_string(),
        }
    }
}

impl ScanConfig {
    pub fn skip_regions(&self) -> SkipRegions {
        SkipRegions::new(self.skip_regions.clone())
    }
}

impl ScannerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("configuration illisible: {}", path.display()))?;
        let config: ScannerConfig = toml::from_str(&contents)
            .with_context(|| format!("configuration invalide: {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }
}
