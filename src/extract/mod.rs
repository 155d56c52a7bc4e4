//! Extraction pilotée par le catalogue
//!
//! Chaque entrée du catalogue est lue dans la ROM puis décodée selon son
//! étiquette de type. Un échec de décodage n'est jamais fatal : l'asset est
//! alors conservé sous forme d'octets bruts.

use crate::catalog::{Catalog, CatalogEntry};
use crate::codec::{decode_direct_tagged, decode_indexed, decompress, DecodeWarning, Decoded, PixelBuffer};
use crate::error::{DecodeError, DecodeResult};
use crate::memory::{MemoryInterface, RomImage};
use crate::pipeline::payload;
use crate::scan::{Phase, ScanEvent, ScanObserver, ScanResult};
use anyhow::{anyhow, Result};
use log::{debug, warn};

/// Étiquette des images compressées
pub const COMPRESSED_IMAGES: &str = "compressed_images";

/// Étiquette des blocs de texte
pub const TEXT_BLOCKS: &str = "text_blocks";

/// Format direct utilisé en l'absence de `format`
pub const DEFAULT_DIRECT_FORMAT: &str = "24-bit";

/// Contenu décodé d'un asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPayload {
    Image(PixelBuffer),
    Text(String),
    Raw(Vec<u8>),
}

/// Asset extrait d'une entrée du catalogue
#[derive(Debug, Clone)]
pub struct ExtractedAsset {
    pub entry: CatalogEntry,
    pub payload: AssetPayload,
    pub warnings: Vec<DecodeWarning>,

    /// Octets lus dans la ROM, conservés pour un repli à l'écriture
    pub source: Vec<u8>,

    /// Raison du repli sur les octets bruts, le cas échéant
    pub fallback: Option<String>,
}

/// Ligne du résumé des blocs de texte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRow {
    pub start: u32,
    pub end: u32,
    pub filename: String,
    pub content: String,
}

impl ExtractedAsset {
    fn decoded(
        entry: &CatalogEntry,
        data: &[u8],
        payload: AssetPayload,
        warnings: Vec<DecodeWarning>,
    ) -> Self {
        Self {
            entry: entry.clone(),
            payload,
            warnings,
            source: data.to_vec(),
            fallback: None,
        }
    }

    fn raw(entry: &CatalogEntry, data: &[u8], reason: Option<String>) -> Self {
        Self {
            entry: entry.clone(),
            payload: AssetPayload::Raw(data.to_vec()),
            warnings: Vec::new(),
            source: data.to_vec(),
            fallback: reason,
        }
    }

    /// Ligne de résumé si l'asset est un bloc de texte décodé
    pub fn text_row(&self) -> Option<TextRow> {
        match &self.payload {
            AssetPayload::Text(content) if self.entry.type_tag == TEXT_BLOCKS => Some(TextRow {
                start: self.entry.start,
                end: self.entry.end,
                filename: self.entry.filename.clone(),
                content: content.clone(),
            }),
            _ => None,
        }
    }
}

/// Extracteur d'assets
pub struct AssetExtractor<'a> {
    rom: &'a RomImage,
}

impl<'a> AssetExtractor<'a> {
    pub fn new(rom: &'a RomImage) -> Self {
        Self { rom }
    }

    /// Extrait toutes les entrées du catalogue, groupe par groupe
    pub fn extract_all(&self, catalog: &Catalog, observer: &dyn ScanObserver) -> Vec<ExtractedAsset> {
        observer.on_event(&ScanEvent::PhaseStarted(Phase::Extraction));

        let assets: Vec<ExtractedAsset> = catalog
            .entries()
            .filter_map(|entry| self.extract(entry))
            .inspect(|asset| {
                for warning in &asset.warnings {
                    observer.on_event(&ScanEvent::DecodeWarning {
                        filename: asset.entry.filename.clone(),
                        warning: warning.clone(),
                    });
                }
            })
            .collect();

        observer.on_event(&ScanEvent::PhaseFinished {
            phase: Phase::Extraction,
            found: assets.len(),
        });
        assets
    }

    /// Extrait une entrée ; `None` si sa longueur de lecture est négative
    /// ou si elle commence après la fin de la ROM
    pub fn extract(&self, entry: &CatalogEntry) -> Option<ExtractedAsset> {
        let data = self.read_entry(entry)?;

        let asset = match entry.type_tag.as_str() {
            COMPRESSED_IMAGES => self.extract_image(entry, data),
            TEXT_BLOCKS => self.extract_text(entry, data),
            _ => ExtractedAsset::raw(entry, data, None),
        };

        if let Some(reason) = &asset.fallback {
            warn!("{}: {}, octets bruts conservés", entry.filename, reason);
        } else {
            debug!("{} ({} octets lus)", entry.filename, data.len());
        }
        Some(asset)
    }

    /// Octets de l'entrée, tronqués à la fin de la ROM
    fn read_entry(&self, entry: &CatalogEntry) -> Option<&'a [u8]> {
        let len = entry.read_len();
        if len < 0 {
            warn!(
                "{}: plage trop courte pour la remorque ({} octets), entrée ignorée",
                entry.filename, len
            );
            return None;
        }

        let start = entry.start as usize;
        let size = self.rom.size();
        if start > size {
            warn!(
                "{}: début 0x{:08X} au-delà de la ROM, entrée ignorée",
                entry.filename, entry.start
            );
            return None;
        }

        let len = len as usize;
        let available = size - start;
        if len > available {
            warn!(
                "{}: lecture tronquée à la fin de la ROM ({} octets sur {})",
                entry.filename, available, len
            );
        }
        self.rom.slice(entry.start, len.min(available)).ok()
    }

    fn extract_image(&self, entry: &CatalogEntry, data: &[u8]) -> ExtractedAsset {
        match decode_catalog_image(entry, data) {
            Ok(Some(decoded)) => {
                ExtractedAsset::decoded(entry, data, AssetPayload::Image(decoded.value), decoded.warnings)
            }
            Ok(None) => ExtractedAsset::raw(entry, data, Some("format d'image inconnu".to_string())),
            Err(e) => ExtractedAsset::raw(entry, data, Some(e.to_string())),
        }
    }

    fn extract_text(&self, entry: &CatalogEntry, data: &[u8]) -> ExtractedAsset {
        let text = if entry.is_compressed() {
            match decompress(data) {
                Ok(inflated) => inflated,
                Err(e) => return ExtractedAsset::raw(entry, data, Some(e.to_string())),
            }
        } else {
            data.to_vec()
        };

        let content = String::from_utf8_lossy(&text).into_owned();
        ExtractedAsset::decoded(entry, data, AssetPayload::Text(content), Vec::new())
    }
}

/// Décode une image du catalogue selon ses champs de format
///
/// `Ok(None)` lorsque l'entrée ne décrit ni format indexé ni dimensions.
pub fn decode_catalog_image(entry: &CatalogEntry, data: &[u8]) -> DecodeResult<Option<Decoded<PixelBuffer>>> {
    let format = entry.format.as_deref();

    if matches!(format, Some("CI4") | Some("CI8")) {
        let inflated = decompress(data).map_err(DecodeError::from)?;
        return decode_indexed(&inflated).map(Some);
    }

    match (entry.image_width, entry.image_height) {
        (Some(width), Some(height)) => {
            let inflated = decompress(data).map_err(DecodeError::from)?;
            decode_direct_tagged(&inflated, width, height, format.unwrap_or(DEFAULT_DIRECT_FORMAT)).map(Some)
        }
        _ => Ok(None),
    }
}

/// Décode comme image indexée le contenu d'un bloc compressé découvert
pub fn decode_scanned_image(rom: &RomImage, result: &ScanResult) -> Result<Decoded<PixelBuffer>> {
    if !result.confidence.is_inflated() {
        return Err(anyhow!(
            "{}: bloc non décompressable ({})",
            result.filename,
            result.confidence.as_str()
        ));
    }
    let inflated = payload(rom, result)?;
    Ok(decode_indexed(&inflated)?)
}
