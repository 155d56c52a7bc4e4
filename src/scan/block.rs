//! Recherche des blocs compressés par signature
//!
//! Parcourt l'espace d'adressage à la recherche de la signature `68 DE`,
//! détermine la fin de chaque bloc grâce au terminateur `00 10 00 00` puis
//! tente de le décompresser. Un bloc indécompressable est tout de même
//! enregistré, marqué opaque.

use super::events::{Phase, ScanEvent, ScanObserver};
use super::region::{resolve_name, Confidence, Region, RegionKind, ScanResult, SkipRegions};
use super::{CONTAINER_TERMINATOR, CONTAINER_TRAILER_LEN, DEFAULT_SEARCH_WINDOW};
use crate::catalog::CatalogIndex;
use crate::codec::{decompress, CONTAINER_SIGNATURE};
use crate::memory::{MemoryInterface, RomImage};

/// Fin d'un bloc candidat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEnd {
    /// Adresse exclusive de fin
    pub end: usize,
    /// Vrai si le terminateur a été trouvé
    pub terminated: bool,
}

/// Scanner de blocs compressés
pub struct BlockScanner<'a> {
    rom: &'a RomImage,
    catalog: &'a CatalogIndex,
    skip: &'a SkipRegions,
    window: usize,
}

impl<'a> BlockScanner<'a> {
    pub fn new(rom: &'a RomImage, catalog: &'a CatalogIndex, skip: &'a SkipRegions) -> Self {
        Self {
            rom,
            catalog,
            skip,
            window: DEFAULT_SEARCH_WINDOW,
        }
    }

    /// Fenêtre de recherche du terminateur
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(CONTAINER_TRAILER_LEN);
        self
    }

    /// Analyse toute la ROM
    pub fn scan(&self, observer: &dyn ScanObserver) -> Vec<ScanResult> {
        self.scan_range(0, self.rom.size(), observer)
    }

    /// Analyse la plage `[start, end)`
    pub fn scan_range(&self, start: usize, end: usize, observer: &dyn ScanObserver) -> Vec<ScanResult> {
        observer.on_event(&ScanEvent::PhaseStarted(Phase::CompressedScan));

        let end = end.min(self.rom.size());
        let bytes = self.rom.bytes();
        let mut results = Vec::new();
        let mut i = start;

        while i + 1 < end {
            if let Some(skip) = self.skip.containing(i as u32) {
                observer.on_event(&ScanEvent::KnownRegionSkipped {
                    start: skip.start,
                    end: skip.end,
                });
                i = skip.end as usize + 1;
                continue;
            }

            // Saut direct jusqu'à la prochaine signature avant une région ignorée
            let stop = self.limit_after(i, end);
            let Some(offset) = bytes[i..stop]
                .windows(CONTAINER_SIGNATURE.len())
                .position(|w| w == CONTAINER_SIGNATURE)
            else {
                i = stop.max(i + 1);
                continue;
            };
            i += offset;

            let result = self.process_block(i, stop);
            observer.on_event(&ScanEvent::BlockFound {
                start: result.start(),
                end: result.end(),
                confidence: result.confidence,
                filename: result.filename.clone(),
            });
            i = result.end() as usize + 1;
            results.push(result);
        }

        observer.on_event(&ScanEvent::PhaseFinished {
            phase: Phase::CompressedScan,
            found: results.len(),
        });
        results
    }

    /// Fin exclusive utilisable depuis `i` : fin de plage ou début de la
    /// prochaine région ignorée
    fn limit_after(&self, i: usize, end: usize) -> usize {
        self.skip
            .next_start_after(i as u32)
            .map_or(end, |start| (start as usize).min(end))
    }

    /// Cherche la fin d'un bloc commençant à `start`, sans dépasser `limit`
    pub fn find_block_end(&self, start: usize, limit: usize) -> BlockEnd {
        let horizon = start.saturating_add(self.window).min(limit);
        // Le terminateur doit laisser la place au champ de taille
        let last = horizon.min(limit.saturating_sub(CONTAINER_TRAILER_LEN - 1));

        match self
            .rom
            .find_pattern(&CONTAINER_TERMINATOR, start + 2, last + CONTAINER_TERMINATOR.len() - 1)
        {
            Some(offset) => BlockEnd {
                end: offset + CONTAINER_TRAILER_LEN,
                terminated: true,
            },
            None => BlockEnd {
                end: horizon,
                terminated: false,
            },
        }
    }

    /// Délimite, décompresse et annote le bloc commençant à `start`
    pub fn process_block(&self, start: usize, limit: usize) -> ScanResult {
        let block = self.find_block_end(start, limit);
        let data = &self.rom.bytes()[start..block.end];

        let (confidence, decoded_size) = match decompress(data) {
            Ok(inflated) if block.terminated => (Confidence::Verified, inflated.len()),
            Ok(inflated) => (Confidence::Inflated, inflated.len()),
            Err(_) => (Confidence::Opaque, data.len()),
        };

        let trailer_size = if block.terminated {
            self.rom.read_u32((block.end - 4) as u32).ok()
        } else {
            None
        };

        let start_addr = start as u32;
        let catalog = self.catalog.lookup(start_addr).cloned();
        ScanResult {
            region: Region::new(start_addr, (block.end - 1) as u32, RegionKind::Compressed),
            size: data.len() as u32,
            filename: resolve_name(catalog.as_ref(), confidence, start_addr),
            decoded_size: Some(decoded_size as u32),
            compression_ratio: Some(decoded_size as f64 / data.len() as f64),
            confidence,
            catalog,
            trailer_size,
            footer: None,
        }
    }
}
