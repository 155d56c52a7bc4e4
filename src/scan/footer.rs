//! Recherche des fichiers non compressés délimités par un pied de fichier
//!
//! Un fichier non compressé se termine par `[données][00 01 00 00][taille]`,
//! la taille étant un u32 big-endian. La recherche n'a lieu que dans les
//! trous laissés par les autres phases : le motif n'est pas unique à
//! l'intérieur des flux compressés.

use super::events::{Phase, RejectReason, ScanEvent, ScanObserver};
use super::region::{resolve_name, Confidence, FooterInfo, Region, RegionKind, ScanResult};
use super::{FOOTER_PATTERN, FOOTER_TRAILER_LEN, MAX_FOOTER_FILE_SIZE, MIN_FOOTER_FILE_SIZE};
use crate::catalog::CatalogIndex;
use crate::memory::{MemoryInterface, RomImage};
use rayon::prelude::*;

/// Scanner de pieds de fichier
pub struct FooterFileScanner<'a> {
    rom: &'a RomImage,
    catalog: &'a CatalogIndex,
}

impl<'a> FooterFileScanner<'a> {
    pub fn new(rom: &'a RomImage, catalog: &'a CatalogIndex) -> Self {
        Self { rom, catalog }
    }

    /// Analyse tous les trous et fusionne les résultats par adresse
    pub fn scan_gaps(
        &self,
        gaps: &[Region],
        parallel: bool,
        observer: &dyn ScanObserver,
    ) -> Vec<ScanResult> {
        observer.on_event(&ScanEvent::PhaseStarted(Phase::FooterScan));

        let mut results: Vec<ScanResult> = if parallel {
            gaps.par_iter()
                .flat_map_iter(|gap| self.scan_gap(gap, observer))
                .collect()
        } else {
            gaps.iter()
                .flat_map(|gap| self.scan_gap(gap, observer))
                .collect()
        };
        results.sort_by_key(|r| r.start());

        observer.on_event(&ScanEvent::PhaseFinished {
            phase: Phase::FooterScan,
            found: results.len(),
        });
        results
    }

    /// Analyse un seul trou `[start, end]`
    pub fn scan_gap(&self, gap: &Region, observer: &dyn ScanObserver) -> Vec<ScanResult> {
        let mut results = Vec::new();
        let trailer = FOOTER_TRAILER_LEN as u64;
        if gap.size() < trailer {
            return results;
        }

        // Dernière position de motif laissant la place au champ de taille
        let last = gap.end as u64 - (trailer - 1);
        let search_end = (last + FOOTER_PATTERN.len() as u64) as usize;
        let mut floor = gap.start as u64;
        let mut pos = gap.start as u64;

        while pos <= last {
            let Some(found) = self
                .rom
                .find_pattern(&FOOTER_PATTERN, pos as usize, search_end)
            else {
                break;
            };
            let footer_pos = found as u64;

            match self.evaluate(footer_pos, gap, floor) {
                Ok(result) => {
                    observer.on_event(&ScanEvent::FileFound {
                        kind: RegionKind::Uncompressed,
                        start: result.start(),
                        end: result.end(),
                        filename: result.filename.clone(),
                    });
                    floor = footer_pos + trailer;
                    pos = footer_pos + trailer;
                    results.push(result);
                }
                Err(reason) => {
                    observer.on_event(&ScanEvent::FooterRejected {
                        footer_pos: footer_pos as u32,
                        reason,
                    });
                    pos = footer_pos + 1;
                }
            }
        }

        results
    }

    /// Valide un candidat ; `floor` est la première adresse libre du trou
    fn evaluate(&self, footer_pos: u64, gap: &Region, floor: u64) -> Result<ScanResult, RejectReason> {
        let size_field = self
            .rom
            .read_u32(footer_pos as u32 + FOOTER_PATTERN.len() as u32)
            .map_err(|_| RejectReason::SizeFieldOutOfBounds)?;

        if !(MIN_FOOTER_FILE_SIZE..=MAX_FOOTER_FILE_SIZE).contains(&size_field) {
            return Err(RejectReason::SizeOutOfRange(size_field));
        }

        let data_start = footer_pos
            .checked_sub(size_field as u64)
            .ok_or(RejectReason::Underflow)?;
        let end = footer_pos + FOOTER_TRAILER_LEN as u64 - 1;
        if data_start < gap.start as u64 || end > gap.end as u64 {
            return Err(RejectReason::OutsideGap);
        }
        if data_start < floor {
            return Err(RejectReason::OverlapsAccepted);
        }

        let start = data_start as u32;
        let catalog = self.catalog.lookup(start).cloned();
        Ok(ScanResult {
            region: Region::new(start, end as u32, RegionKind::Uncompressed),
            size: size_field,
            filename: resolve_name(catalog.as_ref(), Confidence::FooterDelimited, start),
            decoded_size: None,
            compression_ratio: None,
            confidence: Confidence::FooterDelimited,
            catalog,
            trailer_size: None,
            footer: Some(FooterInfo {
                footer_pos: footer_pos as u32,
                size_field,
            }),
        })
    }
}
