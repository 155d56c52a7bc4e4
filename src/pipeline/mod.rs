//! Orchestration d'un scan complet
//!
//! L'ordre des phases est imposé : les fichiers non compressés ne sont
//! recherchés que dans les octets qu'aucun bloc compressé, entrée du
//! catalogue ou région connue ne revendique.

use crate::catalog::{Catalog, CatalogIndex};
use crate::codec::decompress;
use crate::config::ScanConfig;
use crate::memory::{MemoryInterface, RomFingerprint, RomImage};
use crate::scan::{
    AddressMap, BlockScanner, Confidence, FooterFileScanner, GapAnalyzer, MapSummary, Region,
    ScanObserver, ScanResult, SkipRegions,
};
use anyhow::{anyhow, Result};
use log::info;

/// Plus grande ROM adressable sur 32 bits
pub const MAX_ROM_SIZE: u64 = 1 << 32;

/// Pipeline de scan sur une ROM chargée
pub struct Pipeline<'a> {
    rom: &'a RomImage,
    catalog: CatalogIndex,
    skip: SkipRegions,
    search_window: usize,
    parallel_gaps: bool,
}

/// Résultat complet d'un scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub fingerprint: RomFingerprint,
    pub compressed: Vec<ScanResult>,
    pub uncompressed: Vec<ScanResult>,
    pub gaps: Vec<Region>,
    pub map: AddressMap,
}

impl<'a> Pipeline<'a> {
    pub fn new(rom: &'a RomImage, catalog: Option<&Catalog>, config: &ScanConfig) -> Result<Self> {
        if rom.size() as u64 > MAX_ROM_SIZE {
            return Err(anyhow!(
                "ROM trop grande pour un adressage 32 bits: {} octets",
                rom.size()
            ));
        }

        Ok(Self {
            rom,
            catalog: catalog.map(CatalogIndex::new).unwrap_or_default(),
            skip: config.skip_regions(),
            search_window: config.search_window,
            parallel_gaps: config.parallel_gaps,
        })
    }

    /// Exécute les trois phases et assemble le rapport
    pub fn run(&self, observer: &dyn ScanObserver) -> ScanReport {
        let fingerprint = self.rom.fingerprint();
        info!(
            "ROM {}: {} octets, CRC32 {:08X}, MD5 {}",
            fingerprint.name, fingerprint.size, fingerprint.crc32, fingerprint.md5
        );
        if !self.catalog.is_empty() {
            info!("Catalogue: {} entrées", self.catalog.len());
        }

        let rom_size = self.rom.size() as u64;
        let compressed = BlockScanner::new(self.rom, &self.catalog, &self.skip)
            .with_window(self.search_window)
            .scan(observer);

        let gaps = GapAnalyzer::new(rom_size, &self.catalog, &self.skip).analyze(&compressed, observer);

        let uncompressed =
            FooterFileScanner::new(self.rom, &self.catalog).scan_gaps(&gaps, self.parallel_gaps, observer);

        let mut all: Vec<ScanResult> = compressed.iter().chain(&uncompressed).cloned().collect();
        all.sort_by_key(|r| r.start());
        let map = AddressMap::build(rom_size, &all, &self.skip);

        let report = ScanReport {
            fingerprint,
            compressed,
            uncompressed,
            gaps,
            map,
        };
        report.log_summary();
        report
    }
}

impl ScanReport {
    /// Tous les résultats, triés par adresse de début
    pub fn results(&self) -> Vec<&ScanResult> {
        let mut results: Vec<&ScanResult> = self.compressed.iter().chain(&self.uncompressed).collect();
        results.sort_by_key(|r| r.start());
        results
    }

    pub fn summary(&self) -> MapSummary {
        self.map.summary()
    }

    fn log_summary(&self) {
        let summary = self.summary();
        let known = self.results().iter().filter(|r| r.is_known()).count();
        info!(
            "Scan terminé: {} blocs compressés, {} fichiers non compressés ({} connus du catalogue)",
            self.compressed.len(),
            self.uncompressed.len(),
            known
        );
        info!(
            "Carte: {} fichiers, {} régions connues, {} trous",
            summary.files, summary.known_regions, summary.gaps
        );
        info!(
            "Couverture: {:.1}% ({} octets revendiqués, {} octets non revendiqués)",
            summary.coverage(),
            summary.mapped_bytes(),
            summary.unmapped_bytes
        );
    }
}

/// Contenu d'un résultat de scan : flux décompressé ou octets bruts
pub fn payload(rom: &RomImage, result: &ScanResult) -> Result<Vec<u8>> {
    let raw = rom.range(result.start(), result.end())?;
    match result.confidence {
        Confidence::Verified | Confidence::Inflated => Ok(decompress(raw)?),
        Confidence::Opaque => Ok(raw.to_vec()),
        Confidence::FooterDelimited => Ok(raw[..result.size as usize].to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::codec::compression::tests::container;
    use crate::scan::{CollectingObserver, NullObserver, RegionKind, ScanEvent, SkipRegion};

    /// ROM de test : un bloc compressé, un fichier non compressé, une
    /// région connue
    fn sample_rom() -> (RomImage, Vec<u8>) {
        let payload = b"compressed payload".to_vec();
        let mut data = vec![0u8; 0x1000];

        let stream = container(&payload);
        data[0x100..0x100 + stream.len()].copy_from_slice(&stream);
        let term = 0x100 + stream.len();
        data[term..term + 4].copy_from_slice(&[0x00, 0x10, 0x00, 0x00]);
        data[term + 4..term + 8].copy_from_slice(&(payload.len() as u32).to_be_bytes());

        data[0x500..0x520].copy_from_slice(&[0x5A; 0x20]);
        data[0x520..0x524].copy_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        data[0x524..0x528].copy_from_slice(&0x20u32.to_be_bytes());

        (RomImage::new(data), payload)
    }

    fn config() -> ScanConfig {
        ScanConfig {
            skip_regions: vec![SkipRegion::new(0xC00, 0xCFF, "Video files")],
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_phases() -> Result<()> {
        let (rom, expected) = sample_rom();
        let observer = CollectingObserver::new();

        let report = Pipeline::new(&rom, None, &config())?.run(&observer);

        assert_eq!(report.compressed.len(), 1);
        assert_eq!(report.compressed[0].start(), 0x100);
        assert_eq!(report.compressed[0].confidence, Confidence::Verified);
        assert_eq!(report.uncompressed.len(), 1);
        assert_eq!(
            (report.uncompressed[0].start(), report.uncompressed[0].end()),
            (0x500, 0x527)
        );

        let results = report.results();
        assert_eq!(payload(&rom, results[0])?, expected);
        assert_eq!(payload(&rom, results[1])?, vec![0x5A; 0x20]);

        // Aucun trou ne recouvre la région connue
        assert!(report.gaps.iter().all(|g| g.end < 0xC00 || g.start > 0xCFF));
        assert_eq!(
            observer.count(|e| matches!(e, ScanEvent::PhaseFinished { .. })),
            3
        );

        let summary = report.summary();
        assert_eq!((summary.files, summary.known_regions), (2, 1));
        Ok(())
    }

    #[test]
    fn test_catalog_spans_are_not_footer_scanned() -> Result<()> {
        let (rom, _) = sample_rom();
        let mut catalog = Catalog::default();
        catalog.insert(CatalogEntry::new("misc", "table.bin", 0x4F0, 0x530));

        let report = Pipeline::new(&rom, Some(&catalog), &config())?.run(&NullObserver);

        assert!(report.uncompressed.is_empty());
        assert!(report
            .map
            .entries()
            .iter()
            .all(|e| e.region.kind != RegionKind::Uncompressed));
        Ok(())
    }

    #[test]
    fn test_results_tile_with_map() -> Result<()> {
        let (rom, _) = sample_rom();
        let report = Pipeline::new(&rom, None, &config())?.run(&NullObserver);

        let total: u64 = report.map.entries().iter().map(|e| e.region.size()).sum();
        assert_eq!(total, rom.size() as u64);
        Ok(())
    }
}
