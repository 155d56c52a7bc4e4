//! Analyse des trous et carte complète de l'espace d'adressage

use super::events::{Phase, ScanEvent, ScanObserver};
use super::region::{Region, RegionKind, ScanResult, SkipRegions};
use crate::catalog::CatalogIndex;

/// Calcule les plages non revendiquées de `[0, rom_size)`
///
/// Les plages fournies sont inclusives, peuvent se chevaucher et sont
/// rognées à la taille de la ROM. Les trous retournés et les plages
/// d'entrée pavent exactement l'espace d'adressage.
pub fn find_gaps<I>(spans: I, rom_size: u64) -> Vec<Region>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut spans: Vec<(u64, u64)> = spans
        .into_iter()
        .filter(|&(start, end)| start <= end && (start as u64) < rom_size)
        .map(|(start, end)| (start as u64, (end as u64).min(rom_size - 1)))
        .collect();
    spans.sort_unstable();

    let mut gaps = Vec::new();
    let mut current = 0u64;

    for (start, end) in spans {
        if start > current {
            gaps.push(gap(current, start - 1));
        }
        current = current.max(end + 1);
    }

    if current < rom_size {
        gaps.push(gap(current, rom_size - 1));
    }

    gaps
}

fn gap(start: u64, end: u64) -> Region {
    Region::new(start as u32, end as u32, RegionKind::Gap)
}

/// Analyseur de trous : blocs découverts, catalogue et régions ignorées
pub struct GapAnalyzer<'a> {
    rom_size: u64,
    catalog: &'a CatalogIndex,
    skip: &'a SkipRegions,
}

impl<'a> GapAnalyzer<'a> {
    pub fn new(rom_size: u64, catalog: &'a CatalogIndex, skip: &'a SkipRegions) -> Self {
        Self {
            rom_size,
            catalog,
            skip,
        }
    }

    /// Trous restant après exclusion de tout ce qui est déjà revendiqué
    pub fn analyze(&self, results: &[ScanResult], observer: &dyn ScanObserver) -> Vec<Region> {
        observer.on_event(&ScanEvent::PhaseStarted(Phase::GapAnalysis));

        let spans = results
            .iter()
            .map(|r| (r.start(), r.end()))
            .chain(self.catalog.spans())
            .chain(self.skip.iter().map(|s| (s.start, s.end)));
        let gaps = find_gaps(spans, self.rom_size);

        for gap in &gaps {
            observer.on_event(&ScanEvent::GapFound {
                start: gap.start,
                end: gap.end,
            });
        }

        observer.on_event(&ScanEvent::PhaseFinished {
            phase: Phase::GapAnalysis,
            found: gaps.len(),
        });
        gaps
    }
}

/// Ligne de la carte de la ROM
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub region: Region,

    /// Sous-type : nature du fichier, libellé de la région connue ou
    /// `Unmapped`
    pub subtype: String,

    pub known: bool,
    pub filename: String,
    pub compressed_size: Option<u32>,
    pub decompressed_size: Option<u32>,
}

impl MapEntry {
    /// Colonne `Type` de la carte
    pub fn type_label(&self) -> &'static str {
        match self.region.kind {
            RegionKind::Compressed | RegionKind::Uncompressed => "File",
            RegionKind::KnownLargeBlock => "Known Region",
            RegionKind::Gap => "Gap",
        }
    }

    fn file(result: &ScanResult) -> Self {
        Self {
            region: result.region,
            subtype: result.kind().as_str().to_string(),
            known: result.is_known(),
            filename: result.filename.clone(),
            compressed_size: Some(result.size),
            decompressed_size: Some(result.decoded_size.unwrap_or(result.size)),
        }
    }

    fn unmapped(region: Region) -> Self {
        Self {
            region,
            subtype: "Unmapped".to_string(),
            known: false,
            filename: String::new(),
            compressed_size: None,
            decompressed_size: None,
        }
    }
}

/// Statistiques de couverture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapSummary {
    pub files: usize,
    pub known_regions: usize,
    pub gaps: usize,
    pub file_bytes: u64,
    pub known_bytes: u64,
    pub unmapped_bytes: u64,
    pub rom_size: u64,
}

impl MapSummary {
    pub fn mapped_bytes(&self) -> u64 {
        self.file_bytes + self.known_bytes
    }

    /// Pourcentage de la ROM couvert par des fichiers ou régions connues
    pub fn coverage(&self) -> f64 {
        if self.rom_size == 0 {
            return 0.0;
        }
        self.mapped_bytes() as f64 * 100.0 / self.rom_size as f64
    }
}

/// Carte contiguë de `[0, rom_size)` : fichiers, régions connues, trous
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressMap {
    entries: Vec<MapEntry>,
    rom_size: u64,
}

impl AddressMap {
    /// Construit la carte ; les trous sont calculés sans le catalogue
    pub fn build(rom_size: u64, results: &[ScanResult], skip: &SkipRegions) -> Self {
        let mut entries: Vec<MapEntry> = results.iter().map(MapEntry::file).collect();

        for known in skip.iter().filter(|s| (s.start as u64) < rom_size) {
            let end = (known.end as u64).min(rom_size - 1) as u32;
            entries.push(MapEntry {
                region: Region::new(known.start, end, RegionKind::KnownLargeBlock),
                subtype: if known.label.is_empty() {
                    "Unknown".to_string()
                } else {
                    known.label.clone()
                },
                known: true,
                filename: String::new(),
                compressed_size: None,
                decompressed_size: None,
            });
        }

        let gaps = find_gaps(entries.iter().map(|e| (e.region.start, e.region.end)), rom_size);
        entries.extend(gaps.into_iter().map(MapEntry::unmapped));
        entries.sort_by_key(|e| (e.region.start, e.region.end));

        Self { entries, rom_size }
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn summary(&self) -> MapSummary {
        let mut summary = MapSummary {
            rom_size: self.rom_size,
            ..Default::default()
        };

        for entry in &self.entries {
            let size = entry.region.size();
            match entry.region.kind {
                RegionKind::Compressed | RegionKind::Uncompressed => {
                    summary.files += 1;
                    summary.file_bytes += size;
                }
                RegionKind::KnownLargeBlock => {
                    summary.known_regions += 1;
                    summary.known_bytes += size;
                }
                RegionKind::Gap => summary.gaps += 1,
            }
        }
        summary.unmapped_bytes = self.rom_size.saturating_sub(summary.mapped_bytes());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::events::{CollectingObserver, NullObserver};
    use crate::scan::region::{Confidence, SkipRegion};

    fn bounds(regions: &[Region]) -> Vec<(u32, u32)> {
        regions.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn test_gaps_between_spans() {
        let gaps = find_gaps(vec![(0x10, 0x1F), (0x40, 0x4F)], 0x100);
        assert_eq!(bounds(&gaps), vec![(0x00, 0x0F), (0x20, 0x3F), (0x50, 0xFF)]);
    }

    #[test]
    fn test_overlapping_and_nested_spans() {
        let gaps = find_gaps(vec![(0x20, 0x3F), (0x00, 0x2F), (0x24, 0x28), (0x41, 0x41)], 0x42);
        assert_eq!(bounds(&gaps), vec![(0x40, 0x40)]);
    }

    #[test]
    fn test_spans_clipped_to_rom() {
        assert!(find_gaps(vec![(0, 0xFFFF)], 0x100).is_empty());
        let gaps = find_gaps(vec![(0x200, 0x300)], 0x100);
        assert_eq!(bounds(&gaps), vec![(0, 0xFF)]);
        assert!(find_gaps(Vec::new(), 0).is_empty());
    }

    #[test]
    fn test_analyzer_excludes_catalog_and_skips() {
        let mut catalog = crate::catalog::Catalog::default();
        catalog.insert(crate::catalog::CatalogEntry::new("text_blocks", "a.txt", 0x80, 0x8F));
        let index = CatalogIndex::new(&catalog);
        let skip = SkipRegions::new(vec![SkipRegion::new(0xC0, 0xFF, "vidéo")]);
        let observer = CollectingObserver::new();

        let gaps = GapAnalyzer::new(0x100, &index, &skip).analyze(&[], &observer);

        assert_eq!(bounds(&gaps), vec![(0x00, 0x7F), (0x90, 0xBF)]);
        assert_eq!(observer.count(|e| matches!(e, ScanEvent::GapFound { .. })), 2);
    }

    #[test]
    fn test_address_map_is_contiguous() {
        let result = ScanResult {
            region: Region::new(0x10, 0x2F, RegionKind::Compressed),
            size: 0x20,
            filename: "decompressed_0x00000010.bin".to_string(),
            decoded_size: Some(0x80),
            compression_ratio: Some(4.0),
            confidence: Confidence::Verified,
            catalog: None,
            trailer_size: None,
            footer: None,
        };
        let skip = SkipRegions::new(vec![
            SkipRegion::new(0x80, 0x9F, "Video files"),
            SkipRegion::new(0x400, 0x4FF, "hors ROM"),
        ]);

        let map = AddressMap::build(0x100, &[result], &skip);
        let entries = map.entries();

        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].region.start, 0);
        assert_eq!(entries.last().unwrap().region.end, 0xFF);
        for pair in entries.windows(2) {
            assert_eq!(pair[0].region.end + 1, pair[1].region.start);
        }
        assert_eq!(entries[1].type_label(), "File");
        assert_eq!(entries[1].decompressed_size, Some(0x80));
        assert_eq!(entries[3].subtype, "Video files");
        assert_eq!(entries[4].subtype, "Unmapped");

        let summary = map.summary();
        assert_eq!((summary.files, summary.known_regions, summary.gaps), (1, 1, 3));
        assert_eq!(summary.mapped_bytes(), 0x40);
        assert_eq!(summary.unmapped_bytes, 0xC0);
        assert!((summary.coverage() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rom_map() {
        let map = AddressMap::build(0, &[], &SkipRegions::default());
        assert!(map.entries().is_empty());
        assert_eq!(map.summary().coverage(), 0.0);
        let _ = GapAnalyzer::new(0, &CatalogIndex::empty(), &SkipRegions::default())
            .analyze(&[], &NullObserver);
    }
}
