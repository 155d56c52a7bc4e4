//! Régions de l'espace d'adressage et résultats de scan

use crate::catalog::CatalogMatch;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nature d'une région
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Bloc compressé découvert par signature
    Compressed,
    /// Fichier non compressé délimité par un pied de fichier
    Uncompressed,
    /// Grand bloc multimédia connu, jamais analysé
    KnownLargeBlock,
    /// Plage non revendiquée
    Gap,
}

impl RegionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionKind::Compressed => "compressed",
            RegionKind::Uncompressed => "uncompressed",
            RegionKind::KnownLargeBlock => "known",
            RegionKind::Gap => "gap",
        }
    }
}

/// Plage d'adresses inclusive `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: u32,
    pub end: u32,
    pub kind: RegionKind,
}

impl Region {
    pub fn new(start: u32, end: u32, kind: RegionKind) -> Self {
        debug_assert!(start <= end, "région inversée {start:#x}..{end:#x}");
        Self { start, end, kind }
    }

    /// Taille en octets
    pub fn size(&self) -> u64 {
        self.end as u64 - self.start as u64 + 1
    }

    pub fn contains(&self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }

    /// Vrai si les deux plages partagent au moins une adresse
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} - 0x{:08X} ({})", self.start, self.end, self.kind.as_str())
    }
}

/// Degré de confiance d'une découverte
///
/// Les bornes d'un bloc sont des hypothèses : une décompression réussie les
/// appuie sans les prouver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Terminateur trouvé et flux décompressé
    Verified,
    /// Flux décompressé, fin estimée (fenêtre de recherche ou fin de ROM)
    Inflated,
    /// Décompression impossible, octets conservés bruts
    Opaque,
    /// Fichier borné par un champ de taille validé
    FooterDelimited,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Verified => "verified",
            Confidence::Inflated => "inflated",
            Confidence::Opaque => "opaque",
            Confidence::FooterDelimited => "footer",
        }
    }

    /// Vrai si le contenu a été décompressé
    pub fn is_inflated(self) -> bool {
        matches!(self, Confidence::Verified | Confidence::Inflated)
    }
}

/// Position du pied de fichier d'un fichier non compressé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterInfo {
    /// Adresse du motif `00 01 00 00`
    pub footer_pos: u32,
    /// Valeur du champ de taille qui suit
    pub size_field: u32,
}

/// Fichier ou bloc découvert par un scanner
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub region: Region,

    /// Taille du bloc compressé, ou taille déclarée des données d'un fichier
    /// non compressé
    pub size: u32,

    /// Nom du fichier produit (catalogue ou nom généré)
    pub filename: String,

    /// Taille après décompression
    pub decoded_size: Option<u32>,

    /// Rapport taille décompressée / taille compressée
    pub compression_ratio: Option<f64>,

    pub confidence: Confidence,

    /// Annotation du catalogue si l'adresse y est connue
    pub catalog: Option<CatalogMatch>,

    /// Champ de taille suivant le terminateur d'un bloc compressé
    pub trailer_size: Option<u32>,

    pub footer: Option<FooterInfo>,
}

impl ScanResult {
    pub fn start(&self) -> u32 {
        self.region.start
    }

    pub fn end(&self) -> u32 {
        self.region.end
    }

    pub fn kind(&self) -> RegionKind {
        self.region.kind
    }

    /// Vrai si le catalogue connaît cette adresse
    pub fn is_known(&self) -> bool {
        self.catalog.is_some()
    }
}

/// Nom généré pour un résultat absent du catalogue
pub fn generated_name(confidence: Confidence, start: u32) -> String {
    let prefix = match confidence {
        Confidence::Verified | Confidence::Inflated => "decompressed",
        Confidence::Opaque => "compressed",
        Confidence::FooterDelimited => "uncompressed",
    };
    format!("{}_0x{:08X}.bin", prefix, start)
}

/// Nom du fichier : celui du catalogue s'il est renseigné, sinon généré
pub fn resolve_name(catalog: Option<&CatalogMatch>, confidence: Confidence, start: u32) -> String {
    match catalog {
        Some(known) if !known.filename.is_empty() => known.filename.clone(),
        _ => generated_name(confidence, start),
    }
}

/// Région toujours ignorée par les scanners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRegion {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub label: String,
}

impl SkipRegion {
    pub fn new(start: u32, end: u32, label: &str) -> Self {
        Self {
            start,
            end,
            label: label.to_string(),
        }
    }
}

/// Ensemble trié de régions ignorées
#[derive(Debug, Clone, Default)]
pub struct SkipRegions {
    regions: Vec<SkipRegion>,
}

impl SkipRegions {
    pub fn new(mut regions: Vec<SkipRegion>) -> Self {
        regions.retain(|r| r.start <= r.end);
        regions.sort_by_key(|r| r.start);
        Self { regions }
    }

    /// Région contenant `address`
    pub fn containing(&self, address: u32) -> Option<&SkipRegion> {
        self.regions
            .iter()
            .find(|r| r.start <= address && address <= r.end)
    }

    /// Début de la première région commençant après `address`
    pub fn next_start_after(&self, address: u32) -> Option<u32> {
        self.regions
            .iter()
            .map(|r| r.start)
            .find(|&start| start > address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkipRegion> {
        self.regions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
