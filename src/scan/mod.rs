//! Scanners heuristiques de l'espace d'adressage
//!
//! Trois phases strictement ordonnées : blocs compressés sur toute la ROM,
//! puis calcul des trous, puis fichiers non compressés dans les trous
//! seulement.

pub mod block;
pub mod events;
pub mod footer;
pub mod gaps;
pub mod region;

pub use crate::codec::CONTAINER_SIGNATURE;
pub use block::{BlockEnd, BlockScanner};
pub use events::{
    CollectingObserver, LogObserver, NullObserver, Phase, RejectReason, ScanEvent, ScanObserver,
};
pub use footer::FooterFileScanner;
pub use gaps::{find_gaps, AddressMap, GapAnalyzer, MapEntry, MapSummary};
pub use region::{
    generated_name, resolve_name, Confidence, FooterInfo, Region, RegionKind, ScanResult,
    SkipRegion, SkipRegions,
};

/// Terminateur d'un bloc compressé, suivi d'un champ de taille
pub const CONTAINER_TERMINATOR: [u8; 4] = [0x00, 0x10, 0x00, 0x00];

/// Longueur terminateur + champ de taille
pub const CONTAINER_TRAILER_LEN: usize = 8;

/// Pied d'un fichier non compressé, suivi de sa taille
pub const FOOTER_PATTERN: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// Longueur pied + champ de taille
pub const FOOTER_TRAILER_LEN: usize = 8;

pub const MIN_FOOTER_FILE_SIZE: u32 = 4;
pub const MAX_FOOTER_FILE_SIZE: u32 = 0x0100_0000;

/// Fenêtre de recherche du terminateur
pub const DEFAULT_SEARCH_WINDOW: usize = 1_000_000;

/// Grands blocs multimédia connus, jamais analysés
pub const KNOWN_LARGE_BLOCKS: [(u32, u32, &str); 4] = [
    (0x0033_8FEA, 0x00B6_3105, "MORT blocks"),
    (0x0144_0F38, 0x02B7_D8E9, "Video files"),
    (0x02BD_EFB2, 0x03AF_17FD, "JPEG files"),
    (0x03FD_0DF6, 0x03FF_FFFF, "Empty data"),
];

/// Régions ignorées par défaut
pub fn default_skip_regions() -> Vec<SkipRegion> {
    KNOWN_LARGE_BLOCKS
        .iter()
        .map(|&(start, end, label)| SkipRegion::new(start, end, label))
        .collect()
}
