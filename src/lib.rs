//! ROM Asset Scanner - Analyse et extraction d'assets d'images ROM
//!
//! Cette bibliothèque retrouve les fichiers d'une image ROM sans table des
//! matières : blocs compressés reconnus par signature, fichiers non
//! compressés délimités par un pied de fichier, et extraction des assets
//! décrits par un catalogue (images indexées, couleurs directes, textes).

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod memory;
pub mod pipeline;
pub mod scan;

pub use catalog::{Catalog, CatalogEntry, CatalogIndex, CatalogMatch};
pub use codec::{Decoded, DecodeWarning, PixelBuffer};
pub use config::ScannerConfig;
pub use error::{CatalogError, CodecError, DecodeError};
pub use extract::{AssetExtractor, AssetPayload, ExtractedAsset};
pub use memory::{MemoryInterface, RomFingerprint, RomImage};
pub use pipeline::{Pipeline, ScanReport};
pub use scan::{Confidence, Region, RegionKind, ScanEvent, ScanObserver, ScanResult};

/// Version du scanner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
