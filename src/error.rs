//! Taxonomie des erreurs du moteur d'analyse
//!
//! Aucune de ces erreurs n'interrompt un scan complet : elles concernent un
//! seul bloc ou un seul asset, qui est alors conservé sous forme brute.
//! Seules une ROM illisible et un catalogue malformé sont fatals, et ils sont
//! détectés avant le début du scan.

use thiserror::Error;

/// Erreur du codec de compression
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Flux zlib invalide ou tronqué
    #[error("flux compressé invalide: {0}")]
    InvalidStream(String),

    /// Sortie décompressée au-delà de la limite autorisée
    #[error("sortie décompressée trop grande (> {limit} octets)")]
    OutputTooLarge { limit: usize },
}

/// Erreur de décodage d'un asset (image ou texte)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Champ d'en-tête hors de son domaine valide
    #[error("format incompatible: {field} = {value} ({expected})")]
    FormatMismatch {
        field: &'static str,
        value: u32,
        expected: &'static str,
    },

    /// Données insuffisantes pour la structure annoncée
    #[error("données tronquées: {needed} octets requis, {available} disponibles ({what})")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Décompression impossible
    #[error(transparent)]
    Decompression(#[from] CodecError),
}

/// Erreur de chargement du catalogue
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fichier catalogue illisible
    #[error("catalogue illisible: {0}")]
    Io(#[from] std::io::Error),

    /// JSON malformé
    #[error("catalogue JSON malformé: {0}")]
    Json(#[from] serde_json::Error),

    /// Plage inversée (début après fin)
    #[error("plage inversée pour {filename}: {start:#010X} > {end:#010X}")]
    InvertedRange { filename: String, start: u32, end: u32 },

    /// Type de fichier absent du catalogue
    #[error("type de fichier inconnu: {tag} (disponibles: {available})")]
    UnknownType { tag: String, available: String },
}

/// Résultat spécialisé pour le décodage d'assets
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
