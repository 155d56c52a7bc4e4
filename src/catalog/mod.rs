//! Catalogue des fichiers connus de la ROM (`file_table.json`)
//!
//! Le catalogue associe des étiquettes de type (`compressed_images`,
//! `text_blocks`, ...) à des listes d'entrées décrivant une plage d'adresses
//! et un format. Il est chargé une seule fois et n'est jamais modifié par le
//! moteur ; il sert à annoter les résultats du scan et à piloter
//! l'extraction.

use crate::error::CatalogError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Longueur de la remorque (terminateur + taille) retirée des entrées
/// portant la clé `is_compressed`
pub const ENTRY_TRAILER_LEN: i64 = 8;

/// Catalogue complet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Entrées regroupées par étiquette de type
    #[serde(default)]
    pub files: BTreeMap<String, Vec<CatalogEntry>>,

    /// Champs de premier niveau conservés tels quels
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Entrée du catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Étiquette de type (clé du groupe, renseignée au chargement)
    #[serde(skip)]
    pub type_tag: String,

    /// Nom du fichier à produire
    #[serde(default)]
    pub filename: String,

    /// Adresse de début (inclusive)
    #[serde(rename = "start_addr", with = "hex_address")]
    pub start: u32,

    /// Adresse de fin (inclusive)
    #[serde(rename = "end_addr", with = "hex_address")]
    pub end: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Value>,

    /// Indicateur de compression ; sa seule présence (même `null` ou
    /// `false`) modifie la taille lue
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_compressed: Option<Value>,

    /// Format de pixels (`CI4`, `CI8`, `16-bit`, `24-bit`, `32-bit`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette_format: Option<String>,

    /// Champs spécifiques non interprétés
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CatalogEntry {
    /// Crée une entrée minimale
    pub fn new(type_tag: &str, filename: &str, start: u32, end: u32) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            filename: filename.to_string(),
            start,
            end,
            size: None,
            size_bytes: None,
            compression: None,
            is_compressed: None,
            format: None,
            image_width: None,
            image_height: None,
            palette_format: None,
            extra: BTreeMap::new(),
        }
    }

    /// Vrai si la clé `is_compressed` est présente, quelle que soit sa valeur
    pub fn has_compression_flag(&self) -> bool {
        self.is_compressed.is_some()
    }

    /// Vrai si `is_compressed` est présent et vaut vrai
    pub fn is_compressed(&self) -> bool {
        self.is_compressed.as_ref().is_some_and(truthy)
    }

    /// Nombre d'octets à lire pour cette entrée
    ///
    /// Plage inclusive complète, moins 8 octets de remorque si la clé
    /// `is_compressed` est présente. Peut être négatif pour une plage trop
    /// courte.
    pub fn read_len(&self) -> i64 {
        let span = self.end as i64 - self.start as i64 + 1;
        if self.has_compression_flag() {
            span - ENTRY_TRAILER_LEN
        } else {
            span
        }
    }
}

/// Interprétation souple d'un booléen JSON
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Désérialise une clé présente en `Some`, même si sa valeur est `null`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Adresses sous forme de chaînes hexadécimales (`"0x0012ABCD"`)
mod hex_address {
    use super::*;

    pub fn serialize<S: Serializer>(address: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:08X}", address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_hex(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("adresse hexadécimale invalide: {text:?}")))
    }
}

/// Analyse une adresse hexadécimale avec ou sans préfixe `0x`
pub fn parse_hex(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).ok()
}

impl Catalog {
    /// Charge un catalogue depuis un fichier JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Analyse un catalogue JSON et valide ses plages
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_json::from_str(json)?;

        for (tag, entries) in catalog.files.iter_mut() {
            for entry in entries.iter_mut() {
                entry.type_tag = tag.clone();
                if entry.start > entry.end {
                    return Err(CatalogError::InvertedRange {
                        filename: entry.filename.clone(),
                        start: entry.start,
                        end: entry.end,
                    });
                }
            }
        }

        Ok(catalog)
    }

    /// Enregistre le catalogue au format JSON indenté
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Ajoute une entrée sous son étiquette de type
    pub fn insert(&mut self, entry: CatalogEntry) {
        self.files
            .entry(entry.type_tag.clone())
            .or_default()
            .push(entry);
    }

    /// Restreint le catalogue à une seule étiquette de type
    pub fn filtered(&self, tag: &str) -> Result<Catalog, CatalogError> {
        let entries = self.files.get(tag).ok_or_else(|| CatalogError::UnknownType {
            tag: tag.to_string(),
            available: self.type_tags().collect::<Vec<_>>().join(", "),
        })?;

        let mut files = BTreeMap::new();
        files.insert(tag.to_string(), entries.clone());
        Ok(Catalog {
            files,
            extra: self.extra.clone(),
        })
    }

    /// Étiquettes de type présentes
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Toutes les entrées, groupées par étiquette
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.files.values().flatten()
    }

    /// Nombre total d'entrées
    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Annotation issue du catalogue pour une adresse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub type_tag: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
struct IndexedSpan {
    start: u32,
    end: u32,
    annotation: CatalogMatch,
}

/// Index de recherche adresse → entrée du catalogue
///
/// Construit une fois par exécution. Lorsqu'une adresse est couverte par
/// plusieurs entrées, celle qui commence le plus près de l'adresse l'emporte.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    spans: Vec<IndexedSpan>,
    /// Maximum des fins d'entrées jusqu'à l'indice `i` inclus
    max_end: Vec<u32>,
}

impl CatalogIndex {
    /// Index vide (aucune annotation)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(catalog: &Catalog) -> Self {
        let mut spans: Vec<IndexedSpan> = catalog
            .entries()
            .map(|entry| IndexedSpan {
                start: entry.start,
                end: entry.end,
                annotation: CatalogMatch {
                    type_tag: entry.type_tag.clone(),
                    filename: entry.filename.clone(),
                },
            })
            .collect();
        spans.sort_by_key(|span| (span.start, span.end));

        let max_end = spans
            .iter()
            .scan(0u32, |max, span| {
                *max = (*max).max(span.end);
                Some(*max)
            })
            .collect();

        Self { spans, max_end }
    }

    /// Entrée couvrant `address`, s'il y en a une
    pub fn lookup(&self, address: u32) -> Option<&CatalogMatch> {
        let candidates = self.spans.partition_point(|span| span.start <= address);

        for i in (0..candidates).rev() {
            if self.max_end[i] < address {
                break;
            }
            if self.spans[i].end >= address {
                return Some(&self.spans[i].annotation);
            }
        }
        None
    }

    /// Plages inclusives de toutes les entrées
    pub fn spans(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.spans.iter().map(|span| (span.start, span.end))
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 2,
        "files": {
            "compressed_images": [
                {"filename": "title.png", "start_addr": "0x00001000", "end_addr": "0x000010FF",
                 "is_compressed": true, "format": "CI8"},
                {"filename": "logo.png", "start_addr": "00002000", "end_addr": "00002FFF",
                 "is_compressed": false, "image_width": 32, "image_height": 16, "format": "16-bit"}
            ],
            "text_blocks": [
                {"filename": "intro.txt", "start_addr": "0x3000", "end_addr": "0x30FF",
                 "note": "menu"}
            ]
        }
    }"#;

    #[test]
    fn test_load_sample() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.type_tags().collect::<Vec<_>>(), ["compressed_images", "text_blocks"]);

        let logo = &catalog.files["compressed_images"][1];
        assert_eq!(logo.type_tag, "compressed_images");
        assert_eq!((logo.start, logo.end), (0x2000, 0x2FFF));
        assert_eq!(logo.image_width, Some(32));
        assert!(logo.has_compression_flag());
        assert!(!logo.is_compressed());

        let text = &catalog.files["text_blocks"][0];
        assert_eq!(text.extra.get("note"), Some(&Value::from("menu")));
        assert_eq!(catalog.extra.get("version"), Some(&Value::from(2)));
    }

    #[test]
    fn test_read_len_depends_on_flag_presence() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let images = &catalog.files["compressed_images"];

        assert_eq!(images[0].read_len(), 0x100 - 8);
        // Présent mais faux : la remorque est quand même retirée
        assert_eq!(images[1].read_len(), 0x1000 - 8);
        assert_eq!(catalog.files["text_blocks"][0].read_len(), 0x100);
    }

    #[test]
    fn test_null_flag_counts_as_present() {
        let json = r#"{"files": {"misc": [
            {"filename": "a.bin", "start_addr": "0x10", "end_addr": "0x2F", "is_compressed": null}
        ]}}"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        let entry = &catalog.files["misc"][0];

        assert!(entry.has_compression_flag());
        assert!(!entry.is_compressed());
        assert_eq!(entry.read_len(), 0x20 - 8);
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_hex = r#"{"files": {"misc": [{"filename": "a", "start_addr": "0xZZ", "end_addr": "0x10"}]}}"#;
        assert!(matches!(Catalog::from_json_str(bad_hex), Err(CatalogError::Json(_))));

        let inverted = r#"{"files": {"misc": [{"filename": "a", "start_addr": "0x20", "end_addr": "0x10"}]}}"#;
        assert!(matches!(
            Catalog::from_json_str(inverted),
            Err(CatalogError::InvertedRange { .. })
        ));

        assert!(Catalog::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_filter_unknown_type() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();

        assert_eq!(catalog.filtered("text_blocks").unwrap().len(), 1);
        match catalog.filtered("sounds") {
            Err(CatalogError::UnknownType { available, .. }) => {
                assert_eq!(available, "compressed_images, text_blocks")
            }
            other => panic!("résultat inattendu: {other:?}"),
        }
    }

    #[test]
    fn test_index_lookup() {
        let mut catalog = Catalog::default();
        catalog.insert(CatalogEntry::new("big", "outer.bin", 0x100, 0x1FF));
        catalog.insert(CatalogEntry::new("small", "inner.bin", 0x140, 0x14F));
        catalog.insert(CatalogEntry::new("small", "late.bin", 0x300, 0x3FF));
        let index = CatalogIndex::new(&catalog);

        assert_eq!(index.lookup(0x0FF), None);
        assert_eq!(index.lookup(0x100).unwrap().filename, "outer.bin");
        assert_eq!(index.lookup(0x145).unwrap().filename, "inner.bin");
        assert_eq!(index.lookup(0x150).unwrap().filename, "outer.bin");
        assert_eq!(index.lookup(0x250), None);
        assert_eq!(index.lookup(0x3FF).unwrap().type_tag, "small");
    }

    #[test]
    fn test_save_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("file_table.json");
        let catalog = Catalog::from_json_str(SAMPLE)?;

        catalog.save(&path)?;
        let reloaded = Catalog::load(&path)?;

        assert_eq!(reloaded.files, catalog.files);
        let saved = fs::read_to_string(&path)?;
        assert!(saved.contains("\"start_addr\": \"0x00001000\""));
        Ok(())
    }
}
