//! Écriture des résultats : tableaux CSV, images PNG et fichiers extraits

use crate::extract::{AssetPayload, ExtractedAsset, TextRow};
use crate::memory::{MemoryInterface, RomImage};
use crate::pipeline::payload;
use crate::scan::{AddressMap, ScanResult};
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const RESULTS_HEADER: [&str; 8] = [
    "Start Address",
    "End Address",
    "Compressed Size",
    "Decompressed Size",
    "File Type",
    "Known",
    "Filename",
    "Confidence",
];

const MAP_HEADER: [&str; 9] = [
    "Start Address",
    "End Address",
    "Size (bytes)",
    "Type",
    "Subtype",
    "Known",
    "Filename",
    "Compressed Size",
    "Decompressed Size",
];

const TEXT_HEADER: [&str; 4] = ["start_addr", "end_addr", "filename", "content"];

/// Bilan d'une écriture d'assets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub images: usize,
    pub texts: usize,
    pub raw: usize,
}

impl ExportStats {
    pub fn total(&self) -> usize {
        self.images + self.texts + self.raw
    }
}

/// Échappe un champ CSV (RFC 4180)
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Écrivain CSV minimal
struct CsvWriter<W: Write> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    fn new(out: W) -> Self {
        Self { out }
    }

    fn row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let line = fields
            .iter()
            .map(|f| csv_field(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\r\n")?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

fn create_csv(path: &Path) -> Result<CsvWriter<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("création impossible: {}", path.display()))?;
    Ok(CsvWriter::new(BufWriter::new(file)))
}

fn hex(address: u32) -> String {
    format!("0x{:08X}", address)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Tableau des résultats de scan (`rom_scan_results.csv`)
pub fn write_results_csv(path: &Path, results: &[&ScanResult]) -> Result<()> {
    let mut csv = create_csv(path)?;
    csv.row(&RESULTS_HEADER)?;

    for result in results {
        csv.row(&[
            hex(result.start()),
            hex(result.end()),
            result.size.to_string(),
            result.decoded_size.unwrap_or(result.size).to_string(),
            result.kind().as_str().to_string(),
            yes_no(result.is_known()).to_string(),
            result.filename.clone(),
            result.confidence.as_str().to_string(),
        ])?;
    }

    csv.finish()?;
    info!("Résultats exportés: {}", path.display());
    Ok(())
}

/// Carte complète de la ROM (`rom_map.csv`)
pub fn write_map_csv(path: &Path, map: &AddressMap) -> Result<()> {
    let mut csv = create_csv(path)?;
    csv.row(&MAP_HEADER)?;

    for entry in map.entries() {
        csv.row(&[
            hex(entry.region.start),
            hex(entry.region.end),
            entry.region.size().to_string(),
            entry.type_label().to_string(),
            entry.subtype.clone(),
            yes_no(entry.known).to_string(),
            entry.filename.clone(),
            optional(entry.compressed_size),
            optional(entry.decompressed_size),
        ])?;
    }

    csv.finish()?;
    info!("Carte de la ROM générée: {}", path.display());
    Ok(())
}

/// Résumé des blocs de texte (`text_blocks_summary.csv`)
pub fn write_text_summary(path: &Path, rows: &[TextRow]) -> Result<()> {
    let mut csv = create_csv(path)?;
    csv.row(&TEXT_HEADER)?;

    for row in rows {
        csv.row(&[hex(row.start), hex(row.end), row.filename.clone(), row.content.clone()])?;
    }

    csv.finish()
}

/// Nom de fichier sûr : dernier composant seulement, nom généré si vide
fn safe_file_name(filename: &str, start: u32) -> PathBuf {
    Path::new(filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("0x{:08X}.bin", start)))
}

/// Écrit le contenu de chaque résultat de scan dans `dir`
pub fn write_scan_payloads(dir: &Path, rom: &RomImage, results: &[&ScanResult]) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("création impossible: {}", dir.display()))?;

    for result in results {
        let bytes = match payload(rom, result) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}: {}, octets bruts écrits", result.filename, e);
                rom.range(result.start(), result.end())?.to_vec()
            }
        };
        let path = dir.join(safe_file_name(&result.filename, result.start()));
        fs::write(&path, bytes).with_context(|| format!("écriture impossible: {}", path.display()))?;
    }

    Ok(results.len())
}

/// Écrit les assets extraits sous `<dir>/<type>/<filename>`
pub fn write_assets(dir: &Path, assets: &[ExtractedAsset]) -> Result<ExportStats> {
    let mut stats = ExportStats::default();

    for asset in assets {
        let type_dir = dir.join(&asset.entry.type_tag);
        fs::create_dir_all(&type_dir)
            .with_context(|| format!("création impossible: {}", type_dir.display()))?;
        let path = type_dir.join(safe_file_name(&asset.entry.filename, asset.entry.start));

        match &asset.payload {
            AssetPayload::Image(buffer) => match buffer.save_png(&path) {
                Ok(()) => stats.images += 1,
                Err(e) => {
                    warn!("{}: écriture PNG impossible ({}), octets bruts écrits", path.display(), e);
                    fs::write(&path, &asset.source)
                        .with_context(|| format!("écriture impossible: {}", path.display()))?;
                    stats.raw += 1;
                }
            },
            AssetPayload::Text(text) => {
                fs::write(&path, text)?;
                stats.texts += 1;
            }
            AssetPayload::Raw(bytes) => {
                fs::write(&path, bytes)?;
                stats.raw += 1;
            }
        }
    }

    Ok(stats)
}

/// Sépare la ROM en deux fichiers `<nom>_code.bin` et `<nom>_assets.bin`
///
/// Le code occupe `[0, boundary)`, les assets `[boundary, fin)`.
pub fn split_rom(rom: &RomImage, boundary: u32, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let bytes = rom.bytes();
    let boundary = boundary as usize;
    if boundary > bytes.len() {
        return Err(anyhow!(
            "frontière 0x{:08X} au-delà de la ROM ({} octets)",
            boundary,
            bytes.len()
        ));
    }

    let stem = Path::new(rom.name())
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("rom");
    fs::create_dir_all(dir).with_context(|| format!("création impossible: {}", dir.display()))?;

    let code = dir.join(format!("{}_code.bin", stem));
    let assets = dir.join(format!("{}_assets.bin", stem));
    fs::write(&code, &bytes[..boundary])?;
    fs::write(&assets, &bytes[boundary..])?;

    info!(
        "Code: {} octets -> {}, assets: {} octets -> {}",
        boundary,
        code.display(),
        bytes.len() - boundary,
        assets.display()
    );
    Ok((code, assets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("dit \"bonjour\""), "\"dit \"\"bonjour\"\"\"");
        assert_eq!(csv_field("deux\nlignes"), "\"deux\nlignes\"");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("../../etc/passwd", 0), PathBuf::from("passwd"));
        assert_eq!(safe_file_name("", 0x10), PathBuf::from("0x00000010.bin"));
        assert_eq!(safe_file_name("title.png", 0), PathBuf::from("title.png"));
    }

    #[test]
    fn test_text_summary_rows() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("text_blocks_summary.csv");
        let rows = vec![TextRow {
            start: 0x3000,
            end: 0x30FF,
            filename: "intro.txt".to_string(),
            content: "Bonjour, monde".to_string(),
        }];

        write_text_summary(&path, &rows)?;

        let written = fs::read_to_string(&path)?;
        assert_eq!(
            written,
            "start_addr,end_addr,filename,content\r\n0x00003000,0x000030FF,intro.txt,\"Bonjour, monde\"\r\n"
        );
        Ok(())
    }

    #[test]
    fn test_unwritable_image_keeps_source_bytes() -> Result<()> {
        use crate::catalog::CatalogEntry;
        use crate::codec::{ColorType, PixelBuffer};

        let dir = tempfile::TempDir::new()?;
        let assets = vec![
            ExtractedAsset {
                entry: CatalogEntry::new("compressed_images", "flat.png", 0x00, 0x0F),
                payload: AssetPayload::Image(PixelBuffer::new(4, 0, ColorType::Rgb)),
                warnings: Vec::new(),
                source: vec![0xAB; 0x10],
                fallback: None,
            },
            ExtractedAsset {
                entry: CatalogEntry::new("misc", "next.bin", 0x10, 0x13),
                payload: AssetPayload::Raw(vec![1, 2, 3, 4]),
                warnings: Vec::new(),
                source: vec![1, 2, 3, 4],
                fallback: None,
            },
        ];

        let stats = write_assets(dir.path(), &assets)?;

        assert_eq!(stats, ExportStats { images: 0, texts: 0, raw: 2 });
        assert_eq!(
            fs::read(dir.path().join("compressed_images").join("flat.png"))?,
            vec![0xAB; 0x10]
        );
        assert_eq!(fs::read(dir.path().join("misc").join("next.bin"))?, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_split_rom() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let rom = RomImage::with_name((0u8..16).collect(), "game.bin".to_string());

        let (code, assets) = split_rom(&rom, 10, dir.path())?;

        assert_eq!(code.file_name().unwrap(), "game_code.bin");
        assert_eq!(fs::read(&code)?, (0u8..10).collect::<Vec<_>>());
        assert_eq!(fs::read(&assets)?, (10u8..16).collect::<Vec<_>>());
        assert!(split_rom(&rom, 17, dir.path()).is_err());
        Ok(())
    }
}
