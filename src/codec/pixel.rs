//! Décodage des formats d'image propriétaires
//!
//! Deux familles sont gérées :
//! - images indexées CI4/CI8 précédées d'un en-tête de 20 octets et suivies
//!   d'une ou plusieurs palettes RGBA5551 ;
//! - images en couleurs directes 16 bits (RGBA5551), 24 bits (RGB) et
//!   32 bits (RGBA), sans en-tête, dimensions fournies par le catalogue.
//!
//! Les anomalies récupérables sont renvoyées sous forme d'avertissements à
//! côté du résultat, jamais sous forme d'erreur.

use super::color::{rgba5551_to_rgb, PaletteTable, Rgb};
use crate::error::{DecodeError, DecodeResult};
use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage, RgbaImage};
use std::fmt;
use std::path::Path;

/// Taille de l'en-tête des images indexées
pub const INDEXED_HEADER_LEN: usize = 20;

/// Nombre maximal de palettes plausible dans un en-tête
pub const MAX_PALETTE_COUNT: u32 = 100;

/// Nombre maximal de colonnes de la grille multi-palettes
pub const GRID_MAX_COLUMNS: usize = 4;

/// Organisation des canaux d'un buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Rgb,
    Rgba,
}

impl ColorType {
    /// Nombre d'octets par pixel
    pub fn channels(self) -> usize {
        match self {
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }
}

/// Image décodée, pixels ligne par ligne, 8 bits par canal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    color: ColorType,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Crée un buffer noir (et transparent en RGBA)
    pub fn new(width: u32, height: u32, color: ColorType) -> Self {
        let len = width as usize * height as usize * color.channels();
        Self {
            width,
            height,
            color,
            data: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> ColorType {
        self.color
    }

    /// Octets bruts du buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Canaux du pixel `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.color.channels();
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        Some(&self.data[offset..offset + channels])
    }

    /// Copie `other` dans ce buffer avec son coin supérieur gauche en `(x, y)`
    ///
    /// Les deux buffers doivent partager la même organisation de canaux ; la
    /// partie qui dépasse est ignorée.
    pub fn blit(&mut self, other: &PixelBuffer, x: u32, y: u32) {
        if other.color != self.color || x >= self.width || y >= self.height {
            return;
        }
        let channels = self.color.channels();
        let copy_width = other.width.min(self.width - x) as usize * channels;
        let rows = other.height.min(self.height - y) as usize;

        for row in 0..rows {
            let src = row * other.width as usize * channels;
            let dst = ((y as usize + row) * self.width as usize + x as usize) * channels;
            self.data[dst..dst + copy_width].copy_from_slice(&other.data[src..src + copy_width]);
        }
    }

    /// Convertit en image du crate `image`
    pub fn to_image(&self) -> Result<DynamicImage> {
        let data = self.data.clone();
        let image = match self.color {
            ColorType::Rgb => RgbImage::from_raw(self.width, self.height, data)
                .map(DynamicImage::ImageRgb8),
            ColorType::Rgba => RgbaImage::from_raw(self.width, self.height, data)
                .map(DynamicImage::ImageRgba8),
        };
        image.ok_or_else(|| anyhow!("buffer incohérent {}x{}", self.width, self.height))
    }

    /// Enregistre le buffer au format PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Avertissement de décodage (récupération avec perte)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Nombre de palettes aberrant, ramené à 1
    PaletteCountClamped { found: u32 },

    /// Taille décompressée différente de celle calculée depuis l'en-tête
    UnexpectedLength { expected: usize, actual: usize },

    /// Taille des pixels directs incorrecte, tronquée ou complétée
    SizeMismatch { expected: usize, actual: usize },

    /// Format direct inconnu, 24 bits utilisé par défaut
    UnknownFormat { tag: String },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::PaletteCountClamped { found } => {
                write!(f, "nombre de palettes aberrant ({}), 1 utilisé", found)
            }
            DecodeWarning::UnexpectedLength { expected, actual } => write!(
                f,
                "taille décompressée inattendue: attendu {}, trouvé {}",
                expected, actual
            ),
            DecodeWarning::SizeMismatch { expected, actual } => write!(
                f,
                "attendu {} octets, trouvé {} octets (tronqué/complété)",
                expected, actual
            ),
            DecodeWarning::UnknownFormat { tag } => {
                write!(f, "format inconnu '{}', 24 bits par défaut", tag)
            }
        }
    }
}

/// Résultat de décodage accompagné des avertissements émis
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub warnings: Vec<DecodeWarning>,
}

/// Largeur des indices d'une image indexée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedFormat {
    /// 4 bits par pixel, 16 couleurs
    Ci4,
    /// 8 bits par pixel, 256 couleurs
    Ci8,
}

impl IndexedFormat {
    /// Déduit le format du nombre d'entrées par palette
    pub fn from_entry_count(entries: u32) -> Option<Self> {
        match entries {
            16 => Some(IndexedFormat::Ci4),
            256 => Some(IndexedFormat::Ci8),
            _ => None,
        }
    }

    pub fn entries_per_palette(self) -> usize {
        match self {
            IndexedFormat::Ci4 => 16,
            IndexedFormat::Ci8 => 256,
        }
    }

    /// Octets d'indices pour `pixels` pixels
    pub fn index_bytes(self, pixels: usize) -> usize {
        match self {
            IndexedFormat::Ci4 => pixels.div_ceil(2),
            IndexedFormat::Ci8 => pixels,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexedFormat::Ci4 => "CI4",
            IndexedFormat::Ci8 => "CI8",
        }
    }
}

/// En-tête d'une image indexée (5 mots big-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedHeader {
    pub tag: u32,
    pub width: u32,
    pub height: u32,
    pub palette_entry_count: u32,
    pub palette_count: u32,
}

impl IndexedHeader {
    /// Lit l'en-tête au début de `data`
    pub fn parse(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < INDEXED_HEADER_LEN {
            return Err(DecodeError::Truncated {
                what: "en-tête",
                needed: INDEXED_HEADER_LEN,
                available: data.len(),
            });
        }
        let word = |i: usize| {
            u32::from_be_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]])
        };

        Ok(Self {
            tag: word(0),
            width: word(1),
            height: word(2),
            palette_entry_count: word(3),
            palette_count: word(4),
        })
    }
}

/// Dépaquette des indices 4 bits (quartet de poids fort en premier)
pub fn unpack_ci4(packed: &[u8], count: usize) -> Vec<u8> {
    packed
        .iter()
        .flat_map(|&byte| [byte >> 4, byte & 0x0F])
        .take(count)
        .collect()
}

/// Empaquette des indices 4 bits, le dernier quartet de poids faible à zéro
pub fn pack_ci4(indices: &[u8]) -> Vec<u8> {
    indices
        .chunks(2)
        .map(|pair| (pair[0] & 0x0F) << 4 | pair.get(1).map_or(0, |&lo| lo & 0x0F))
        .collect()
}

/// Dimensions `(colonnes, lignes)` de la grille pour `palette_count` palettes
pub fn grid_layout(palette_count: usize) -> (usize, usize) {
    let cols = palette_count.clamp(1, GRID_MAX_COLUMNS);
    (cols, palette_count.div_ceil(cols).max(1))
}

/// Applique une palette à un flux d'indices (indice hors palette = noir)
pub fn render_indexed(indices: &[u8], palette: &[Rgb], width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity(indices.len() * 3);
    for &index in indices {
        data.extend_from_slice(palette.get(index as usize).unwrap_or(&[0, 0, 0]));
    }
    let mut buffer = PixelBuffer::new(width, height, ColorType::Rgb);
    let len = data.len().min(buffer.data.len());
    buffer.data[..len].copy_from_slice(&data[..len]);
    buffer
}

/// Refuse une image sans pixel
fn check_dimensions(width: u32, height: u32) -> DecodeResult<()> {
    if width == 0 || height == 0 {
        return Err(DecodeError::FormatMismatch {
            field: if width == 0 { "width" } else { "height" },
            value: 0,
            expected: "dimension non nulle",
        });
    }
    Ok(())
}

/// Décode une image indexée CI4/CI8 décompressée
pub fn decode_indexed(data: &[u8]) -> DecodeResult<Decoded<PixelBuffer>> {
    let header = IndexedHeader::parse(data)?;
    check_dimensions(header.width, header.height)?;
    let mut warnings = Vec::new();

    let format = IndexedFormat::from_entry_count(header.palette_entry_count).ok_or(
        DecodeError::FormatMismatch {
            field: "palette_entry_count",
            value: header.palette_entry_count,
            expected: "16 (CI4) ou 256 (CI8)",
        },
    )?;

    let mut palette_count = header.palette_count;
    if !(1..=MAX_PALETTE_COUNT).contains(&palette_count) {
        warnings.push(DecodeWarning::PaletteCountClamped {
            found: palette_count,
        });
        palette_count = 1;
    }
    let palette_count = palette_count as usize;

    let pixel_count = (header.width as usize)
        .checked_mul(header.height as usize)
        .ok_or(DecodeError::FormatMismatch {
            field: "width*height",
            value: header.width,
            expected: "dimensions représentables",
        })?;
    let index_bytes = format.index_bytes(pixel_count);
    let palette_bytes = format.entries_per_palette() * 2 * palette_count;

    let expected_total = INDEXED_HEADER_LEN + index_bytes + palette_bytes;
    if expected_total != data.len() {
        warnings.push(DecodeWarning::UnexpectedLength {
            expected: expected_total,
            actual: data.len(),
        });
    }

    let available_indices = data.len() - INDEXED_HEADER_LEN;
    if index_bytes > available_indices {
        return Err(DecodeError::Truncated {
            what: "indices de pixels",
            needed: index_bytes,
            available: available_indices,
        });
    }
    if palette_bytes > data.len() {
        return Err(DecodeError::Truncated {
            what: "palettes",
            needed: palette_bytes,
            available: data.len(),
        });
    }

    let raw_indices = &data[INDEXED_HEADER_LEN..INDEXED_HEADER_LEN + index_bytes];
    let indices = match format {
        IndexedFormat::Ci8 => raw_indices.to_vec(),
        IndexedFormat::Ci4 => unpack_ci4(raw_indices, pixel_count),
    };

    // Les palettes sont prises à la fin du buffer, un éventuel bourrage reste
    // entre les indices et les palettes.
    let palettes = PaletteTable::from_be_bytes(
        &data[data.len() - palette_bytes..],
        format.entries_per_palette(),
    );

    let (width, height) = (header.width, header.height);
    let buffer = if palette_count == 1 {
        let palette = palettes.palette_rgb(0).unwrap_or_default();
        render_indexed(&indices, &palette, width, height)
    } else {
        compose_palettes(&indices, &palettes, palette_count, width, height)?
    };

    Ok(Decoded {
        value: buffer,
        warnings,
    })
}

/// Rend chaque palette avec le même flux d'indices et assemble une grille
fn compose_palettes(
    indices: &[u8],
    palettes: &PaletteTable,
    palette_count: usize,
    width: u32,
    height: u32,
) -> DecodeResult<PixelBuffer> {
    let (cols, rows) = grid_layout(palette_count);
    let grid_width = width
        .checked_mul(cols as u32)
        .ok_or(DecodeError::FormatMismatch {
            field: "width",
            value: width,
            expected: "grille de palettes représentable",
        })?;
    let grid_height = height
        .checked_mul(rows as u32)
        .ok_or(DecodeError::FormatMismatch {
            field: "height",
            value: height,
            expected: "grille de palettes représentable",
        })?;
    let mut grid = PixelBuffer::new(grid_width, grid_height, ColorType::Rgb);

    // Le contrôle de troncature garantit la présence de chaque palette
    for index in 0..palette_count {
        let Some(palette) = palettes.palette_rgb(index) else {
            break;
        };
        let cell = render_indexed(indices, &palette, width, height);
        let (row, col) = (index / cols, index % cols);
        grid.blit(&cell, col as u32 * width, row as u32 * height);
    }

    Ok(grid)
}

/// Format d'une image en couleurs directes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectFormat {
    /// "16-bit" : RGBA5551 big-endian
    Rgba5551,
    /// "24-bit" : RGB brut
    Rgb888,
    /// "32-bit" : RGBA brut
    Rgba8888,
}

impl DirectFormat {
    /// Interprète l'étiquette de format du catalogue
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "16-bit" => Some(DirectFormat::Rgba5551),
            "24-bit" => Some(DirectFormat::Rgb888),
            "32-bit" => Some(DirectFormat::Rgba8888),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            DirectFormat::Rgba5551 => 2,
            DirectFormat::Rgb888 => 3,
            DirectFormat::Rgba8888 => 4,
        }
    }
}

/// Décode une image en couleurs directes (format passé sous forme d'étiquette)
pub fn decode_direct_tagged(
    data: &[u8],
    width: u32,
    height: u32,
    tag: &str,
) -> DecodeResult<Decoded<PixelBuffer>> {
    match DirectFormat::from_tag(tag) {
        Some(format) => decode_direct(data, width, height, format),
        None => {
            let mut decoded = decode_direct(data, width, height, DirectFormat::Rgb888)?;
            decoded.warnings.insert(
                0,
                DecodeWarning::UnknownFormat {
                    tag: tag.to_string(),
                },
            );
            Ok(decoded)
        }
    }
}

/// Décode une image en couleurs directes
///
/// Une taille incorrecte n'est jamais fatale : les données sont tronquées ou
/// complétées par des zéros.
pub fn decode_direct(
    data: &[u8],
    width: u32,
    height: u32,
    format: DirectFormat,
) -> DecodeResult<Decoded<PixelBuffer>> {
    check_dimensions(width, height)?;
    let mut warnings = Vec::new();
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        .ok_or(DecodeError::FormatMismatch {
            field: "width*height",
            value: width,
            expected: "dimensions représentables",
        })?;

    let mut raw = data.to_vec();
    if raw.len() != expected {
        warnings.push(DecodeWarning::SizeMismatch {
            expected,
            actual: raw.len(),
        });
        raw.resize(expected, 0);
    }

    let (color, data) = match format {
        DirectFormat::Rgb888 => (ColorType::Rgb, raw),
        DirectFormat::Rgba8888 => (ColorType::Rgba, raw),
        DirectFormat::Rgba5551 => (
            ColorType::Rgb,
            raw.chunks_exact(2)
                .flat_map(|pair| rgba5551_to_rgb(u16::from_be_bytes([pair[0], pair[1]])))
                .collect(),
        ),
    };
    let buffer = PixelBuffer {
        width,
        height,
        color,
        data,
    };

    Ok(Decoded {
        value: buffer,
        warnings,
    })
}
