//! Conversion des couleurs 16 bits et tables de palettes

/// Couleur RGB 8 bits par canal
pub type Rgb = [u8; 3];

/// Étend une composante 5 bits vers 8 bits (`round(c * 255 / 31)`)
pub fn expand5(component: u8) -> u8 {
    let c = (component & 0x1F) as u16;
    ((c * 255 + 15) / 31) as u8
}

/// Décode un mot RGBA5551 (R bits 15..11, G 10..6, B 5..1, alpha ignoré)
pub fn rgba5551_to_rgb(word: u16) -> Rgb {
    [
        expand5((word >> 11) as u8),
        expand5((word >> 6) as u8),
        expand5((word >> 1) as u8),
    ]
}

/// Table de couleurs 16 bits découpée en sous-palettes de taille fixe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteTable {
    entries: Vec<u16>,
    entries_per_palette: usize,
}

impl PaletteTable {
    /// Lit une table depuis des mots big-endian
    pub fn from_be_bytes(data: &[u8], entries_per_palette: usize) -> Self {
        let entries = data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Self {
            entries,
            entries_per_palette,
        }
    }

    /// Nombre total de mots couleur
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nombre de sous-palettes complètes disponibles
    pub fn palette_count(&self) -> usize {
        if self.entries_per_palette == 0 {
            0
        } else {
            self.entries.len() / self.entries_per_palette
        }
    }

    /// Mots bruts de la palette `index`, si elle est complète
    pub fn palette(&self, index: usize) -> Option<&[u16]> {
        let start = index.checked_mul(self.entries_per_palette)?;
        let end = start.checked_add(self.entries_per_palette)?;
        self.entries.get(start..end)
    }

    /// Palette `index` convertie en RGB
    pub fn palette_rgb(&self, index: usize) -> Option<Vec<Rgb>> {
        self.palette(index)
            .map(|words| words.iter().map(|&w| rgba5551_to_rgb(w)).collect())
    }
}
