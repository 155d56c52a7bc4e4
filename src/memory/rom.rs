//! Image ROM en lecture seule (espace d'adressage du scanner)

use super::interface::MemoryInterface;
use anyhow::{anyhow, Context, Result};
use crc32fast::Hasher;
use memmap2::Mmap;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

/// Stockage des octets de l'image
#[derive(Debug)]
enum Backing {
    /// Données copiées en mémoire
    Owned(Vec<u8>),

    /// Fichier projeté en mémoire
    Mapped(Mmap),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Owned(data) => data,
            Backing::Mapped(map) => map,
        }
    }
}

/// Image ROM complète, chargée une seule fois et jamais modifiée
#[derive(Debug)]
pub struct RomImage {
    /// Données de la ROM
    data: Backing,

    /// Nom/identifiant de la ROM
    name: String,
}

impl RomImage {
    /// Crée une image à partir de données en mémoire
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Backing::Owned(data),
            name: String::new(),
        }
    }

    /// Crée une image avec un nom spécifique
    pub fn with_name(data: Vec<u8>, name: String) -> Self {
        let mut rom = Self::new(data);
        rom.name = name;
        rom
    }

    /// Charge une ROM depuis un fichier
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("ROM illisible: {}", path.display()))?;
        Ok(Self::with_name(data, file_name(path)))
    }

    /// Projette une ROM en mémoire sans la copier
    pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("ROM illisible: {}", path.display()))?;
        // SAFETY: la ROM est traitée en lecture seule et n'est pas modifiée
        // pendant la durée d'un scan.
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("projection mémoire impossible: {}", path.display()))?;

        Ok(Self {
            data: Backing::Mapped(map),
            name: file_name(path),
        })
    }

    /// Obtient le nom de la ROM
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accès direct aux octets
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Vérifie qu'une plage est dans les limites
    fn check_bounds(&self, address: u32, size: usize) -> Result<()> {
        let addr = address as usize;
        match addr.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(anyhow!(
                "Accès ROM hors limites: {:#010x} + {} > {:#010x}",
                address,
                size,
                self.data.len()
            )),
        }
    }

    /// Recherche un pattern de bytes dans `[from, to)`
    pub fn find_pattern(&self, pattern: &[u8], from: usize, to: usize) -> Option<usize> {
        let to = to.min(self.data.len());
        if pattern.is_empty() || from >= to || to - from < pattern.len() {
            return None;
        }

        self.data[from..to]
            .windows(pattern.len())
            .position(|window| window == pattern)
            .map(|offset| from + offset)
    }

    /// Calcule l'empreinte de l'image
    pub fn fingerprint(&self) -> RomFingerprint {
        RomFingerprint::compute(&self.name, &self.data)
    }
}

impl MemoryInterface for RomImage {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn slice(&self, address: u32, len: usize) -> Result<&[u8]> {
        self.check_bounds(address, len)?;
        let addr = address as usize;
        Ok(&self.data[addr..addr + len])
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Empreinte d'une image ROM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomFingerprint {
    /// Nom de la ROM
    pub name: String,

    /// Taille en octets
    pub size: usize,

    /// Checksum CRC32
    pub crc32: u32,

    /// Hash MD5
    pub md5: String,

    /// Hash SHA256
    pub sha256: String,
}

impl RomFingerprint {
    /// Calcule les checksums d'un buffer
    pub fn compute(name: &str, data: &[u8]) -> Self {
        let mut crc = Hasher::new();
        crc.update(data);

        let mut sha = Sha256::new();
        sha.update(data);

        Self {
            name: name.to_string(),
            size: data.len(),
            crc32: crc.finalize(),
            md5: format!("{:x}", md5::compute(data)),
            sha256: format!("{:x}", sha.finalize()),
        }
    }
}
