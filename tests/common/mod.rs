//! Construction de ROM synthétiques pour les tests d'intégration

#![allow(dead_code)]

/// Terminateur + champ de taille d'un bloc compressé
pub fn trailer(size: u32) -> Vec<u8> {
    let mut bytes = vec![0x00, 0x10, 0x00, 0x00];
    bytes.extend_from_slice(&size.to_be_bytes());
    bytes
}

fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + byte as u32) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

/// Flux zlib d'en-tête `68 DE` composé de blocs stockés
pub fn container(payload: &[u8]) -> Vec<u8> {
    let mut stream = vec![0x68, 0xDE];
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![&[]]
    } else {
        payload.chunks(0xFFFF).collect()
    };

    for (i, chunk) in chunks.iter().enumerate() {
        stream.push(u8::from(i + 1 == chunks.len()));
        let len = chunk.len() as u16;
        stream.extend_from_slice(&len.to_le_bytes());
        stream.extend_from_slice(&(!len).to_le_bytes());
        stream.extend_from_slice(chunk);
    }

    stream.extend_from_slice(&adler32(payload).to_be_bytes());
    stream
}

/// Couleur RGBA5551 de l'indice `i` de la palette de test
pub fn palette_word(i: u16) -> u16 {
    (i << 11) | ((15 - i) << 6) | (i << 1)
}

/// Arrondi de référence d'une composante 5 bits
pub fn expand(component: u16) -> u8 {
    (component as f64 * 255.0 / 31.0).round() as u8
}

/// Image CI8 4×4 à une palette : le pixel `i` utilise l'indice `i`
pub fn ci8_image() -> Vec<u8> {
    let mut data = Vec::new();
    for field in [2u32, 4, 4, 256, 1] {
        data.extend_from_slice(&field.to_be_bytes());
    }
    data.extend(0u8..16);
    for i in 0..256u16 {
        let word = if i < 16 { palette_word(i) } else { 0 };
        data.extend_from_slice(&word.to_be_bytes());
    }
    data
}

/// Pixels RGB attendus pour `ci8_image`, calculés à la main
pub fn ci8_expected_pixels() -> Vec<u8> {
    (0..16u16)
        .flat_map(|i| [expand(i), expand(15 - i), expand(i)])
        .collect()
}

/// Copie `bytes` à l'adresse `at`
pub fn place(rom: &mut [u8], at: usize, bytes: &[u8]) {
    rom[at..at + bytes.len()].copy_from_slice(bytes);
}
