//! Décompression du conteneur propriétaire
//!
//! Le conteneur est un flux zlib standard dont l'en-tête vaut toujours
//! `68 DE` (fenêtre de 16 Ko, niveau maximal). Il est suivi dans la ROM d'un
//! terminateur `00 10 00 00` et d'un champ de taille de 4 octets, que le
//! décodeur ignore puisqu'ils se trouvent après la fin du flux.

use crate::error::CodecError;
use flate2::{Decompress, FlushDecompress, Status};

/// Signature de début d'un bloc compressé
pub const CONTAINER_SIGNATURE: [u8; 2] = [0x68, 0xDE];

/// Limite de la taille décompressée (256 Mo)
pub const MAX_INFLATED_SIZE: usize = 256 * 1024 * 1024;

const CHUNK_SIZE: usize = 8192;

/// Vérifie si `bytes` commence par la signature du conteneur
pub fn is_container_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&CONTAINER_SIGNATURE)
}

/// Décompresse un flux complet
///
/// Échoue de façon atomique : aucune sortie partielle n'est renvoyée.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    decompress_with_limit(data, MAX_INFLATED_SIZE)
}

/// Décompresse un flux en refusant toute sortie supérieure à `limit`
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    let mut inflater = Decompress::new(true);
    let mut decompressed = Vec::with_capacity(data.len().saturating_mul(2).min(limit));

    loop {
        if decompressed.len() == decompressed.capacity() {
            decompressed.reserve(CHUNK_SIZE);
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&data[consumed..], &mut decompressed, FlushDecompress::None)
            .map_err(|e| CodecError::InvalidStream(e.to_string()))?;

        if decompressed.len() > limit {
            return Err(CodecError::OutputTooLarge { limit });
        }

        match status {
            Status::StreamEnd => break,
            // Plus d'entrée et plus de progression : flux tronqué
            Status::Ok | Status::BufError
                if inflater.total_in() as usize == consumed
                    && inflater.total_out() == produced
                    && decompressed.len() < decompressed.capacity() =>
            {
                return Err(CodecError::InvalidStream(format!(
                    "flux tronqué après {} octets",
                    consumed
                )));
            }
            Status::Ok | Status::BufError => {}
        }
    }

    Ok(decompressed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Adler-32 du flux zlib
    fn adler32(data: &[u8]) -> u32 {
        let (mut a, mut b) = (1u32, 0u32);
        for &byte in data {
            a = (a + byte as u32) % 65521;
            b = (b + a) % 65521;
        }
        (b << 16) | a
    }

    /// Construit un conteneur `68 DE` à partir de blocs deflate non compressés
    ///
    /// Le contenu est entièrement prévisible, ce qui permet de garantir que le
    /// terminateur n'apparaît pas dans le flux.
    pub(crate) fn container(payload: &[u8]) -> Vec<u8> {
        let mut out = CONTAINER_SIGNATURE.to_vec();
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[]]
        } else {
            payload.chunks(0xFFFF).collect()
        };
        for (i, chunk) in chunks.iter().enumerate() {
            let last = i + 1 == chunks.len();
            out.push(if last { 0x01 } else { 0x00 });
            let len = chunk.len() as u16;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&(!len).to_le_bytes());
            out.extend_from_slice(chunk);
        }
        out.extend_from_slice(&adler32(payload).to_be_bytes());
        out
    }

    #[test]
    fn test_roundtrip_stored_container() {
        let payload = b"Hello, ROM world!".repeat(10);
        let stream = container(&payload);

        assert!(is_container_signature(&stream));
        assert_eq!(decompress(&stream).unwrap(), payload);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut stream = container(b"asset");
        stream.extend_from_slice(&[0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05]);

        assert_eq!(decompress(&stream).unwrap(), b"asset");
    }

    #[test]
    fn test_corrupt_stream_fails() {
        let mut stream = container(b"some bytes to corrupt");
        let last = stream.len() - 1;
        stream[last] ^= 0xFF;

        assert!(matches!(decompress(&stream), Err(CodecError::InvalidStream(_))));
        assert!(decompress(&[0x68, 0xDE, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_truncated_stream_fails() {
        let stream = container(&[7u8; 200]);
        assert!(decompress(&stream[..stream.len() - 60]).is_err());
    }

    #[test]
    fn test_output_limit() {
        let stream = container(&[0u8; 1024]);
        assert_eq!(
            decompress_with_limit(&stream, 100),
            Err(CodecError::OutputTooLarge { limit: 100 })
        );
    }
}
