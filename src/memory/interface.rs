//! Interface de lecture commune

use anyhow::Result;

/// Trait définissant l'accès en lecture seule à un espace d'adressage
///
/// Les valeurs multi-octets sont lues en big-endian, l'ordre natif des
/// formats rencontrés dans l'image.
pub trait MemoryInterface {
    /// Taille de l'espace d'adressage en octets
    fn size(&self) -> usize;

    /// Vue sur une tranche `[address, address + len)`
    fn slice(&self, address: u32, len: usize) -> Result<&[u8]>;

    /// Lit un octet à l'adresse spécifiée
    fn read_u8(&self, address: u32) -> Result<u8> {
        Ok(self.slice(address, 1)?[0])
    }

    /// Lit un mot de 16 bits à l'adresse spécifiée
    fn read_u16(&self, address: u32) -> Result<u16> {
        let bytes = self.slice(address, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Lit un mot de 32 bits à l'adresse spécifiée
    fn read_u32(&self, address: u32) -> Result<u32> {
        let bytes = self.slice(address, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Vue sur une plage inclusive `[start, end]`
    fn range(&self, start: u32, end: u32) -> Result<&[u8]> {
        let len = (end as usize + 1).saturating_sub(start as usize);
        self.slice(start, len)
    }
}
