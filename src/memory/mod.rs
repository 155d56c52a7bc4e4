//! Espace d'adressage de la ROM analysée
//!
//! L'image est chargée une seule fois puis partagée en lecture seule par
//! tous les composants (scanners, extracteur).

pub mod interface;
pub mod rom;

pub use interface::*;
pub use rom::*;
