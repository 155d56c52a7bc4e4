//! Notifications de progression émises par les composants
//!
//! Le moteur ne possède aucun flux de sortie : chaque composant signale ses
//! découvertes à un observateur fourni par l'application hôte (CLI, tests).

use super::region::{Confidence, RegionKind};
use crate::codec::DecodeWarning;
use log::{debug, info, warn};
use parking_lot::Mutex;

/// Étape du pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CompressedScan,
    GapAnalysis,
    FooterScan,
    Extraction,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::CompressedScan => "recherche des blocs compressés",
            Phase::GapAnalysis => "analyse des trous",
            Phase::FooterScan => "recherche des fichiers non compressés",
            Phase::Extraction => "extraction depuis le catalogue",
        }
    }
}

/// Raison du rejet d'un candidat pied de fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Champ de taille hors de la ROM
    SizeFieldOutOfBounds,
    /// Taille hors de `[4, 0x1000000]`
    SizeOutOfRange(u32),
    /// Début des données avant l'adresse 0
    Underflow,
    /// Fichier débordant du trou analysé
    OutsideGap,
    /// Fichier chevauchant un fichier déjà accepté dans ce trou
    OverlapsAccepted,
}

/// Événement de scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    PhaseStarted(Phase),
    PhaseFinished { phase: Phase, found: usize },
    KnownRegionSkipped { start: u32, end: u32 },
    BlockFound {
        start: u32,
        end: u32,
        confidence: Confidence,
        filename: String,
    },
    GapFound { start: u32, end: u32 },
    FooterRejected { footer_pos: u32, reason: RejectReason },
    FileFound {
        kind: RegionKind,
        start: u32,
        end: u32,
        filename: String,
    },
    DecodeWarning { filename: String, warning: DecodeWarning },
}

/// Observateur de progression
pub trait ScanObserver: Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// Ignore tous les événements
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_event(&self, _event: &ScanEvent) {}
}

/// Relaie les événements vers le crate `log`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver {
    /// Taille minimale d'un trou pour être journalisé au niveau info
    pub gap_log_threshold: u64,
}

impl LogObserver {
    pub fn new() -> Self {
        Self {
            gap_log_threshold: 1024,
        }
    }
}

impl ScanObserver for LogObserver {
    fn on_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::PhaseStarted(phase) => info!("Début: {}", phase.label()),
            ScanEvent::PhaseFinished { phase, found } => {
                info!("Terminé: {} ({} trouvés)", phase.label(), found)
            }
            ScanEvent::KnownRegionSkipped { start, end } => {
                debug!("Région connue ignorée: 0x{:08X} - 0x{:08X}", start, end)
            }
            ScanEvent::BlockFound {
                start,
                confidence,
                filename,
                ..
            } => info!(
                "Bloc compressé à 0x{:08X} -> {} ({})",
                start,
                filename,
                confidence.as_str()
            ),
            ScanEvent::GapFound { start, end } => {
                let size = *end as u64 - *start as u64 + 1;
                if size > self.gap_log_threshold {
                    info!("Grand trou: 0x{:08X} - 0x{:08X} ({} octets)", start, end, size);
                } else {
                    debug!("Trou: 0x{:08X} - 0x{:08X} ({} octets)", start, end, size);
                }
            }
            ScanEvent::FooterRejected { footer_pos, reason } => {
                debug!("Pied de fichier rejeté à 0x{:08X}: {:?}", footer_pos, reason)
            }
            ScanEvent::FileFound {
                kind,
                start,
                end,
                filename,
            } => info!(
                "Fichier {} 0x{:08X} - 0x{:08X} -> {}",
                kind.as_str(),
                start,
                end,
                filename
            ),
            ScanEvent::DecodeWarning { filename, warning } => warn!("{}: {}", filename, warning),
        }
    }
}

/// Conserve les événements pour inspection (tests, interfaces)
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ScanEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copie des événements reçus
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().clone()
    }

    /// Nombre d'événements satisfaisant `predicate`
    pub fn count(&self, predicate: impl Fn(&ScanEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl ScanObserver for CollectingObserver {
    fn on_event(&self, event: &ScanEvent) {
        self.events.lock().push(event.clone());
    }
}
