//! Discovery progress events
//!
//! Progress is observational: it is pushed over an unbounded channel and a
//! closed or missing receiver never changes the analysis result.

use serde::Serialize;
use tokio::sync::mpsc;

/// Discovery phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// XOR / sum-8
    Simple,
    /// Known algorithm registry
    KnownAlgorithms,
    /// CRC-8 brute force
    Crc8BruteForce,
    /// CRC-16 brute force
    Crc16BruteForce,
    /// All frame IDs done
    Complete,
}

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryProgress {
    /// Current phase
    pub phase: DiscoveryPhase,
    /// Index of the frame ID being searched
    pub frame_id_index: usize,
    /// Number of frame IDs being searched
    pub total_frame_ids: usize,
    /// Frame ID being searched
    pub current_frame_id: Option<u32>,
    /// Polynomials tested so far in a brute-force phase
    pub polynomials_tested: Option<u32>,
    /// Polynomials in the brute-force phase
    pub polynomials_total: Option<u32>,
}

/// Sending half of a progress channel
pub type ProgressSender = mpsc::UnboundedSender<DiscoveryProgress>;

/// Receiving half of a progress channel
pub type ProgressReceiver = mpsc::UnboundedReceiver<DiscoveryProgress>;

/// Create a progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Emits events for one frame ID
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter<'a> {
    sender: Option<&'a ProgressSender>,
    frame_id_index: usize,
    total_frame_ids: usize,
    frame_id: Option<u32>,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sender: Option<&'a ProgressSender>, total_frame_ids: usize) -> Self {
        Self {
            sender,
            frame_id_index: 0,
            total_frame_ids,
            frame_id: None,
        }
    }

    pub(crate) fn for_frame(&self, index: usize, frame_id: u32) -> Self {
        Self {
            sender: self.sender,
            frame_id_index: index,
            total_frame_ids: self.total_frame_ids,
            frame_id: Some(frame_id),
        }
    }

    pub(crate) fn phase(&self, phase: DiscoveryPhase) {
        self.emit(phase, None, None);
    }

    pub(crate) fn polynomials(&self, phase: DiscoveryPhase, tested: u32, total: u32) {
        tracing::trace!(?phase, tested, total, frame_id = ?self.frame_id, "brute force progress");
        self.emit(phase, Some(tested), Some(total));
    }

    fn emit(&self, phase: DiscoveryPhase, tested: Option<u32>, total: Option<u32>) {
        let Some(sender) = self.sender else {
            return;
        };
        // A dropped receiver just means nobody is watching
        let _ = sender.send(DiscoveryProgress {
            phase,
            frame_id_index: self.frame_id_index,
            total_frame_ids: self.total_frame_ids,
            current_frame_id: self.frame_id,
            polynomials_tested: tested,
            polynomials_total: total,
        });
    }
}
