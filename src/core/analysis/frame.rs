//! Captured frame model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One captured frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame / arbitration ID
    pub id: u32,
    /// Bus or channel index
    pub bus: u8,
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
    /// Payload bytes
    pub bytes: Vec<u8>,
}

impl Frame {
    /// Create a frame on bus 0
    pub fn new(id: u32, timestamp_us: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            bus: 0,
            timestamp_us,
            bytes: bytes.into(),
        }
    }

    /// Set the bus index
    pub fn on_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }
}

/// Supplier of captured frames. Analyses only ever read from it.
pub trait FrameSource {
    /// Frames in capture order
    fn frames(&self) -> &[Frame];
}

impl FrameSource for Vec<Frame> {
    fn frames(&self) -> &[Frame] {
        self
    }
}

impl FrameSource for [Frame] {
    fn frames(&self) -> &[Frame] {
        self
    }
}

/// Payload with its capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedPayload {
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
    /// Payload bytes
    pub bytes: Vec<u8>,
}

/// Group frames by ID, preserving capture order within each group
pub fn group_by_id(frames: &[Frame]) -> BTreeMap<u32, Vec<&Frame>> {
    let mut groups: BTreeMap<u32, Vec<&Frame>> = BTreeMap::new();
    for frame in frames {
        groups.entry(frame.id).or_default().push(frame);
    }
    groups
}

/// Per-ID payloads sorted by timestamp (stable for equal timestamps)
pub fn timed_payloads_by_id(frames: &[Frame]) -> BTreeMap<u32, Vec<TimedPayload>> {
    let mut groups: BTreeMap<u32, Vec<TimedPayload>> = BTreeMap::new();
    for frame in frames {
        groups.entry(frame.id).or_default().push(TimedPayload {
            timestamp_us: frame.timestamp_us,
            bytes: frame.bytes.clone(),
        });
    }
    for payloads in groups.values_mut() {
        payloads.sort_by_key(|p| p.timestamp_us);
    }
    groups
}

/// Payloads of one frame ID, in capture order
pub fn payloads_for_id(frames: &[Frame], id: u32) -> Vec<&[u8]> {
    frames
        .iter()
        .filter(|f| f.id == id)
        .map(|f| f.bytes.as_slice())
        .collect()
}
