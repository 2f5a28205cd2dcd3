//! Mirror frame grouping
//!
//! Two frame IDs mirror each other when one repeats the other's payload within
//! a small time window (gateways, redundant ECUs, echo buses). Confirmed pairs
//! are merged transitively into groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::frame::{timed_payloads_by_id, FrameSource, TimedPayload};
use super::percentage;

/// Mirror detection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
    /// Max timestamp distance between mirrored payloads (µs)
    pub tolerance_us: u64,
    /// Fewest samples per ID, and fewest compared samples per pair
    pub min_samples: usize,
    /// Match percentage that confirms a pair
    pub min_match_rate: f64,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            tolerance_us: 50_000,
            min_samples: 3,
            min_match_rate: 80.0,
        }
    }
}

/// Frame IDs that carry the same payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorGroup {
    /// Member IDs, ascending
    pub frame_ids: Vec<u32>,
    /// Matches over all evaluated member pairs
    pub match_count: usize,
    /// Comparisons over all evaluated member pairs
    pub total_count: usize,
    /// Match percentage
    pub match_percentage: f64,
    /// A payload of the first member
    pub sample_payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PairScore {
    matches: usize,
    total: usize,
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Mirror detector
#[derive(Debug, Clone, Default)]
pub struct MirrorFrameDetector {
    options: MirrorOptions,
}

impl MirrorFrameDetector {
    /// Create with custom options
    pub fn new(options: MirrorOptions) -> Self {
        Self { options }
    }

    /// Group frames by ID and detect mirrors
    pub fn detect_frames<S: FrameSource + ?Sized>(&self, source: &S) -> Vec<MirrorGroup> {
        self.detect(&timed_payloads_by_id(source.frames()))
    }

    /// Detect mirror groups; payload lists must be sorted by timestamp
    pub fn detect(&self, payloads: &BTreeMap<u32, Vec<TimedPayload>>) -> Vec<MirrorGroup> {
        let ids: Vec<u32> = payloads
            .iter()
            .filter(|(_, samples)| samples.len() >= self.options.min_samples)
            .map(|(&id, _)| id)
            .collect();

        let mut scores: BTreeMap<(usize, usize), PairScore> = BTreeMap::new();
        let mut sets = UnionFind::new(ids.len());

        for a in 0..ids.len() {
            for b in a + 1..ids.len() {
                let score = self.compare(&payloads[&ids[a]], &payloads[&ids[b]]);
                let confirmed = score.total >= self.options.min_samples
                    && percentage(score.matches, score.total) >= self.options.min_match_rate;
                if confirmed {
                    tracing::debug!(
                        a = format_args!("0x{:X}", ids[a]),
                        b = format_args!("0x{:X}", ids[b]),
                        matches = score.matches,
                        total = score.total,
                        "mirror pair"
                    );
                    sets.union(a, b);
                }
                scores.insert((a, b), score);
            }
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for index in 0..ids.len() {
            let root = sets.find(index);
            members.entry(root).or_default().push(index);
        }

        let mut groups: Vec<MirrorGroup> = members
            .into_values()
            .filter(|m| m.len() >= 2)
            .map(|m| {
                let mut total = PairScore::default();
                for (i, &a) in m.iter().enumerate() {
                    for &b in &m[i + 1..] {
                        if let Some(score) = scores.get(&(a, b)) {
                            total.matches += score.matches;
                            total.total += score.total;
                        }
                    }
                }

                let frame_ids: Vec<u32> = m.iter().map(|&i| ids[i]).collect();
                let sample_payload = payloads[&frame_ids[0]]
                    .first()
                    .map(|p| p.bytes.clone())
                    .unwrap_or_default();

                MirrorGroup {
                    frame_ids,
                    match_count: total.matches,
                    total_count: total.total,
                    match_percentage: percentage(total.matches, total.total),
                    sample_payload,
                }
            })
            .collect();

        groups.sort_by(|x, y| {
            y.frame_ids
                .len()
                .cmp(&x.frame_ids.len())
                .then_with(|| x.frame_ids[0].cmp(&y.frame_ids[0]))
        });
        groups
    }

    /// Compare every A sample against the B samples inside its time window
    fn compare(&self, a: &[TimedPayload], b: &[TimedPayload]) -> PairScore {
        let tolerance = self.options.tolerance_us;
        let mut score = PairScore::default();
        let mut low = 0;

        for sample in a {
            let from = sample.timestamp_us.saturating_sub(tolerance);
            let to = sample.timestamp_us.saturating_add(tolerance);

            while low < b.len() && b[low].timestamp_us < from {
                low += 1;
            }

            let window = b[low..].iter().take_while(|other| other.timestamp_us <= to);
            let mut seen = false;
            let mut matched = false;
            for other in window {
                seen = true;
                if other.bytes == sample.bytes {
                    matched = true;
                    break;
                }
            }

            if seen {
                score.total += 1;
                if matched {
                    score.matches += 1;
                }
            }
        }

        score
    }
}
