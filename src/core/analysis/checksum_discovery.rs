//! Per-frame-ID checksum discovery
//!
//! For every frame ID and candidate position the engine runs an ordered
//! pipeline of phases and stops at the first configuration that reaches the
//! required match rate:
//!
//! 1. XOR / sum-8
//! 2. Known algorithm registry (via auto-detection)
//! 3. CRC-8 brute force (all polynomials, init, xorout, reflection)
//! 4. CRC-16 brute force (curated polynomials, or all of them when enabled)
//!
//! Every phase is tried on the raw data range and on the data range with a
//! little-endian 2-byte frame ID prepended, which catches checksums that
//! cover the arbitration ID.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use super::checksum_detect::{detect_checksum, DetectOptions};
use super::error::{AnalysisError, Result};
use super::frame::{group_by_id, Frame, FrameSource};
use super::progress::{DiscoveryPhase, ProgressReporter, ProgressSender};
use super::{percentage, Endianness};
use crate::core::protocol::checksum::{
    extract_checksum, resolve_byte_index, ChecksumAlgorithm, ChecksumPrimitive, CrcParams, CrcWidth,
};

/// Polynomials tried in the default CRC-16 phase
pub const COMMON_CRC16_POLYNOMIALS: [u16; 16] = [
    0x1021, 0x8005, 0x3D65, 0x0589, 0x8BB7, 0xA097, 0xC867, 0x5935, 0x755B, 0x6F63, 0x1DCF, 0x080B, 0x2F15,
    0xAC9A, 0x8D95, 0xD175,
];

const CRC8_PROGRESS_INTERVAL: u32 = 100;
const CRC16_PROGRESS_INTERVAL: u32 = 500;

/// Discovery options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    /// Frame IDs with fewer frames are skipped
    pub min_samples: usize,
    /// Match percentage a configuration must reach
    pub min_match_rate: f64,
    /// Checksum positions to search (negative = from end)
    pub checksum_positions: Vec<i32>,
    /// Run the XOR / sum-8 phase
    pub try_simple_first: bool,
    /// Search all 65,535 CRC-16 polynomials instead of the common ones
    pub brute_force_crc16: bool,
    /// Frames used per ID (first N)
    pub max_samples_per_frame_id: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            min_samples: 10,
            min_match_rate: 95.0,
            checksum_positions: vec![-1, -2],
            try_simple_first: true,
            brute_force_crc16: false,
            max_samples_per_frame_id: 100,
        }
    }
}

impl DiscoveryOptions {
    fn validate(&self) -> Result<()> {
        if self.checksum_positions.is_empty() {
            return Err(AnalysisError::InvalidOptions("no checksum positions".into()));
        }
        if !(0.0..=100.0).contains(&self.min_match_rate) {
            return Err(AnalysisError::InvalidOptions(format!(
                "min_match_rate {} outside 0..=100",
                self.min_match_rate
            )));
        }
        if self.max_samples_per_frame_id == 0 {
            return Err(AnalysisError::InvalidOptions("max_samples_per_frame_id is 0".into()));
        }
        Ok(())
    }
}

/// What produced a checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChecksumKind {
    /// Registry algorithm
    Known {
        /// Algorithm
        algorithm: ChecksumAlgorithm,
    },
    /// Parameterised CRC-8
    Crc8 {
        /// Polynomial
        polynomial: u8,
        /// Initial value
        init: u8,
        /// Final XOR
        xor_out: u8,
        /// Reflected
        reflect: bool,
    },
    /// Parameterised CRC-16
    Crc16 {
        /// Polynomial
        polynomial: u16,
        /// Initial value
        init: u16,
        /// Final XOR
        xor_out: u16,
        /// Reflected
        reflect: bool,
    },
}

impl ChecksumKind {
    fn from_params(params: CrcParams) -> Self {
        match params.width {
            CrcWidth::Crc8 => ChecksumKind::Crc8 {
                polynomial: params.polynomial as u8,
                init: params.init as u8,
                xor_out: params.xor_out as u8,
                reflect: params.reflect,
            },
            CrcWidth::Crc16 => ChecksumKind::Crc16 {
                polynomial: params.polynomial,
                init: params.init,
                xor_out: params.xor_out,
                reflect: params.reflect,
            },
        }
    }

    /// Short label, used for the "most common algorithm" summary
    pub fn label(&self) -> String {
        match self {
            ChecksumKind::Known { algorithm } => algorithm.id().to_string(),
            ChecksumKind::Crc8 {
                polynomial,
                init,
                xor_out,
                reflect,
            } => format!("crc8(poly=0x{polynomial:02X},init=0x{init:02X},xorout=0x{xor_out:02X},refl={reflect})"),
            ChecksumKind::Crc16 {
                polynomial,
                init,
                xor_out,
                reflect,
            } => format!("crc16(poly=0x{polynomial:04X},init=0x{init:04X},xorout=0x{xor_out:04X},refl={reflect})"),
        }
    }
}

/// Half-open byte range in position notation (negative = from end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    /// First byte
    pub start: i32,
    /// End (exclusive)
    pub end: i32,
}

/// A confirmed checksum configuration for one frame ID
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecksumCandidate {
    /// Frame ID
    pub frame_id: u32,
    /// Checksum position (negative = from end)
    pub position: i32,
    /// Checksum length in bytes
    pub length: usize,
    /// Algorithm
    pub kind: ChecksumKind,
    /// Byte order (2-byte checksums only)
    pub endianness: Option<Endianness>,
    /// The calculation covers a little-endian 2-byte frame ID prefix
    pub includes_frame_id: bool,
    /// Frames that matched
    pub match_count: usize,
    /// Frames compared
    pub total_count: usize,
    /// Match percentage
    pub match_rate: f64,
    /// Bytes covered by the calculation (excluding the ID prefix)
    pub data_range: ByteRange,
    /// Phase that found it
    pub phase: DiscoveryPhase,
}

/// Summary across all analysed frame IDs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    /// IDs with at least one candidate
    pub frames_with_checksum: usize,
    /// Analysed IDs without a candidate
    pub frames_without_checksum: usize,
    /// Most frequent algorithm label (first seen wins ties)
    pub most_common_algorithm: Option<String>,
}

/// Discovery output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryResult {
    /// Candidates per frame ID
    pub candidates: BTreeMap<u32, Vec<ChecksumCandidate>>,
    /// IDs skipped for having fewer than `min_samples` frames
    pub skipped_frame_ids: Vec<u32>,
    /// Summary
    pub summary: DiscoverySummary,
}

/// Data ranges and stored checksums for one position / length / byte order
#[derive(Debug, Clone, Default)]
struct SampleSet {
    data: Vec<Vec<u8>>,
    expected: Vec<u16>,
}

impl SampleSet {
    fn extract(frames: &[&Frame], position: i32, length: usize, endianness: Endianness, with_id: bool) -> Self {
        let mut set = SampleSet::default();

        for frame in frames {
            let len = frame.bytes.len();
            let pos = resolve_byte_index(position, len);
            // Need at least one data byte ahead of the checksum
            if pos == 0 || pos + length > len {
                continue;
            }
            let Some(stored) = extract_checksum(&frame.bytes, pos as i32, length, endianness.is_big()) else {
                continue;
            };

            let mut data = Vec::with_capacity(pos + 2);
            if with_id {
                data.extend_from_slice(&[frame.id as u8, (frame.id >> 8) as u8]);
            }
            data.extend_from_slice(&frame.bytes[..pos]);

            set.data.push(data);
            set.expected.push(stored);
        }

        set
    }

    fn total(&self) -> usize {
        self.data.len()
    }
}

/// Shared per-(frame ID, position) search state
struct Search<'a> {
    frame_id: u32,
    frames: &'a [&'a Frame],
    position: i32,
    progress: ProgressReporter<'a>,
}

impl Search<'_> {
    #[allow(clippy::too_many_arguments)]
    fn candidate(
        &self,
        phase: DiscoveryPhase,
        kind: ChecksumKind,
        length: usize,
        endianness: Option<Endianness>,
        includes_frame_id: bool,
        match_count: usize,
        total_count: usize,
    ) -> ChecksumCandidate {
        ChecksumCandidate {
            frame_id: self.frame_id,
            position: self.position,
            length,
            kind,
            endianness,
            includes_frame_id,
            match_count,
            total_count,
            match_rate: percentage(match_count, total_count),
            data_range: ByteRange {
                start: 0,
                end: self.position,
            },
            phase,
        }
    }
}

/// Checksum discovery engine
pub struct ChecksumDiscoveryEngine<P> {
    primitive: P,
    options: DiscoveryOptions,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
}

impl<P: ChecksumPrimitive> ChecksumDiscoveryEngine<P> {
    /// Create an engine over a checksum primitive
    pub fn new(primitive: P, options: DiscoveryOptions) -> Self {
        Self {
            primitive,
            options,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress on a channel
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Abort when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Options in use
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Search every frame ID in `source`
    pub async fn discover<S: FrameSource + ?Sized>(&self, source: &S) -> Result<DiscoveryResult> {
        self.options.validate()?;
        let frames = source.frames();

        let mut result = DiscoveryResult::default();
        let mut eligible: Vec<(u32, Vec<&Frame>)> = Vec::new();

        for (id, mut group) in group_by_id(frames) {
            if group.len() < self.options.min_samples {
                result.skipped_frame_ids.push(id);
                continue;
            }
            group.truncate(self.options.max_samples_per_frame_id);
            eligible.push((id, group));
        }

        tracing::info!(
            frame_ids = eligible.len(),
            skipped = result.skipped_frame_ids.len(),
            "starting checksum discovery"
        );

        let reporter = ProgressReporter::new(self.progress.as_ref(), eligible.len());
        let mut label_counts: Vec<(String, usize)> = Vec::new();

        for (index, (frame_id, group)) in eligible.iter().enumerate() {
            let mut found = Vec::new();

            for &position in &self.options.checksum_positions {
                let search = Search {
                    frame_id: *frame_id,
                    frames: group,
                    position,
                    progress: reporter.for_frame(index, *frame_id),
                };
                if let Some(candidate) = self.search_position(&search).await? {
                    tracing::debug!(
                        frame_id = format_args!("0x{:X}", frame_id),
                        position,
                        algorithm = %candidate.kind.label(),
                        rate = candidate.match_rate,
                        "checksum found"
                    );
                    found.push(candidate);
                }
            }

            if found.is_empty() {
                result.summary.frames_without_checksum += 1;
                continue;
            }

            result.summary.frames_with_checksum += 1;
            for candidate in &found {
                let label = candidate.kind.label();
                match label_counts.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, count)) => *count += 1,
                    None => label_counts.push((label, 1)),
                }
            }
            result.candidates.insert(*frame_id, found);
        }

        let mut best: Option<&(String, usize)> = None;
        for entry in &label_counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        result.summary.most_common_algorithm = best.map(|(label, _)| label.clone());

        reporter.phase(DiscoveryPhase::Complete);
        tracing::info!(
            with_checksum = result.summary.frames_with_checksum,
            without_checksum = result.summary.frames_without_checksum,
            most_common = ?result.summary.most_common_algorithm,
            "checksum discovery finished"
        );

        Ok(result)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn accepts(&self, match_count: usize, total_count: usize) -> bool {
        total_count > 0
            && total_count >= self.options.min_samples
            && percentage(match_count, total_count) >= self.options.min_match_rate
    }

    /// Run the phases in order; the first hit wins.
    async fn search_position(&self, search: &Search<'_>) -> Result<Option<ChecksumCandidate>> {
        if self.options.try_simple_first {
            if let Some(hit) = self.simple_phase(search).await? {
                return Ok(Some(hit));
            }
        }
        if let Some(hit) = self.known_phase(search).await? {
            return Ok(Some(hit));
        }
        if let Some(hit) = self.crc8_phase(search).await? {
            return Ok(Some(hit));
        }
        self.crc16_phase(search).await
    }

    async fn simple_phase(&self, search: &Search<'_>) -> Result<Option<ChecksumCandidate>> {
        self.check_cancelled()?;
        search.progress.phase(DiscoveryPhase::Simple);

        for with_id in [false, true] {
            let set = SampleSet::extract(search.frames, search.position, 1, Endianness::Little, with_id);
            if set.total() < self.options.min_samples {
                continue;
            }

            for algorithm in [ChecksumAlgorithm::Xor, ChecksumAlgorithm::Sum8] {
                let mut matches = 0;
                for (data, &expected) in set.data.iter().zip(&set.expected) {
                    let computed = self.primitive.compute(algorithm, data, 0, data.len() as i32).await?;
                    if computed == expected {
                        matches += 1;
                    }
                }
                if self.accepts(matches, set.total()) {
                    return Ok(Some(search.candidate(
                        DiscoveryPhase::Simple,
                        ChecksumKind::Known { algorithm },
                        1,
                        None,
                        with_id,
                        matches,
                        set.total(),
                    )));
                }
            }
        }

        Ok(None)
    }

    async fn known_phase(&self, search: &Search<'_>) -> Result<Option<ChecksumCandidate>> {
        self.check_cancelled()?;
        search.progress.phase(DiscoveryPhase::KnownAlgorithms);

        for with_id in [false, true] {
            let payloads: Vec<Vec<u8>> = search
                .frames
                .iter()
                .map(|frame| {
                    let mut payload = Vec::with_capacity(frame.bytes.len() + 2);
                    if with_id {
                        payload.extend_from_slice(&[frame.id as u8, (frame.id >> 8) as u8]);
                    }
                    payload.extend_from_slice(&frame.bytes);
                    payload
                })
                .collect();

            // Positions from the end are unaffected by the prefix
            let position = if with_id && search.position >= 0 {
                search.position + 2
            } else {
                search.position
            };
            let options = DetectOptions {
                max_samples: payloads.len(),
                position: Some(position),
                byte_count: None,
                calc_start: 0,
                calc_end: Some(position),
            };

            let ranked = detect_checksum(&self.primitive, &payloads, &options).await?;
            let hit = ranked
                .into_iter()
                .find(|r| self.accepts(r.match_count, r.total_count));

            if let Some(hit) = hit {
                return Ok(Some(search.candidate(
                    DiscoveryPhase::KnownAlgorithms,
                    ChecksumKind::Known {
                        algorithm: hit.algorithm,
                    },
                    hit.algorithm.width(),
                    hit.endianness,
                    with_id,
                    hit.match_count,
                    hit.total_count,
                )));
            }
        }

        Ok(None)
    }

    async fn crc8_phase(&self, search: &Search<'_>) -> Result<Option<ChecksumCandidate>> {
        self.check_cancelled()?;
        search.progress.phase(DiscoveryPhase::Crc8BruteForce);

        let sets: Vec<(bool, SampleSet)> = [false, true]
            .into_iter()
            .map(|with_id| (with_id, SampleSet::extract(search.frames, search.position, 1, Endianness::Little, with_id)))
            .filter(|(_, set)| set.total() >= self.options.min_samples)
            .collect();
        if sets.is_empty() {
            return Ok(None);
        }

        const TOTAL: u32 = 255;
        for (tested, polynomial) in (1..=0xFFu16).enumerate() {
            self.check_cancelled()?;
            let tested = tested as u32 + 1;

            for init in [0x00, 0xFF] {
                for xor_out in [0x00, 0xFF] {
                    for reflect in [false, true] {
                        let params = CrcParams {
                            width: CrcWidth::Crc8,
                            polynomial,
                            init,
                            xor_out,
                            reflect,
                        };
                        for (with_id, set) in &sets {
                            let batch = self.primitive.test_crc_batch(&set.data, &set.expected, params).await?;
                            if self.accepts(batch.match_count, batch.total_count) {
                                search.progress.polynomials(DiscoveryPhase::Crc8BruteForce, tested, TOTAL);
                                return Ok(Some(search.candidate(
                                    DiscoveryPhase::Crc8BruteForce,
                                    ChecksumKind::from_params(params),
                                    1,
                                    None,
                                    *with_id,
                                    batch.match_count,
                                    batch.total_count,
                                )));
                            }
                        }
                    }
                }
            }

            if tested % CRC8_PROGRESS_INTERVAL == 0 {
                search.progress.polynomials(DiscoveryPhase::Crc8BruteForce, tested, TOTAL);
            }
        }

        Ok(None)
    }

    async fn crc16_phase(&self, search: &Search<'_>) -> Result<Option<ChecksumCandidate>> {
        self.check_cancelled()?;
        search.progress.phase(DiscoveryPhase::Crc16BruteForce);

        let mut sets: Vec<(Endianness, bool, SampleSet)> = Vec::new();
        for endianness in Endianness::ORDER {
            for with_id in [false, true] {
                let set = SampleSet::extract(search.frames, search.position, 2, endianness, with_id);
                if set.total() >= self.options.min_samples {
                    sets.push((endianness, with_id, set));
                }
            }
        }
        if sets.is_empty() {
            return Ok(None);
        }

        let polynomials: Vec<u16> = if self.options.brute_force_crc16 {
            (1..=0xFFFF).collect()
        } else {
            COMMON_CRC16_POLYNOMIALS.to_vec()
        };
        let total = polynomials.len() as u32;

        for (tested, &polynomial) in polynomials.iter().enumerate() {
            self.check_cancelled()?;
            let tested = tested as u32 + 1;

            for init in [0x0000, 0xFFFF] {
                for xor_out in [0x0000, 0xFFFF] {
                    for reflect in [false, true] {
                        let params = CrcParams {
                            width: CrcWidth::Crc16,
                            polynomial,
                            init,
                            xor_out,
                            reflect,
                        };
                        for (endianness, with_id, set) in &sets {
                            let batch = self.primitive.test_crc_batch(&set.data, &set.expected, params).await?;
                            if self.accepts(batch.match_count, batch.total_count) {
                                search.progress.polynomials(DiscoveryPhase::Crc16BruteForce, tested, total);
                                return Ok(Some(search.candidate(
                                    DiscoveryPhase::Crc16BruteForce,
                                    ChecksumKind::from_params(params),
                                    2,
                                    Some(*endianness),
                                    *with_id,
                                    batch.match_count,
                                    batch.total_count,
                                )));
                            }
                        }
                    }
                }
            }

            if tested % CRC16_PROGRESS_INTERVAL == 0 {
                search.progress.polynomials(DiscoveryPhase::Crc16BruteForce, tested, total);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::progress::progress_channel;
    use crate::core::protocol::checksum::{
        calculate_simple, crc16_parameterised, crc8_parameterised, BatchMatch, ChecksumError, NativeChecksum,
    };
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn frames_with<F>(id: u32, count: usize, seed: u64, checksum: F) -> Vec<Frame>
    where
        F: Fn(u32, &[u8]) -> Vec<u8>,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let data: Vec<u8> = (0..6).map(|_| rng.gen()).collect();
                let mut bytes = data.clone();
                bytes.extend(checksum(id, &data));
                Frame::new(id, i as u64 * 10_000, bytes)
            })
            .collect()
    }

    fn one_position() -> DiscoveryOptions {
        DiscoveryOptions {
            checksum_positions: vec![-1],
            ..DiscoveryOptions::default()
        }
    }

    #[tokio::test]
    async fn test_simple_xor_found_first() {
        let frames = frames_with(0x120, 20, 1, |_, d| vec![calculate_simple(ChecksumAlgorithm::Xor, d) as u8]);
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, one_position());
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x120][0];
        assert_eq!(found.kind, ChecksumKind::Known { algorithm: ChecksumAlgorithm::Xor });
        assert_eq!(found.phase, DiscoveryPhase::Simple);
        assert!(!found.includes_frame_id);
        assert_eq!(found.match_rate, 100.0);
        assert_eq!(result.summary.most_common_algorithm.as_deref(), Some("xor"));
    }

    #[tokio::test]
    async fn test_sum_with_frame_id_prefix() {
        let frames = frames_with(0x2A5, 20, 2, |id, d| {
            let mut data = vec![id as u8, (id >> 8) as u8];
            data.extend_from_slice(d);
            vec![calculate_simple(ChecksumAlgorithm::Sum8, &data) as u8]
        });
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, one_position());
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x2A5][0];
        assert_eq!(found.kind, ChecksumKind::Known { algorithm: ChecksumAlgorithm::Sum8 });
        assert!(found.includes_frame_id);
    }

    #[tokio::test]
    async fn test_known_crc16_two_bytes_from_end() {
        let frames = frames_with(0x7E8, 15, 3, |_, d| {
            calculate_simple(ChecksumAlgorithm::Crc16Modbus, d).to_le_bytes().to_vec()
        });
        let options = DiscoveryOptions {
            checksum_positions: vec![-2],
            ..DiscoveryOptions::default()
        };
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, options);
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x7E8][0];
        assert_eq!(found.kind, ChecksumKind::Known { algorithm: ChecksumAlgorithm::Crc16Modbus });
        assert_eq!(found.endianness, Some(Endianness::Little));
        assert_eq!(found.length, 2);
        assert_eq!(found.phase, DiscoveryPhase::KnownAlgorithms);
    }

    #[tokio::test]
    async fn test_crc8_brute_force() {
        // Polynomial 0x4D is not in the registry
        let frames = frames_with(0x333, 20, 4, |_, d| vec![crc8_parameterised(d, 0x4D, 0xFF, 0x00, true)]);
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, one_position());
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x333][0];
        assert_eq!(found.phase, DiscoveryPhase::Crc8BruteForce);
        assert_eq!(found.match_rate, 100.0);
        match found.kind {
            ChecksumKind::Crc8 { .. } => {}
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_crc16_common_polynomial_big_endian() {
        // DNP polynomial, not in the registry
        let frames = frames_with(0x444, 20, 5, |_, d| {
            crc16_parameterised(d, 0x3D65, 0x0000, 0xFFFF, false, false).to_be_bytes().to_vec()
        });
        let options = DiscoveryOptions {
            checksum_positions: vec![-2],
            ..DiscoveryOptions::default()
        };
        let (tx, mut rx) = progress_channel();
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, options).with_progress(tx);
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x444][0];
        assert_eq!(found.phase, DiscoveryPhase::Crc16BruteForce);
        assert_eq!(
            found.kind,
            ChecksumKind::Crc16 {
                polynomial: 0x3D65,
                init: 0,
                xor_out: 0xFFFF,
                reflect: false
            }
        );
        assert_eq!(found.endianness, Some(Endianness::Big));

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            phases.push(event.phase);
        }
        assert!(phases.contains(&DiscoveryPhase::Crc8BruteForce));
        assert_eq!(phases.last(), Some(&DiscoveryPhase::Complete));
    }

    #[tokio::test]
    async fn test_full_crc16_search_with_progress_ticks() {
        // 0x0107 is outside the curated polynomial list
        let frames = frames_with(0x555, 12, 11, |_, d| {
            crc16_parameterised(d, 0x0107, 0x0000, 0x0000, false, false).to_be_bytes().to_vec()
        });
        let options = DiscoveryOptions {
            checksum_positions: vec![-2],
            brute_force_crc16: true,
            ..DiscoveryOptions::default()
        };
        let (tx, mut rx) = progress_channel();
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, options).with_progress(tx);
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x555][0];
        assert_eq!(found.phase, DiscoveryPhase::Crc16BruteForce);
        assert_eq!(
            found.kind,
            ChecksumKind::Crc16 {
                polynomial: 0x0107,
                init: 0,
                xor_out: 0,
                reflect: false
            }
        );
        assert_eq!(found.endianness, Some(Endianness::Big));

        let mut crc8_ticks = Vec::new();
        let mut crc16_ticks = Vec::new();
        while let Ok(event) = rx.try_recv() {
            let Some(tested) = event.polynomials_tested else {
                continue;
            };
            match event.phase {
                DiscoveryPhase::Crc8BruteForce => crc8_ticks.push((tested, event.polynomials_total)),
                DiscoveryPhase::Crc16BruteForce => crc16_ticks.push((tested, event.polynomials_total)),
                _ => {}
            }
        }
        assert_eq!(crc8_ticks, vec![(100, Some(255)), (200, Some(255))]);
        assert_eq!(crc16_ticks, vec![(0x0107, Some(0xFFFF))]);
    }

    #[tokio::test]
    async fn test_known_algorithm_at_positive_position_with_frame_id() {
        let frames = frames_with(0x1B3, 15, 12, |id, d| {
            let mut data = vec![id as u8, (id >> 8) as u8];
            data.extend_from_slice(d);
            vec![calculate_simple(ChecksumAlgorithm::Crc8Maxim, &data) as u8]
        });
        let options = DiscoveryOptions {
            checksum_positions: vec![6],
            ..DiscoveryOptions::default()
        };
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, options);
        let result = engine.discover(&frames).await.unwrap();

        let found = &result.candidates[&0x1B3][0];
        assert_eq!(found.kind, ChecksumKind::Known { algorithm: ChecksumAlgorithm::Crc8Maxim });
        assert_eq!(found.phase, DiscoveryPhase::KnownAlgorithms);
        assert_eq!(found.position, 6);
        assert!(found.includes_frame_id);
        assert_eq!(found.match_count, 15);
    }

    #[tokio::test]
    async fn test_small_groups_skipped() {
        let frames = frames_with(0x10, 5, 6, |_, d| vec![calculate_simple(ChecksumAlgorithm::Xor, d) as u8]);
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, DiscoveryOptions::default());
        let result = engine.discover(&frames).await.unwrap();
        assert_eq!(result.skipped_frame_ids, vec![0x10]);
        assert!(result.candidates.is_empty());
        assert_eq!(result.summary, DiscoverySummary::default());
    }

    #[tokio::test]
    async fn test_results_are_deterministic() {
        let mut frames = frames_with(0x100, 12, 7, |_, d| vec![calculate_simple(ChecksumAlgorithm::Crc8Maxim, d) as u8]);
        frames.extend(frames_with(0x200, 12, 8, |_, d| vec![calculate_simple(ChecksumAlgorithm::Sum8, d) as u8]));

        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, one_position());
        let first = engine.discover(&frames).await.unwrap();
        let second = engine.discover(&frames).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.summary.frames_with_checksum, 2);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let frames = frames_with(0x55, 20, 9, |_, _| vec![0xAB]);
        let token = CancellationToken::new();
        token.cancel();
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, one_position()).with_cancellation(token);
        assert!(matches!(engine.discover(&frames).await, Err(AnalysisError::Cancelled)));
    }

    struct FailingPrimitive;

    #[async_trait]
    impl ChecksumPrimitive for FailingPrimitive {
        async fn compute(&self, _: ChecksumAlgorithm, _: &[u8], _: i32, _: i32) -> std::result::Result<u16, ChecksumError> {
            Err(ChecksumError::Backend("offline".into()))
        }

        async fn test_crc(&self, _: &[u8], _: u16, _: CrcParams) -> std::result::Result<bool, ChecksumError> {
            Err(ChecksumError::Backend("offline".into()))
        }

        async fn test_crc_batch(
            &self,
            _: &[Vec<u8>],
            _: &[u16],
            _: CrcParams,
        ) -> std::result::Result<BatchMatch, ChecksumError> {
            Err(ChecksumError::Backend("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_primitive_failure_propagates() {
        let frames = frames_with(0x66, 20, 10, |_, _| vec![0x00]);
        let engine = ChecksumDiscoveryEngine::new(FailingPrimitive, one_position());
        assert!(matches!(engine.discover(&frames).await, Err(AnalysisError::Primitive(_))));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = DiscoveryOptions {
            checksum_positions: Vec::new(),
            ..DiscoveryOptions::default()
        };
        let engine = ChecksumDiscoveryEngine::new(NativeChecksum, options);
        assert!(matches!(engine.discover(&Vec::<Frame>::new()).await, Err(AnalysisError::InvalidOptions(_))));
    }
}
