//! Checksum auto-detection
//!
//! Scores every registry algorithm against one payload set and ranks the
//! configurations that matched.

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::{percentage, Endianness};
use crate::core::protocol::checksum::{resolve_byte_index, ChecksumAlgorithm, ChecksumPrimitive};

/// Auto-detection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    /// Payloads examined (first N)
    pub max_samples: usize,
    /// Checksum position; defaults to the last `width` bytes
    pub position: Option<i32>,
    /// Only try algorithms with this output width (1 or 2)
    pub byte_count: Option<usize>,
    /// First byte of the calculated range
    pub calc_start: i32,
    /// End of the calculated range (exclusive); defaults to the checksum position
    pub calc_end: Option<i32>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            max_samples: 20,
            position: None,
            byte_count: None,
            calc_start: 0,
            calc_end: None,
        }
    }
}

impl DetectOptions {
    /// Fix the checksum position
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Constrain the checksum width
    pub fn with_byte_count(mut self, byte_count: usize) -> Self {
        self.byte_count = Some(byte_count);
        self
    }

    /// Set the calculated range
    pub fn with_calc_range(mut self, start: i32, end: Option<i32>) -> Self {
        self.calc_start = start;
        self.calc_end = end;
        self
    }

    /// Set the sample cap
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }
}

/// One fully specified checksum configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// Registry algorithm
    pub algorithm: ChecksumAlgorithm,
    /// Checksum position (negative = from end)
    pub position: i32,
    /// Byte order for 2-byte checksums
    pub endianness: Option<Endianness>,
    /// First byte of the calculated range
    pub calc_start: i32,
    /// End of the calculated range (exclusive)
    pub calc_end: i32,
}

/// A ranked detection result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedChecksum {
    /// Registry algorithm
    pub algorithm: ChecksumAlgorithm,
    /// Byte order (2-byte algorithms only)
    pub endianness: Option<Endianness>,
    /// Resolved checksum position
    pub position: i32,
    /// Samples whose stored checksum matched
    pub match_count: usize,
    /// Samples compared
    pub total_count: usize,
    /// Match percentage
    pub match_rate: f64,
}

impl DetectedChecksum {
    /// The configuration this result was scored under
    pub fn config(&self, calc_start: i32, calc_end: i32) -> ChecksumConfig {
        ChecksumConfig {
            algorithm: self.algorithm,
            position: self.position,
            endianness: self.endianness,
            calc_start,
            calc_end,
        }
    }
}

/// Match / total for one configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfigScore {
    /// Samples whose stored checksum matched
    pub match_count: usize,
    /// Samples compared
    pub total_count: usize,
    /// Match percentage
    pub match_rate: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    little: usize,
    big: usize,
    total: usize,
}

/// Score one algorithm at one position.
///
/// Each sample is computed once and compared under both byte orders, so the
/// detection pass and [`match_rate`] always agree.
async fn score<P>(
    primitive: &P,
    samples: &[impl AsRef<[u8]>],
    algorithm: ChecksumAlgorithm,
    position: i32,
    calc_start: i32,
    calc_end: i32,
) -> Result<Tally>
where
    P: ChecksumPrimitive + ?Sized,
{
    let width = algorithm.width();
    let mut tally = Tally::default();

    for sample in samples {
        let data = sample.as_ref();
        let len = data.len();
        let pos = resolve_byte_index(position, len);
        if pos + width > len {
            continue;
        }
        let start = resolve_byte_index(calc_start, len).min(len);
        let end = resolve_byte_index(calc_end, len).min(len);
        if start >= end {
            continue;
        }

        let computed = primitive.compute(algorithm, data, calc_start, calc_end).await?;
        tally.total += 1;

        if width == 1 {
            if u16::from(data[pos]) == computed {
                tally.little += 1;
                tally.big += 1;
            }
        } else {
            let stored = [data[pos], data[pos + 1]];
            if u16::from_le_bytes(stored) == computed {
                tally.little += 1;
            }
            if u16::from_be_bytes(stored) == computed {
                tally.big += 1;
            }
        }
    }

    Ok(tally)
}

/// Rank registry algorithms against `payloads`.
///
/// Results are sorted by match rate, then match count; registry order (and
/// little- before big-endian) breaks remaining ties. Configurations with no
/// match are omitted.
pub async fn detect_checksum<P>(
    primitive: &P,
    payloads: &[impl AsRef<[u8]>],
    options: &DetectOptions,
) -> Result<Vec<DetectedChecksum>>
where
    P: ChecksumPrimitive + ?Sized,
{
    let samples = &payloads[..payloads.len().min(options.max_samples)];
    let mut results = Vec::new();

    for &algorithm in ChecksumAlgorithm::all() {
        let width = algorithm.width();
        if options.byte_count.is_some_and(|n| n != width) {
            continue;
        }

        let position = options.position.unwrap_or(-(width as i32));
        let calc_end = options.calc_end.unwrap_or(position);
        let tally = score(primitive, samples, algorithm, position, options.calc_start, calc_end).await?;

        let orders: &[(Option<Endianness>, usize)] = if width == 1 {
            &[(None, tally.little)]
        } else {
            &[(Some(Endianness::Little), tally.little), (Some(Endianness::Big), tally.big)]
        };

        for &(endianness, match_count) in orders {
            if match_count == 0 {
                continue;
            }
            results.push(DetectedChecksum {
                algorithm,
                endianness,
                position,
                match_count,
                total_count: tally.total,
                match_rate: percentage(match_count, tally.total),
            });
        }
    }

    // Stable: equal entries keep registry order
    results.sort_by(|a, b| {
        b.match_rate
            .total_cmp(&a.match_rate)
            .then(b.match_count.cmp(&a.match_count))
    });

    tracing::debug!(
        samples = samples.len(),
        best = ?results.first().map(|r| (r.algorithm, r.match_rate)),
        "checksum auto-detection finished"
    );

    Ok(results)
}

/// Recompute the match rate of one fixed configuration over the first
/// `max_samples` payloads.
pub async fn match_rate<P>(
    primitive: &P,
    payloads: &[impl AsRef<[u8]>],
    config: &ChecksumConfig,
    max_samples: usize,
) -> Result<ConfigScore>
where
    P: ChecksumPrimitive + ?Sized,
{
    let samples = &payloads[..payloads.len().min(max_samples)];
    let tally = score(
        primitive,
        samples,
        config.algorithm,
        config.position,
        config.calc_start,
        config.calc_end,
    )
    .await?;

    let match_count = match config.endianness {
        Some(Endianness::Big) => tally.big,
        _ => tally.little,
    };

    Ok(ConfigScore {
        match_count,
        total_count: tally.total,
        match_rate: percentage(match_count, tally.total),
    })
}
