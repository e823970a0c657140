//
// ===============================
// MARK: Host transport (per cycle)
// ===============================
//

/// Sample rate assumed before the host reports one.
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// Transport state as reported by the host for one block.
///
/// This struct:
/// - is copyable
/// - is immutable per block
/// - is taken as given; nothing here is advanced by the engine
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HostTransport {
    /// Whether the host is playing.
    pub is_playing: bool,

    /// Tempo at block start.
    pub bpm: f64,

    /// Position of the block start in quarter notes.
    pub ppq_position: f64,
}

impl Default for HostTransport {
    fn default() -> Self {
        Self {
            is_playing: false,
            bpm: 120.0,
            ppq_position: 0.0,
        }
    }
}

impl HostTransport {
    pub fn playing(bpm: f64, ppq_position: f64) -> Self {
        Self {
            is_playing: true,
            bpm,
            ppq_position,
        }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    /// Whether tempo and position can be turned into sample offsets.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0 && self.ppq_position.is_finite()
    }

    /// Length of `samples` samples in quarter notes.
    #[inline]
    pub fn samples_to_beats(&self, samples: usize, sample_rate: f64) -> f64 {
        samples as f64 / sample_rate * (self.bpm / 60.0)
    }
}

//
// ===================================
// MARK: Block context
// ===================================
//

/// Per-block processing parameters that do not come from the transport.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlockContext {
    /// Sample rate (Hz).
    pub sample_rate: f64,

    /// Number of samples in this block.
    pub block_samples: usize,

    /// Whether wrapped note numbers shift by whole octaves.
    pub octaves: bool,
}

impl BlockContext {
    pub fn new(sample_rate: f64, block_samples: usize, octaves: bool) -> Self {
        Self {
            sample_rate,
            block_samples,
            octaves,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.sample_rate.is_finite() && self.sample_rate > 0.0 && self.block_samples > 0
    }
}

//
// ===================================
// MARK: Pulse arithmetic
// ===================================
//

/// Largest absolute pulse the scheduler will place events at.
///
/// Pulses stay exactly representable as `f64` and far from `i64` overflow.
pub const MAX_PULSE: i64 = 1 << 52;

/// Whether an absolute pulse is within `[-MAX_PULSE, MAX_PULSE]`.
#[inline]
pub fn pulse_in_range(pulse: i64) -> bool {
    (-MAX_PULSE..=MAX_PULSE).contains(&pulse)
}

/// First whole pulse at or after a quarter-note position.
#[inline]
pub fn pulse_position(ppq: f64, timebase: i64) -> i64 {
    (ppq * timebase as f64).ceil() as i64
}

/// Length of one pulse in samples.
#[inline]
pub fn pulse_duration_samples(sample_rate: f64, bpm: f64, timebase: i64) -> f64 {
    sample_rate * 60.0 / (bpm * timebase as f64)
}

/// The smallest absolute pulse `>= position` that is congruent to `time`
/// modulo `loop_length`.
///
/// Result is always in `[position, position + loop_length)`.
#[inline]
pub fn next_absolute_time(time: i64, position: i64, loop_length: i64) -> i64 {
    let result = position.div_euclid(loop_length) * loop_length + time;
    if result < position {
        result.saturating_add(loop_length)
    } else {
        result
    }
}
