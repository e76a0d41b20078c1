// Telemetry record domain models
use serde::Serialize;

/// Raw frequencies above this value are taken to be Hz, everything else MHz.
pub const DEFAULT_HZ_THRESHOLD: f64 = 10_000.0;

/// One decoded sample from the device stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryRecord {
    Throughput { mbps: f64 },
    /// `frequency` is still in its wire unit, which may be Hz or MHz.
    Spectrum { frequency: f64, power: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputPoint {
    pub sequence: u64,
    pub mbps: f64,
}

impl ThroughputPoint {
    pub fn new(sequence: u64, mbps: f64) -> Self {
        Self { sequence, mbps }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumBin {
    pub frequency_mhz: f64,
    pub power: f64,
}

impl SpectrumBin {
    pub fn new(frequency_mhz: f64, power: f64) -> Self {
        Self {
            frequency_mhz,
            power,
        }
    }
}

/// Frequency rounded to 1 kHz, the resolution spectrum bins are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrequencyKey(i64);

impl FrequencyKey {
    /// Round a MHz value to 3 decimal places.
    pub fn from_mhz(mhz: f64) -> Self {
        Self((mhz * 1000.0).round() as i64)
    }

    pub fn as_mhz(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

/// Convert a frequency of ambiguous unit to MHz.
///
/// Values strictly greater than `hz_threshold` are treated as Hz and scaled down;
/// the rest are assumed to already be MHz. This is a heuristic and cannot tell
/// e.g. 9 kHz from 9 GHz expressed in MHz.
pub fn normalize_frequency(raw: f64, hz_threshold: f64) -> FrequencyKey {
    let mhz = if raw > hz_threshold { raw / 1_000_000.0 } else { raw };
    FrequencyKey::from_mhz(mhz)
}
