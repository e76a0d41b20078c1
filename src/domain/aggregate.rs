// Bounded aggregate views fed by the ingest loop
use super::telemetry::{
    normalize_frequency, FrequencyKey, SpectrumBin, TelemetryRecord, ThroughputPoint,
    DEFAULT_HZ_THRESHOLD,
};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_THROUGHPUT_CAPACITY: usize = 300;
pub const DEFAULT_SPECTRUM_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateLimits {
    pub throughput_capacity: usize,
    pub spectrum_capacity: usize,
    pub hz_threshold: f64,
}

impl Default for AggregateLimits {
    fn default() -> Self {
        Self {
            throughput_capacity: DEFAULT_THROUGHPUT_CAPACITY,
            spectrum_capacity: DEFAULT_SPECTRUM_CAPACITY,
            hz_threshold: DEFAULT_HZ_THRESHOLD,
        }
    }
}

/// Point-in-time copy of both views, detached from the live aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub throughput: Vec<ThroughputPoint>,
    pub spectrum: Vec<SpectrumBin>,
    pub updated_at_ms: Option<i64>,
}

/// Sliding throughput window plus the latest power per spectrum bin.
#[derive(Debug, Clone)]
pub struct Aggregator {
    limits: AggregateLimits,
    throughput: VecDeque<ThroughputPoint>,
    spectrum: BTreeMap<FrequencyKey, f64>,
}

impl Aggregator {
    pub fn new(limits: AggregateLimits) -> Self {
        Self {
            limits,
            throughput: VecDeque::with_capacity(limits.throughput_capacity + 1),
            spectrum: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, record: TelemetryRecord) {
        match record {
            TelemetryRecord::Throughput { mbps } => self.apply_throughput(mbps),
            TelemetryRecord::Spectrum { frequency, power } => {
                let key = normalize_frequency(frequency, self.limits.hz_threshold);
                self.apply_spectrum(key, power);
            }
        }
    }

    /// Append a sample with the next sequence number, evicting from the front
    /// once the window is full.
    pub fn apply_throughput(&mut self, mbps: f64) {
        let sequence = self.throughput.back().map_or(1, |p| p.sequence + 1);
        self.throughput.push_back(ThroughputPoint::new(sequence, mbps));

        while self.throughput.len() > self.limits.throughput_capacity {
            self.throughput.pop_front();
        }
    }

    /// Last write wins per bin. Overflow drops the highest frequencies.
    pub fn apply_spectrum(&mut self, frequency: FrequencyKey, power: f64) {
        self.spectrum.insert(frequency, power);

        while self.spectrum.len() > self.limits.spectrum_capacity {
            self.spectrum.pop_last();
        }
    }

    pub fn throughput(&self) -> Vec<ThroughputPoint> {
        self.throughput.iter().copied().collect()
    }

    /// Bins sorted ascending by frequency.
    pub fn spectrum(&self) -> Vec<SpectrumBin> {
        self.spectrum
            .iter()
            .map(|(key, power)| SpectrumBin::new(key.as_mhz(), *power))
            .collect()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            throughput: self.throughput(),
            spectrum: self.spectrum(),
            updated_at_ms: None,
        }
    }

    pub fn clear(&mut self) {
        self.throughput.clear();
        self.spectrum.clear();
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregateLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(frequency: f64, power: f64) -> TelemetryRecord {
        TelemetryRecord::Spectrum { frequency, power }
    }

    #[test]
    fn test_sequences_start_at_one_and_increase() {
        let mut agg = Aggregator::default();
        agg.apply_throughput(42.5);
        agg.apply_throughput(50.0);

        assert_eq!(
            agg.throughput(),
            vec![ThroughputPoint::new(1, 42.5), ThroughputPoint::new(2, 50.0)]
        );
    }

    #[test]
    fn test_throughput_window_evicts_oldest() {
        let mut agg = Aggregator::default();
        for i in 0..301 {
            agg.apply_throughput(i as f64);
        }

        let series = agg.throughput();
        assert_eq!(series.len(), 300);
        assert_eq!(series.first().map(|p| p.sequence), Some(2));
        assert_eq!(series.last().map(|p| p.sequence), Some(301));
    }

    #[test]
    fn test_throughput_window_invariants_hold_for_long_runs() {
        let mut agg = Aggregator::default();
        for i in 0..2_000 {
            agg.apply_throughput((i % 17) as f64 * 1.5);
            let series = agg.throughput();
            assert!(series.len() <= 300);
            assert!(series.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
        }
        assert_eq!(agg.throughput().last().map(|p| p.sequence), Some(2_000));
    }

    #[test]
    fn test_spectrum_upsert_replaces_power() {
        let mut agg = Aggregator::default();
        agg.apply(spectrum(433.92, -80.0));
        agg.apply(spectrum(868.1, -90.0));
        agg.apply(spectrum(433_920_000.0, -75.0));

        assert_eq!(
            agg.spectrum(),
            vec![SpectrumBin::new(433.92, -75.0), SpectrumBin::new(868.1, -90.0)]
        );
    }

    #[test]
    fn test_spectrum_is_sorted_and_bounded() {
        let mut agg = Aggregator::default();
        // interleave high and low frequencies so insertion order is not sorted
        for i in 0..1_500u32 {
            let mhz = if i % 2 == 0 { 100.0 + i as f64 } else { 5_000.0 - i as f64 };
            agg.apply(spectrum(mhz, -70.0));

            let bins = agg.spectrum();
            assert!(bins.len() <= 1024);
            assert!(bins.windows(2).all(|w| w[0].frequency_mhz < w[1].frequency_mhz));
        }
    }

    #[test]
    fn test_spectrum_overflow_drops_highest_frequencies() {
        let limits = AggregateLimits {
            spectrum_capacity: 3,
            ..AggregateLimits::default()
        };
        let mut agg = Aggregator::new(limits);
        for mhz in [400.0, 100.0, 300.0, 200.0] {
            agg.apply(spectrum(mhz, -60.0));
        }

        let freqs: Vec<f64> = agg.spectrum().iter().map(|b| b.frequency_mhz).collect();
        assert_eq!(freqs, vec![100.0, 200.0, 300.0]);

        // a new top bin is evicted immediately
        agg.apply(spectrum(900.0, -50.0));
        let freqs: Vec<f64> = agg.spectrum().iter().map(|b| b.frequency_mhz).collect();
        assert_eq!(freqs, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_worked_example() {
        let mut agg = Aggregator::default();
        agg.apply(TelemetryRecord::Throughput { mbps: 42.5 });
        agg.apply(TelemetryRecord::Throughput { mbps: 50.0 });
        agg.apply(spectrum(868_100_000.0, -90.0));
        agg.apply(spectrum(0.125, -91.0));

        let snapshot = agg.snapshot();
        assert_eq!(
            snapshot.throughput,
            vec![ThroughputPoint::new(1, 42.5), ThroughputPoint::new(2, 50.0)]
        );
        assert_eq!(
            snapshot.spectrum,
            vec![SpectrumBin::new(0.125, -91.0), SpectrumBin::new(868.1, -90.0)]
        );
    }

    #[test]
    fn test_clear_restarts_sequence() {
        let mut agg = Aggregator::default();
        agg.apply_throughput(1.0);
        agg.apply(spectrum(100.0, -70.0));
        agg.clear();
        assert!(agg.throughput().is_empty());
        assert!(agg.spectrum().is_empty());

        agg.apply_throughput(2.0);
        assert_eq!(agg.throughput(), vec![ThroughputPoint::new(1, 2.0)]);
    }
}
