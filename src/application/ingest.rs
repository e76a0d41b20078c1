// Ingest pipeline - raw chunks to aggregator updates
use crate::application::frame_decoder::LineDecoder;
use crate::application::record_parser::parse_frame;
use crate::domain::aggregate::Aggregator;
use crate::domain::connection::{IngestStats, TransportKind};
use crate::domain::telemetry::TelemetryRecord;

enum Framing {
    Lines(LineDecoder),
    Messages,
}

/// Per-connection decode state. Chunks must be fed in arrival order.
pub struct IngestPipeline {
    framing: Framing,
    stats: IngestStats,
}

impl IngestPipeline {
    pub fn new(kind: TransportKind) -> Self {
        let framing = match kind {
            TransportKind::ByteStream => Framing::Lines(LineDecoder::new()),
            TransportKind::Message => Framing::Messages,
        };
        Self {
            framing,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Decode one chunk into records without touching any aggregate.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<TelemetryRecord> {
        self.stats.chunks += 1;

        let frames = match &mut self.framing {
            Framing::Lines(decoder) => {
                let lines = decoder.push(chunk);
                if decoder.pending() > 0 {
                    tracing::trace!("{} byte(s) waiting for a newline", decoder.pending());
                }
                lines
            }
            Framing::Messages => vec![String::from_utf8_lossy(chunk).into_owned()],
        };

        let mut records = Vec::new();
        for frame in frames {
            self.stats.frames += 1;
            let parsed = parse_frame(&frame);
            if parsed.is_empty() {
                self.stats.malformed += 1;
                tracing::trace!("Discarding unrecognized frame: {}", frame);
                continue;
            }
            self.stats.records += parsed.len() as u64;
            records.extend(parsed);
        }
        records
    }

    /// Decode a chunk and apply its records in order. Returns how many were applied.
    pub fn ingest(&mut self, chunk: &[u8], aggregator: &mut Aggregator) -> usize {
        let records = self.decode(chunk);
        for record in &records {
            aggregator.apply(*record);
        }
        records.len()
    }
}
