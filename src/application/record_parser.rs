// Parse decoded frames into telemetry records
use crate::domain::telemetry::TelemetryRecord;
use serde_json::{Map, Value};

/// Classify one frame.
///
/// Returns no records for anything that is not a JSON object of a known shape;
/// malformed frames are expected noise on a live link and are not errors.
/// The throughput and spectrum checks are independent, so an object carrying
/// `mbps`, `f` and `p` yields both records, throughput first.
pub fn parse_frame(frame: &str) -> Vec<TelemetryRecord> {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(frame) else {
        return Vec::new();
    };

    let mut records = Vec::with_capacity(1);
    if let Some(mbps) = number(&object, "mbps") {
        records.push(TelemetryRecord::Throughput { mbps });
    }
    if let (Some(frequency), Some(power)) = (number(&object, "f"), number(&object, "p")) {
        records.push(TelemetryRecord::Spectrum { frequency, power });
    }
    records
}

fn number(object: &Map<String, Value>, field: &str) -> Option<f64> {
    object.get(field).and_then(Value::as_f64)
}
