// Connection lifecycle domain models
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// How a transport delivers its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Arbitrary fragments of a newline-delimited text stream.
    ByteStream,
    /// One complete payload per chunk.
    Message,
}

/// Counters for the current (or most recent) session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub chunks: u64,
    pub frames: u64,
    pub records: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub transport: Option<TransportKind>,
    pub stats: IngestStats,
}
