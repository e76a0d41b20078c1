// Transport traits for telemetry links
use crate::domain::connection::TransportKind;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("read from link failed: {0}")]
    Read(String),

    #[error("write to link failed: {0}")]
    Write(String),

    #[error("not connected")]
    NotConnected,
}

/// Raw chunks in arrival order. Ends when the peer closes the link.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A live link returned by [`Transport::connect`].
pub struct Connection {
    pub kind: TransportKind,
    pub chunks: ChunkStream,
    pub sink: Box<dyn CommandSink>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Human readable target for logs, e.g. a device path or URL.
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// Outbound half of a link.
#[async_trait]
pub trait CommandSink: Send {
    /// Forward command lines to the device. Lines are passed through untouched.
    async fn send_commands(&mut self, lines: &[String]) -> Result<(), TransportError>;

    /// Release the write side. Errors are not reported since the link is going away.
    async fn close(&mut self);
}

/// Chooses which transport a new connection uses.
pub trait TransportSelector: Send + Sync {
    fn select(&self) -> Box<dyn Transport>;
}
