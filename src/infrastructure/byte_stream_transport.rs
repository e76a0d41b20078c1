// Byte-stream transport over a serial device node or a TCP serial bridge
use crate::application::transport::{CommandSink, Connection, Transport, TransportError};
use crate::domain::connection::TransportKind;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Character device such as `/dev/ttyUSB0`. Line settings are left to the host.
    Device(PathBuf),
    /// `host:port` of a serial-to-network bridge.
    Tcp(String),
}

pub struct ByteStreamTransport {
    target: LinkTarget,
    read_buffer_bytes: usize,
}

impl ByteStreamTransport {
    pub fn new(target: LinkTarget, read_buffer_bytes: usize) -> Self {
        Self {
            target,
            read_buffer_bytes,
        }
    }

    fn connect_error(&self, e: std::io::Error) -> TransportError {
        TransportError::Connect {
            target: self.describe(),
            reason: e.to_string(),
        }
    }

    fn connection<R, W>(&self, reader: R, writer: W) -> Connection
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Connection {
            kind: TransportKind::ByteStream,
            chunks: read_chunks(reader, self.read_buffer_bytes).boxed(),
            sink: Box::new(LineSink { writer }),
        }
    }
}

#[async_trait]
impl Transport for ByteStreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ByteStream
    }

    fn describe(&self) -> String {
        match &self.target {
            LinkTarget::Device(path) => path.display().to_string(),
            LinkTarget::Tcp(address) => format!("tcp://{}", address),
        }
    }

    async fn connect(&self) -> Result<Connection, TransportError> {
        match &self.target {
            LinkTarget::Device(path) => {
                let (reader, writer) = open_device(path).map_err(|e| self.connect_error(e))?;
                Ok(self.connection(reader, writer))
            }
            LinkTarget::Tcp(address) => {
                let stream = TcpStream::connect(address)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("Could not disable Nagle on {}: {}", address, e);
                }
                let (reader, writer) = stream.into_split();
                Ok(self.connection(reader, writer))
            }
        }
    }
}

/// Open a device node as two non-blocking descriptors driven by the reactor.
///
/// Reads and writes never occupy a blocking thread, so a silent device can
/// still be written to and closed.
fn open_device(path: &Path) -> std::io::Result<(pipe::Receiver, pipe::Sender)> {
    let mut options = pipe::OpenOptions::new();
    // ttys are character devices, not FIFOs
    options.unchecked(true);
    #[cfg(target_os = "linux")]
    options.read_write(true);

    let reader = options.open_receiver(path)?;
    let writer = options.open_sender(path)?;
    Ok((reader, writer))
}

/// Yield whatever the link delivers, as it arrives. Ends on EOF.
pub fn read_chunks<R>(
    mut reader: R,
    buffer_size: usize,
) -> impl Stream<Item = Result<Bytes, TransportError>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer = BytesMut::with_capacity(buffer_size);
        loop {
            buffer.reserve(buffer_size);
            let n = reader
                .read_buf(&mut buffer)
                .await
                .map_err(|e| TransportError::Read(e.to_string()))?;
            if n == 0 {
                break;
            }
            yield buffer.split().freeze();
        }
    }
}

/// Writes each command as one CRLF-terminated line.
struct LineSink<W> {
    writer: W,
}

#[async_trait]
impl<W> CommandSink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_commands(&mut self, lines: &[String]) -> Result<(), TransportError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut payload = BytesMut::new();
        for line in lines {
            payload.put_slice(line.as_bytes());
            payload.put_slice(b"\r\n");
        }

        self.writer
            .write_all(&payload)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Error closing byte-stream writer: {}", e);
        }
    }
}
