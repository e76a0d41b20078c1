// Message transport over a WebSocket text endpoint
use crate::application::transport::{CommandSink, Connection, Transport, TransportError};
use crate::domain::connection::TransportKind;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound control message understood by the device bridge.
#[derive(Serialize)]
struct CommandEnvelope<'a> {
    cmds: &'a [String],
}

pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Message
    }

    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn connect(&self) -> Result<Connection, TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                target: self.url.clone(),
                reason: e.to_string(),
            })?;

        let (write, read) = socket.split();
        let chunks = read
            .filter_map(|message| futures::future::ready(message_payload(message)))
            .boxed();

        Ok(Connection {
            kind: TransportKind::Message,
            chunks,
            sink: Box::new(WebSocketSink { write }),
        })
    }
}

/// Text frames carry one telemetry object each; everything else is control
/// traffic or noise.
fn message_payload(
    message: Result<Message, tungstenite::Error>,
) -> Option<Result<Bytes, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Bytes::from(text))),
        Ok(Message::Binary(data)) => {
            tracing::trace!("Ignoring {} byte binary frame", data.len());
            None
        }
        Ok(Message::Close(frame)) => {
            tracing::debug!("Peer sent close frame: {:?}", frame);
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(TransportError::Read(e.to_string()))),
    }
}

struct WebSocketSink {
    write: SplitSink<Socket, Message>,
}

#[async_trait]
impl CommandSink for WebSocketSink {
    async fn send_commands(&mut self, lines: &[String]) -> Result<(), TransportError> {
        let payload = serde_json::to_string(&CommandEnvelope { cmds: lines })
            .map_err(|e| TransportError::Write(e.to_string()))?;

        self.write
            .send(Message::Text(payload))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.write.close().await {
            tracing::debug!("Error closing websocket: {}", e);
        }
    }
}
