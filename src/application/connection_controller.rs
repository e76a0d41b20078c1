// Connection controller - transport lifecycle and the ingest read loop
use crate::application::aggregate_store::AggregateStore;
use crate::application::ingest::IngestPipeline;
use crate::application::transport::{ChunkStream, CommandSink, TransportError, TransportSelector};
use crate::domain::connection::{ConnectionState, ConnectionStatus, IngestStats};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("connection already {0:?}")]
    AlreadyActive(ConnectionState),

    #[error("connect cancelled by disconnect")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

type SharedSink = Arc<Mutex<Option<Box<dyn CommandSink>>>>;

struct Session {
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
    sink: SharedSink,
}

impl Session {
    /// Cancel the read loop, wait for it and release the write side.
    async fn stop(self) {
        // the loop may already have exited on its own
        let _ = self.shutdown.send(());
        if let Err(e) = self.reader.await {
            tracing::warn!("Read loop ended abnormally: {}", e);
        }
        close_sink(&self.sink).await;
    }
}

/// Owns the connection state machine. At most one session is live at a time.
pub struct ConnectionController {
    selector: Arc<dyn TransportSelector>,
    store: AggregateStore,
    reset_on_disconnect: bool,
    connect_timeout: Duration,
    status: Arc<watch::Sender<ConnectionStatus>>,
    session: Mutex<Option<Session>>,
    // aborts the transport handshake while Connecting
    pending_connect: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConnectionController {
    pub fn new(
        selector: Arc<dyn TransportSelector>,
        store: AggregateStore,
        reset_on_disconnect: bool,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus {
            state: ConnectionState::Disconnected,
            transport: None,
            stats: IngestStats::default(),
        });
        Self {
            selector,
            store,
            reset_on_disconnect,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            status: Arc::new(status),
            session: Mutex::new(None),
            pending_connect: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Select a transport and start ingesting from it.
    ///
    /// Rejected while a connection is connecting or connected. A failed or
    /// cancelled connect leaves the controller disconnected and the
    /// aggregates untouched. The session lock is not held during the
    /// handshake, so `disconnect` can abort it.
    pub async fn connect(&self) -> Result<ConnectionStatus, ControllerError> {
        let (transport, mut cancel) = {
            let mut session = self.session.lock().await;

            let current = self.status.borrow().state;
            if current != ConnectionState::Disconnected {
                return Err(ControllerError::AlreadyActive(current));
            }

            // a session whose link dropped is still parked here
            if let Some(stale) = session.take() {
                stale.stop().await;
            }

            let (cancel_tx, cancel_rx) = oneshot::channel();
            *self.pending_connect.lock().await = Some(cancel_tx);

            let transport = self.selector.select();
            self.status.send_modify(|s| {
                s.state = ConnectionState::Connecting;
                s.transport = Some(transport.kind());
                s.stats = IngestStats::default();
            });
            (transport, cancel_rx)
        };

        let target = transport.describe();
        tracing::info!("Connecting to {} ({:?})", target, transport.kind());

        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = tokio::time::timeout(self.connect_timeout, transport.connect()) => {
                Some(result.unwrap_or_else(|_| {
                    Err(TransportError::Connect {
                        target: target.clone(),
                        reason: format!("timed out after {:?}", self.connect_timeout),
                    })
                }))
            }
        };

        let mut session = self.session.lock().await;
        // disconnect takes the handle before signalling, so an empty slot means cancelled
        let cancelled = self.pending_connect.lock().await.take().is_none();

        let connection = match outcome {
            Some(Ok(mut connection)) if cancelled => {
                connection.sink.close().await;
                tracing::info!("Connect to {} cancelled", target);
                return Err(ControllerError::Cancelled);
            }
            Some(Ok(connection)) => connection,
            Some(Err(e)) => {
                tracing::error!("Connection to {} failed: {}", target, e);
                self.status
                    .send_modify(|s| s.state = ConnectionState::Disconnected);
                return Err(e.into());
            }
            None => {
                tracing::info!("Connect to {} cancelled", target);
                return Err(ControllerError::Cancelled);
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let sink: SharedSink = Arc::new(Mutex::new(Some(connection.sink)));

        // must be visible before the loop can report a dropped link
        self.status.send_modify(|s| s.state = ConnectionState::Connected);
        tracing::info!("Connected to {}", target);

        let reader = tokio::spawn(run_session(
            connection.chunks,
            IngestPipeline::new(connection.kind),
            self.store.clone(),
            self.status.clone(),
            sink.clone(),
            shutdown_rx,
        ));

        *session = Some(Session {
            shutdown: shutdown_tx,
            reader,
            sink,
        });

        Ok(self.status())
    }

    /// Tear down the active session or abort a pending connect. Aggregates
    /// are kept unless `reset_on_disconnect` is set.
    pub async fn disconnect(&self) -> ConnectionStatus {
        if let Some(cancel) = self.pending_connect.lock().await.take() {
            let _ = cancel.send(());
        }

        let mut session = self.session.lock().await;

        if let Some(active) = session.take() {
            active.stop().await;
            tracing::info!("Disconnected");

            if self.reset_on_disconnect {
                self.store.clear().await;
            }
        }

        self.status
            .send_modify(|s| s.state = ConnectionState::Disconnected);
        self.status()
    }

    /// Forward command lines to the device over the active link.
    ///
    /// Lines are trimmed and blank lines dropped before the sink frames them.
    pub async fn send_commands(&self, lines: &[String]) -> Result<(), TransportError> {
        let sink = match self.session.lock().await.as_ref() {
            Some(active) => active.sink.clone(),
            None => return Err(TransportError::NotConnected),
        };

        let lines: Vec<String> = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let mut sink = sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        tracing::debug!("Sending {} command line(s)", lines.len());
        sink.send_commands(&lines).await
    }

    pub async fn reset_aggregates(&self) {
        self.store.clear().await;
        tracing::info!("Aggregates cleared");
    }
}

async fn close_sink(sink: &SharedSink) {
    if let Some(mut sink) = sink.lock().await.take() {
        sink.close().await;
    }
}

/// Apply chunks in arrival order until cancelled or the link fails.
async fn run_session(
    mut chunks: ChunkStream,
    mut pipeline: IngestPipeline,
    store: AggregateStore,
    status: Arc<watch::Sender<ConnectionStatus>>,
    sink: SharedSink,
    mut shutdown: oneshot::Receiver<()>,
) {
    let reason = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::debug!("Read loop cancelled");
                return;
            }
            next = chunks.next() => match next {
                Some(Ok(chunk)) => {
                    let applied = store.update(|agg| pipeline.ingest(&chunk, agg)).await;
                    tracing::trace!(
                        "Applied {} record(s) from {} byte chunk",
                        applied,
                        chunk.len()
                    );
                    let stats = pipeline.stats();
                    status.send_modify(|s| s.stats = stats);
                }
                Some(Err(e)) => break e.to_string(),
                None => break "link closed by peer".to_string(),
            }
        }
    };

    tracing::warn!("Telemetry link lost: {}", reason);
    drop(chunks);
    close_sink(&sink).await;
    status.send_modify(|s| s.state = ConnectionState::Disconnected);
}
