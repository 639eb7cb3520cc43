use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use routedns_core::DnsMessage;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;
use crate::framed::{read_framed, write_framed};
use crate::pending::PendingTable;

/// Dials the single connection a [`PipelinedClient`] multiplexes queries
/// over. One implementation per stream-oriented protocol substrate
/// (TCP, DoT, DTLS) — UDP and the QUIC-based protocols have their own
/// per-query dispatch and don't use this abstraction (§4.1 "UDP is a
/// degenerate case"; "QUIC-specific variation... one stream per query").
#[async_trait]
pub trait StreamDialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn dial(&self) -> Result<Self::Stream, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub idle_read_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            idle_read_timeout: Duration::from_secs(60),
        }
    }
}

struct Request {
    query: DnsMessage,
    respond: oneshot::Sender<Result<DnsMessage, UpstreamError>>,
}

/// A single long-lived task pair sharing one connection at a time,
/// multiplexing arbitrarily many concurrent queries over it (§4.1).
///
/// Caller threads enqueue through a bounded channel; the client lazily
/// dials on first enqueue and re-dials on demand after any disconnect.
pub struct PipelinedClient {
    id: String,
    request_tx: mpsc::Sender<Request>,
    _driver: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for PipelinedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelinedClient").field("id", &self.id).finish()
    }
}

impl PipelinedClient {
    pub fn new<D: StreamDialer>(id: impl Into<String>, dialer: D, config: PipelineConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(config.queue_capacity);
        let driver = tokio::spawn(drive(dialer, request_rx, config));
        Self {
            id: id.into(),
            request_tx,
            _driver: driver,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enqueues `query`, failing immediately if the driver task has exited
    /// (it never does in normal operation; this only fires during shutdown).
    pub async fn query(&self, query: DnsMessage, timeout: Duration) -> Result<DnsMessage, UpstreamError> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(Request { query, respond: tx })
            .await
            .map_err(|_| UpstreamError::QueueClosed)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(UpstreamError::Cancelled),
            Err(_) => Err(UpstreamError::Timeout),
        }
    }
}

async fn drive<D: StreamDialer>(dialer: D, mut request_rx: mpsc::Receiver<Request>, config: PipelineConfig) {
    loop {
        let Some(first) = request_rx.recv().await else {
            return;
        };

        let stream = match dialer.dial().await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = first.respond.send(Err(e));
                continue;
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let pending = Arc::new(PendingTable::new());
        let stop = CancellationToken::new();
        let (write_tx, write_rx) = mpsc::channel::<Request>(config.queue_capacity);

        if write_tx.send(first).await.is_err() {
            continue;
        }

        let writer = tokio::spawn(writer_loop(write_half, write_rx, pending.clone(), stop.clone()));
        let reader = tokio::spawn(reader_loop(read_half, pending.clone(), stop.clone(), config.idle_read_timeout));

        // Forward subsequent requests into this connection's writer until
        // either side tears the connection down.
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                maybe_req = request_rx.recv() => {
                    match maybe_req {
                        Some(req) => {
                            if write_tx.send(req).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            drop(write_tx);
                            stop.cancel();
                            let _ = writer.await;
                            let _ = reader.await;
                            return;
                        }
                    }
                }
            }
        }

        drop(write_tx);
        pending.fail_all(|| UpstreamError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection closed")));
        let _ = writer.await;
        let _ = reader.await;
    }
}

async fn writer_loop<W: AsyncWrite + Unpin>(
    mut write_half: W,
    mut rx: mpsc::Receiver<Request>,
    pending: Arc<PendingTable>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            maybe_req = rx.recv() => {
                let Some(req) = maybe_req else { return };
                let original_id = req.query.id();
                let conn_id = pending.register(original_id, req.respond);

                let mut outbound = req.query;
                outbound.set_id(conn_id);

                if let Err(e) = write_framed(&mut write_half, &outbound).await {
                    pending.fail(conn_id, e);
                    stop.cancel();
                    return;
                }
            }
        }
    }
}

async fn reader_loop<R: AsyncRead + Unpin>(
    mut read_half: R,
    pending: Arc<PendingTable>,
    stop: CancellationToken,
    idle_timeout: Duration,
) {
    loop {
        let read = tokio::select! {
            _ = stop.cancelled() => return,
            read = tokio::time::timeout(idle_timeout, read_framed(&mut read_half)) => read,
        };

        let response = match read {
            Ok(Ok(Some(response))) => response,
            Ok(Ok(None)) => {
                stop.cancel();
                return;
            }
            Ok(Err(_)) | Err(_) => {
                stop.cancel();
                return;
            }
        };

        if !pending.complete(response.id(), response) {
            tracing::debug!(target: "routedns::upstream", "response for unknown id, dropping");
        }
    }
}
