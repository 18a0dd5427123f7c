//! One pipelined broker connection.
//!
//! Requests are written in `send` order and responses are matched to the oldest
//! outstanding request (FIFO), with the correlation id only used to assert that
//! the ordering held. A mismatch, a frame nobody is waiting for, an undecodable
//! response header, an oversized frame or a transport failure moves the
//! connection to `Failed` for good: every queued request is rejected and later
//! sends fail fast.
//!
//! Cancelling a `send` (e.g. with `tokio::time::timeout`) does not remove its
//! queue entry. The entry still consumes the next inbound frame, so a broker
//! that never answers the abandoned request desynchronises every later one.

use crate::client::frame::FrameReader;
use crate::config::ClientConfig;
use crate::error::{Result, ThorwireError};
use crate::protocol::buffer::{ReadBuffer, WriteBuffer};
use crate::protocol::codec::Decode;
use crate::protocol::header::{Request, ResponseHeader};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn};

/// Queue entry: settles its caller's outcome from one response frame.
trait PendingResponse: Send {
    fn api_key(&self) -> i16;

    fn api_version(&self) -> i16;

    fn correlation_id(&self) -> i32;

    /// Decode `frame` and deliver the outcome. An `Err` means the connection
    /// can no longer be trusted; the caller has already been told.
    fn complete(self: Box<Self>, frame: ReadBuffer) -> Result<()>;

    fn reject(self: Box<Self>, error: ThorwireError);
}

struct InflightRequest<R: Request> {
    request: R,
    correlation_id: i32,
    outcome: oneshot::Sender<Result<R::Response>>,
}

impl<R: Request> PendingResponse for InflightRequest<R> {
    fn api_key(&self) -> i16 {
        self.request.api_key()
    }

    fn api_version(&self) -> i16 {
        self.request.api_version()
    }

    fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    fn complete(self: Box<Self>, mut frame: ReadBuffer) -> Result<()> {
        let header = match R::ResponseHeader::decode(&mut frame) {
            Ok(header) => header,
            Err(e) => {
                let _ = self.outcome.send(Err(e.clone()));
                return Err(e);
            }
        };
        if header.correlation_id() != self.correlation_id {
            let err = ThorwireError::CorrelationIdMismatch {
                expected: self.correlation_id,
                actual: header.correlation_id(),
            };
            let _ = self.outcome.send(Err(err.clone()));
            return Err(err);
        }

        let result = self.request.decode_response(&mut frame);
        match &result {
            Ok(_) if !frame.is_empty() => {
                debug!(unread = frame.remaining(), "response body has unread bytes")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to decode response body"),
        }
        // The caller may have stopped waiting; the frame is consumed either way.
        let _ = self.outcome.send(result);
        Ok(())
    }

    fn reject(self: Box<Self>, error: ThorwireError) {
        let _ = self.outcome.send(Err(error));
    }
}

enum Status {
    Active,
    Failed(String),
}

struct State {
    next_correlation_id: i32,
    inflight: VecDeque<Box<dyn PendingResponse>>,
    status: Status,
}

/// State shared by the caller-facing handle and the reader/writer tasks.
struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn is_active(&self) -> bool {
        matches!(self.state.lock().status, Status::Active)
    }

    /// Match one frame against the head of the queue.
    fn dispatch(&self, frame: ReadBuffer) -> Result<()> {
        let head = self.state.lock().inflight.pop_front();
        let Some(pending) = head else {
            return Err(ThorwireError::ProtocolDesync);
        };
        let span = info_span!(
            "thorwire.request",
            api_key = pending.api_key(),
            api_version = pending.api_version(),
            correlation_id = pending.correlation_id()
        );
        let _entered = span.enter();
        debug!(len = frame.remaining(), "response frame");
        pending.complete(frame)
    }

    /// Move to `Failed` and reject everything still queued. Only the first
    /// failure is recorded.
    fn fail(&self, error: ThorwireError) {
        let drained = {
            let mut state = self.state.lock();
            if let Status::Failed(_) = state.status {
                return;
            }
            state.status = Status::Failed(error.to_string());
            std::mem::take(&mut state.inflight)
        };
        warn!(error = %error, pending = drained.len(), "connection failed");
        let reason = error.to_string();
        for pending in drained {
            let rejection = match &error {
                ThorwireError::Transport(_) => error.clone(),
                _ => ThorwireError::ConnectionFailed(reason.clone()),
            };
            pending.reject(rejection);
        }
    }
}

/// A single broker connection with a FIFO in-flight queue.
pub struct Connection {
    shared: Arc<Shared>,
    writer_tx: mpsc::UnboundedSender<Bytes>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| ThorwireError::Transport(format!("connect {}:{}: {}", host, port, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ThorwireError::Transport(e.to_string()))?;
        info!(host, port, "connected to broker");
        Ok(Self::new(stream, config))
    }

    /// Wrap an established byte stream and start the reader and writer tasks.
    /// Must be called from within a Tokio runtime.
    pub fn new<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                next_correlation_id: 0,
                inflight: VecDeque::new(),
                status: Status::Active,
            }),
        });
        let (read_half, write_half) = tokio::io::split(stream);
        let frames = FrameReader::new(config.max_frame_size, config.read_buffer_capacity);
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(Arc::clone(&shared), read_half, frames));
        let writer = tokio::spawn(write_loop(Arc::clone(&shared), write_half, writer_rx));

        Self {
            shared,
            writer_tx,
            reader,
            writer,
        }
    }

    /// Send `request` and wait for its response.
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response> {
        let outcome = self.enqueue(request)?;
        outcome.await.map_err(|_| {
            ThorwireError::ConnectionFailed("connection closed before the response arrived".into())
        })?
    }

    /// Assign the correlation id, encode the frame, queue it for the writer and
    /// append the in-flight entry, all under one lock so the write order and
    /// queue order agree.
    fn enqueue<R: Request>(&self, request: R) -> Result<oneshot::Receiver<Result<R::Response>>> {
        let mut state = self.shared.state.lock();
        if let Status::Failed(reason) = &state.status {
            return Err(ThorwireError::ConnectionFailed(reason.clone()));
        }

        let correlation_id = state.next_correlation_id;
        let mut buf = WriteBuffer::new();
        buf.put_i32(0);
        buf.write(&request.header(correlation_id))?;
        request.encode_body(&mut buf)?;
        let len = i32::try_from(buf.len() - 4)
            .map_err(|_| ThorwireError::Encoding(format!("request of {} bytes", buf.len())))?;
        buf.patch_i32(0, len)?;

        let (api_key, api_version) = (request.api_key(), request.api_version());
        let (tx, rx) = oneshot::channel();
        self.writer_tx
            .send(buf.freeze())
            .map_err(|_| ThorwireError::ConnectionFailed("writer task stopped".into()))?;
        state.next_correlation_id = correlation_id.wrapping_add(1);
        state.inflight.push_back(Box::new(InflightRequest {
            request,
            correlation_id,
            outcome: tx,
        }));
        drop(state);

        debug!(api_key, api_version, correlation_id, len, "request queued");
        Ok(rx)
    }

    /// Whether the connection is still `Active`.
    pub fn is_healthy(&self) -> bool {
        self.shared.is_active()
    }

    /// Requests written but not yet matched to a response, including any whose
    /// callers gave up waiting.
    pub fn pending_requests(&self) -> usize {
        self.shared.state.lock().inflight.len()
    }

    /// Why the connection failed, if it has.
    pub fn failure(&self) -> Option<String> {
        match &self.shared.state.lock().status {
            Status::Active => None,
            Status::Failed(reason) => Some(reason.clone()),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("healthy", &self.is_healthy())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}

async fn read_loop<R>(shared: Arc<Shared>, mut reader: R, mut frames: FrameReader)
where
    R: AsyncRead + Unpin,
{
    loop {
        match frames.read_from(&mut reader).await {
            Ok(0) => {
                shared.fail(ThorwireError::Transport("connection closed by peer".into()));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                shared.fail(e);
                return;
            }
        }
        loop {
            match frames.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = shared.dispatch(frame) {
                        shared.fail(e);
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    shared.fail(e);
                    return;
                }
            }
        }
    }
}

async fn write_loop<W>(
    shared: Arc<Shared>,
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Bytes>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if !shared.is_active() {
            break;
        }
        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            shared.fail(ThorwireError::Transport(e.to_string()));
            break;
        }
    }
}
