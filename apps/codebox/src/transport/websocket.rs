use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{ConnectionError, ConnectionEvent, ConnectionState, FailureCause, FrameSink};
use crate::config::ClientConfig;

struct Shared {
    state: RwLock<ConnectionState>,
    failure_reported: AtomicBool,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_open(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
        }
    }

    /// Moves to `Failed`. Returns true only for the first caller.
    fn fail(&self) -> bool {
        *self.state.write() = ConnectionState::Failed;
        !self.failure_reported.swap(true, Ordering::SeqCst)
    }
}

/// The single duplex channel to the backend.
///
/// Created once; a failed connection stays failed.
pub struct Connection {
    handle: ConnectionHandle,
    task: Option<JoinHandle<()>>,
}

/// Cloneable sending side of a [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// Starts connecting and returns immediately in `Connecting` state.
    /// Events are delivered to `events` in order.
    pub fn connect(config: &ClientConfig, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        let shared = Arc::new(Shared {
            state: RwLock::new(ConnectionState::Connecting),
            failure_reported: AtomicBool::new(false),
        });
        let (outbound, rx_out) = mpsc::unbounded_channel::<String>();
        let endpoint = config.endpoint.to_string();
        let connect_timeout = config.connect_timeout;

        let task = tokio::spawn(drive_connection(
            endpoint,
            connect_timeout,
            shared.clone(),
            rx_out,
            events,
        ));

        Self {
            handle: ConnectionHandle { shared, outbound },
            task: Some(task),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Tears the connection down without emitting further events.
    pub async fn close(mut self) {
        self.handle.shared.fail();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn send(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::NotConnected);
        }
        self.outbound
            .send(text)
            .map_err(|_| ConnectionError::NotConnected)
    }
}

impl FrameSink for ConnectionHandle {
    fn send_frame(&mut self, frame: String) -> Result<(), ConnectionError> {
        self.send(frame)
    }
}

async fn drive_connection(
    endpoint: String,
    connect_timeout: Duration,
    shared: Arc<Shared>,
    rx_out: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    debug!(target: "codebox::transport", %endpoint, ?connect_timeout, "connecting");
    let connect = connect_async(endpoint.as_str());
    let ws_stream = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            warn!(target: "codebox::transport", %endpoint, error = %err, "connection failed");
            let reason = err.to_string();
            let _ = events.send(ConnectionEvent::Errored(reason.clone()));
            report_failure(&shared, &events, FailureCause::Error(reason));
            return;
        }
        Err(_) => {
            warn!(
                target: "codebox::transport",
                %endpoint,
                ?connect_timeout,
                "connection timed out"
            );
            let _ = events.send(ConnectionEvent::TimedOut);
            report_failure(&shared, &events, FailureCause::Timeout);
            return;
        }
    };

    shared.set_open();
    info!(target: "codebox::transport", %endpoint, "connection established");
    let _ = events.send(ConnectionEvent::Opened);

    let cause = pump_frames(ws_stream, rx_out, &events).await;
    let _ = events.send(ConnectionEvent::Closed);
    report_failure(&shared, &events, cause);
}

fn report_failure(
    shared: &Shared,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    cause: FailureCause,
) {
    if shared.fail() {
        let _ = events.send(ConnectionEvent::Failed(cause));
    }
}

/// Runs until the socket closes or errors; returns why it stopped.
async fn pump_frames(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> FailureCause {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx_out.recv().await {
            trace!(target: "codebox::transport", frame = %frame, "send");
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut cause = FailureCause::Closed;
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                trace!(target: "codebox::transport", frame = %text, "recv");
                let _ = events.send(ConnectionEvent::Message(text));
            }
            Ok(Message::Binary(data)) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                let _ = events.send(ConnectionEvent::Message(text));
            }
            Ok(Message::Close(frame)) => {
                debug!(target: "codebox::transport", ?frame, "server closed connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "codebox::transport", error = %err, "connection error");
                let reason = err.to_string();
                let _ = events.send(ConnectionEvent::Errored(reason.clone()));
                cause = FailureCause::Error(reason);
                break;
            }
        }
    }

    send_task.abort();
    let _ = send_task.await;
    cause
}
