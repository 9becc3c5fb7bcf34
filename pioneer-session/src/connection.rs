//! TCP connection: session state machine, framing and the write path.
//!
//! The connection owns the write half of the socket and the session state.
//! The read half is handed to the reader task on dial; reconnection policy
//! lives in the session orchestrator.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// OS TCP keepalive idle time before probes start.
const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

/// Cap on the reconnect backoff schedule (1 s, 2 s, 4 s, ...).
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(64);

/// Session lifecycle states.
///
/// `Shutdown` is terminal: every subsequent operation fails with
/// [`SessionError::Unavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Connected, waiting for the first basic query round to succeed.
    Starting,
    Ready,
    Disconnecting,
    Reconnecting,
    Shutdown,
}

impl SessionState {
    /// Whether commands may be written in this state.
    pub fn can_send(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

pub(crate) struct Connection {
    state_tx: watch::Sender<SessionState>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    last_sent: StdMutex<Option<Instant>>,
    last_received: StdMutex<Option<Instant>>,
    reconnect: AtomicBool,
}

impl Connection {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            state_tx,
            writer: Mutex::new(None),
            last_sent: StdMutex::new(None),
            last_received: StdMutex::new(None),
            reconnect: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn set_state(&self, next: SessionState) {
        let current = self.state();
        if current != next {
            debug!("session state: {current} -> {next}");
            let _ = self.state_tx.send_replace(next);
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn available(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn can_send(&self) -> bool {
        self.state().can_send()
    }

    pub fn set_reconnect(&self, enabled: bool) {
        self.reconnect.store(enabled, Ordering::SeqCst);
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }

    /// Exponential reconnect backoff: 1 s, 2 s, 4 s, ... capped at 64 s.
    pub fn backoff(attempt: u32) -> Duration {
        let delay = Duration::from_secs(1 << attempt.min(6));
        delay.min(RECONNECT_DELAY_MAX)
    }

    /// Dial the AVR, enable TCP keepalive and install the write half.
    /// Returns the read half for the reader task.
    pub async fn dial(&self, host: &str, port: u16, timeout: Duration) -> Result<OwnedReadHalf> {
        let addr = format!("{host}:{port}");
        debug!("opening AVR connection to {addr}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SessionError::ConnectionFailed(format!("timed out connecting to {addr}")))?
            .map_err(|err| SessionError::ConnectionFailed(err.to_string()))?;
        Self::set_keepalive(&stream, timeout);
        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        *self.last_sent.lock().unwrap() = None;
        *self.last_received.lock().unwrap() = None;
        info!("AVR connection established to {addr}");
        Ok(read_half)
    }

    fn set_keepalive(stream: &TcpStream, interval: Duration) {
        let keepalive = TcpKeepalive::new()
            .with_time(KEEPALIVE_IDLE)
            .with_interval(interval.max(Duration::from_secs(1)));
        if let Err(err) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
            warn!("could not set TCP keepalive: {err}");
        }
    }

    /// Write one frame (`\r\n` terminated). With `rate_limit` set, waits
    /// until the command delay has elapsed since the previous frame.
    pub async fn send_frame(&self, frame: &str, rate_limit: Option<Duration>) -> Result<()> {
        if let Some(delay) = rate_limit {
            let wait = {
                let last_sent = self.last_sent.lock().unwrap();
                last_sent.and_then(|at| delay.checked_sub(at.elapsed()))
            };
            if let Some(wait) = wait {
                debug!("delaying command for {wait:?}");
                tokio::time::sleep(wait).await;
            }
        }

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(SessionError::Unavailable);
        };
        debug!("sending command: {frame}");
        let mut data = Vec::with_capacity(frame.len() + 2);
        data.extend_from_slice(frame.as_bytes());
        data.extend_from_slice(b"\r\n");
        writer
            .write_all(&data)
            .await
            .map_err(|err| SessionError::ConnectionFailed(err.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|err| SessionError::ConnectionFailed(err.to_string()))?;
        *self.last_sent.lock().unwrap() = Some(Instant::now());
        Ok(())
    }

    /// Record inbound link activity (any frame, including keepalives).
    pub fn touch_received(&self) {
        *self.last_received.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_received(&self) -> Option<Instant> {
        *self.last_received.lock().unwrap()
    }

    /// Close the write half, if open.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            debug!("closing AVR connection");
            let _ = writer.shutdown().await;
        }
    }
}
