//! Test support: an in-process mock AVR speaking the line protocol.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Maps one received frame to zero or more reply frames.
pub type Script = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// A scripted AVR on a local TCP port. Accepts one client at a time and
/// keeps accepting, so reconnects land on the same instance.
pub struct MockAvr {
    addr: SocketAddr,
    received: Arc<StdMutex<Vec<String>>>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    _accept: tokio::task::JoinHandle<()>,
}

impl MockAvr {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let writer: Arc<Mutex<Option<OwnedWriteHalf>>> = Arc::new(Mutex::new(None));

        let accept = {
            let received = Arc::clone(&received);
            let writer = Arc::clone(&writer);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let (read_half, write_half) = stream.into_split();
                    *writer.lock().await = Some(write_half);
                    let mut lines = BufReader::new(read_half).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let frame = line.trim().to_string();
                        if frame.is_empty() {
                            continue;
                        }
                        received.lock().unwrap().push(frame.clone());
                        let replies = script(&frame);
                        let mut guard = writer.lock().await;
                        if let Some(write_half) = guard.as_mut() {
                            for reply in replies {
                                let _ = write_half
                                    .write_all(format!("{reply}\r\n").as_bytes())
                                    .await;
                            }
                            let _ = write_half.flush().await;
                        }
                    }
                }
            })
        };

        Self {
            addr,
            received,
            writer,
            _accept: accept,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// All frames received so far.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// How many times a frame was received.
    pub fn count(&self, frame: &str) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|received| received.as_str() == frame)
            .count()
    }

    /// Push an unsolicited frame to the connected client.
    pub async fn send(&self, frame: &str) {
        let mut guard = self.writer.lock().await;
        if let Some(write_half) = guard.as_mut() {
            let _ = write_half.write_all(format!("{frame}\r\n").as_bytes()).await;
            let _ = write_half.flush().await;
        }
    }

    /// Close the current client connection (the listener keeps accepting).
    pub async fn drop_connection(&self) {
        if let Some(mut write_half) = self.writer.lock().await.take() {
            let _ = write_half.shutdown().await;
        }
    }
}

/// Script for a single-zone AVR that is powered on, with fast errors for
/// everything it does not know.
pub fn single_zone_script() -> Script {
    Arc::new(|frame| match frame {
        "?P" => vec!["PWR0".to_string()],
        "?V" => vec!["VOL121".to_string()],
        "?M" => vec!["MUT1".to_string()],
        "?F" => vec!["FN19".to_string()],
        _ => vec!["E04".to_string()],
    })
}

/// Wait until `predicate` holds, polling every 10 ms, up to `timeout_ms`.
pub async fn wait_until(timeout_ms: u64, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    predicate()
}
