//! Response correlator.
//!
//! The AVR shares one inbound stream between solicited responses and
//! unsolicited status updates, and does not echo request identifiers. The
//! responder keeps the outstanding waiters in FIFO order and fulfils the
//! first one whose expected prefix matches an inbound frame. Error frames
//! (`E01`..`E06`) fulfil the oldest waiter, since they carry no prefix at
//! all.
//!
//! The command scheduler guarantees at most one outstanding waiter per
//! prefix, which keeps prefix correlation unambiguous.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::warn;

use pioneer_api::ErrorCode;

/// How a waiter was fulfilled.
#[derive(Debug)]
pub(crate) enum WaiterOutcome {
    /// A frame matched the expected prefix; carries the frame suffix.
    Response(String),
    /// The AVR answered with an error frame.
    Device(ErrorCode),
    /// The connection dropped while the request was outstanding.
    Disconnected,
}

struct Waiter {
    prefix: String,
    tx: oneshot::Sender<WaiterOutcome>,
}

#[derive(Default)]
pub(crate) struct Responder {
    waiters: Mutex<VecDeque<Waiter>>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for a response prefix. The waiter is removed when
    /// fulfilled, or lazily when its receiver is dropped (timeout).
    pub fn register(&self, prefix: &str) -> oneshot::Receiver<WaiterOutcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().push_back(Waiter {
            prefix: prefix.to_string(),
            tx,
        });
        rx
    }

    /// Offer an inbound frame to the outstanding waiters. Returns true when
    /// the frame was consumed by a waiter (error frames always are, unless
    /// nothing is outstanding).
    pub fn offer(&self, frame: &str) -> bool {
        let mut waiters = self.waiters.lock().unwrap();
        // Waiters whose request timed out have a dropped receiver.
        waiters.retain(|waiter| !waiter.tx.is_closed());

        if let Some(code) = ErrorCode::parse(frame) {
            if let Some(pos) = waiters.iter().position(|waiter| !waiter.prefix.is_empty()) {
                if let Some(waiter) = waiters.remove(pos) {
                    let _ = waiter.tx.send(WaiterOutcome::Device(code));
                }
            } else {
                warn!("unexpected AVR error: {code}");
            }
            return true;
        }

        if let Some(pos) = waiters
            .iter()
            .position(|waiter| !waiter.prefix.is_empty() && frame.starts_with(waiter.prefix.as_str()))
        {
            if let Some(waiter) = waiters.remove(pos) {
                let suffix = frame[waiter.prefix.len()..].to_string();
                let _ = waiter.tx.send(WaiterOutcome::Response(suffix));
                return true;
            }
        }
        false
    }

    /// Fail every outstanding waiter with [`WaiterOutcome::Disconnected`].
    pub fn fail_all(&self) {
        let mut waiters = self.waiters.lock().unwrap();
        for waiter in waiters.drain(..) {
            let _ = waiter.tx.send(WaiterOutcome::Disconnected);
        }
    }

    /// Drop every outstanding waiter without an outcome (receivers observe
    /// a closed channel).
    pub fn clear(&self) {
        self.waiters.lock().unwrap().clear();
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match_delivers_suffix() {
        let responder = Responder::new();
        let rx = responder.register("VOL");
        assert!(responder.offer("VOL121"));
        match rx.blocking_recv().unwrap() {
            WaiterOutcome::Response(suffix) => assert_eq!(suffix, "121"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(responder.pending(), 0);
    }

    #[test]
    fn test_earliest_matching_waiter_wins() {
        let responder = Responder::new();
        let first = responder.register("PWR");
        let second = responder.register("PWR");
        assert!(responder.offer("PWR0"));
        assert!(matches!(
            first.blocking_recv().unwrap(),
            WaiterOutcome::Response(_)
        ));
        // The second waiter is still outstanding.
        assert_eq!(responder.pending(), 1);
        drop(second);
    }

    #[test]
    fn test_non_matching_frame_left_for_decoders() {
        let responder = Responder::new();
        let _rx = responder.register("VOL");
        assert!(!responder.offer("FN19"));
        assert_eq!(responder.pending(), 1);
    }

    #[test]
    fn test_error_frame_fails_oldest_waiter() {
        let responder = Responder::new();
        let first = responder.register("FN");
        let second = responder.register("VOL");
        assert!(responder.offer("E02"));
        assert!(matches!(
            first.blocking_recv().unwrap(),
            WaiterOutcome::Device(ErrorCode::E02)
        ));
        assert_eq!(responder.pending(), 1);
        drop(second);
    }

    #[test]
    fn test_error_frame_without_waiters_is_logged() {
        let responder = Responder::new();
        assert!(responder.offer("E04"));
    }

    #[test]
    fn test_timed_out_waiter_is_skipped() {
        let responder = Responder::new();
        let rx = responder.register("VOL");
        drop(rx); // request timed out, receiver gone
        let live = responder.register("VOL");
        assert!(responder.offer("VOL050"));
        match live.blocking_recv().unwrap() {
            WaiterOutcome::Response(suffix) => assert_eq!(suffix, "050"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_fail_all() {
        let responder = Responder::new();
        let rx = responder.register("VOL");
        responder.fail_all();
        assert!(matches!(
            rx.blocking_recv().unwrap(),
            WaiterOutcome::Disconnected
        ));
    }
}
