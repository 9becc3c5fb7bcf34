//! # pioneer-session
//!
//! The live session layer for a Pioneer AVR: a single persistent TCP
//! connection with automatic reconnect, a responder that correlates inbound
//! frames with outstanding requests by response prefix, a multi-queue
//! command scheduler with rate limiting and local pseudo-commands, and an
//! updater that drives periodic refreshes.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!  facade ──────▶ │ AvrSession    │◀────── updater task (timer + power watch)
//!                 │  command queue│
//!                 └──────┬────────┘
//!                        │ executor task (one frame in flight)
//!                        ▼
//!                 ┌───────────────┐   register waiter   ┌───────────┐
//!                 │ Connection    │◀────────────────────│ Responder │
//!                 │ writer + rate │                     │ (prefix   │
//!                 │ limiting      │    reader task ────▶│  match)   │
//!                 └───────────────┘     frames          └─────┬─────┘
//!                                                             │ decoders
//!                                                             ▼
//!                                                     property cache
//! ```
//!
//! The AVR does not echo request identifiers; the only correlation signal is
//! the response prefix. The executor and the raw-request path share one
//! request lock so at most one waiter per prefix (and one outbound frame) is
//! ever outstanding.

mod connection;
mod error;
mod queue;
mod responder;
mod session;
mod updater;

pub use connection::SessionState;
pub use error::{Result, SessionError};
pub use queue::{CommandArg, CommandItem, CommandOutcome};
pub use session::AvrSession;
