//! Periodic refresh scheduler.
//!
//! Fires every `scan_interval`. With `always_poll` set a full refresh is
//! queued unconditionally; otherwise the refresh is suppressed whenever any
//! inbound frame (solicited or not, including empty keepalives) arrived
//! within the interval, and the timer re-arms `scan_interval` after the last
//! frame.
//!
//! The updater also watches the property firehose for zone power-on
//! transitions: each off→on transition queues one delayed basic query
//! (unless auto query is disabled) and, for zones that have not completed
//! their initial refresh, a delayed zone refresh.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::debug;

use pioneer_state::StateChange;

use crate::queue::CommandItem;
use crate::session::SessionInner;

/// Settle delay before the basic query that follows a power-on.
const POWER_ON_QUERY_DELAY: f64 = 2.5;

pub(crate) async fn run_updater(session: Arc<SessionInner>) {
    debug!("updater started");
    let mut changes = session.properties.subscribe_changes();
    let mut param_events = session.params.subscribe();
    let mut last_tick = Instant::now();

    loop {
        let interval = session.params.scan_interval();
        let always_poll = session.params.always_poll();

        if interval.is_zero() {
            // Periodic polling disabled; only react to events.
            tokio::select! {
                change = changes.recv() => {
                    if !handle_change(&session, change) {
                        break;
                    }
                }
                event = param_events.recv() => {
                    if matches!(event, Err(RecvError::Closed)) {
                        break;
                    }
                }
            }
            continue;
        }

        let base = if always_poll {
            last_tick
        } else {
            session
                .connection
                .last_received()
                .map_or(last_tick, |received| received.max(last_tick))
        };
        let deadline = base + interval;

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let quiet = session
                    .connection
                    .last_received()
                    .map_or(true, |received| received <= base);
                if always_poll || quiet {
                    debug!("scheduling full refresh");
                    session.enqueue_detached(
                        CommandItem::new("_full_refresh").skip_if_queued(true),
                    );
                    last_tick = Instant::now();
                }
                // A frame arrived while sleeping: recompute the deadline from
                // the latest activity on the next pass.
            }
            change = changes.recv() => {
                if !handle_change(&session, change) {
                    break;
                }
            }
            event = param_events.recv() => {
                // scan_interval/always_poll changes take effect on the next
                // pass; nothing to do beyond waking up.
                if matches!(event, Err(RecvError::Closed)) {
                    break;
                }
            }
        }
    }
    debug!("updater finished");
}

/// React to a property change. Returns false when the channel closed.
fn handle_change(
    session: &Arc<SessionInner>,
    change: std::result::Result<StateChange, RecvError>,
) -> bool {
    let change = match change {
        Ok(change) => change,
        Err(RecvError::Lagged(missed)) => {
            debug!("updater lagged {missed} state changes");
            return true;
        }
        Err(RecvError::Closed) => return false,
    };
    if let StateChange::PowerChanged {
        zone,
        on: true,
        was,
    } = change
    {
        if was == Some(false) && !session.params.disable_auto_query() {
            session.enqueue_detached(
                CommandItem::new("_delayed_query_basic")
                    .arg(POWER_ON_QUERY_DELAY)
                    .skip_if_queued(true),
            );
        }
        if !session.params.zones_initial_refresh().contains(&zone) {
            session.enqueue_detached(
                CommandItem::new("_delayed_refresh_zone")
                    .arg(zone)
                    .skip_if_queued(true)
                    .skip_if_refreshing(true),
            );
        }
    }
    true
}
