//! Session orchestrator.
//!
//! `AvrSession` ties the connection, responder, command queue and updater
//! together: it owns the background tasks (reader, executor, updater,
//! reconnect supervisor), executes queued commands one at a time, and runs
//! the refresh machinery the updater and facade drive.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pioneer_api::{query_commands, tables, ErrorCode, SOURCE_TUNER};
use pioneer_api::{TunerBand, Zone};
use pioneer_state::{AvrParams, AvrProperties, DecoderRegistry, ParamKey, ParamValue};

use crate::connection::{Connection, SessionState};
use crate::error::{Result, SessionError};
use crate::queue::{CommandArg, CommandItem, CommandOutcome, CommandQueue, EnqueueOutcome, SkipContext};
use crate::responder::{Responder, WaiterOutcome};

/// Delay before a zone refresh triggered by a power transition.
const DELAYED_REFRESH_DELAY: f64 = 2.5;

/// Queue used by delayed local commands.
const DELAYED_QUEUE: usize = 1;

type CompletionReceiver = oneshot::Receiver<Result<CommandOutcome>>;

struct QueueState {
    queue: CommandQueue,
    executing: Option<(String, Vec<CommandArg>)>,
    refresh_pending: HashSet<Zone>,
}

pub(crate) struct SessionInner {
    host: String,
    port: u16,
    pub(crate) params: AvrParams,
    pub(crate) properties: AvrProperties,
    registry: DecoderRegistry,
    pub(crate) connection: Connection,
    responder: Responder,
    queue_state: StdMutex<QueueState>,
    /// Serializes the executor with raw requests: one outbound frame and one
    /// waiter per prefix at a time.
    request_lock: Mutex<()>,
    work_notify: Notify,
    queue_idle_tx: watch::Sender<bool>,
    executor: StdMutex<Option<JoinHandle<()>>>,
    updater: StdMutex<Option<JoinHandle<()>>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    reconnector: StdMutex<Option<JoinHandle<()>>>,
}

/// Handle to a live (or connectable) AVR session.
#[derive(Clone)]
pub struct AvrSession {
    inner: Arc<SessionInner>,
}

impl AvrSession {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        params: AvrParams,
        properties: AvrProperties,
        registry: DecoderRegistry,
    ) -> Self {
        let (queue_idle_tx, _) = watch::channel(true);
        Self {
            inner: Arc::new(SessionInner {
                host: host.into(),
                port,
                params,
                properties,
                registry,
                connection: Connection::new(),
                responder: Responder::new(),
                queue_state: StdMutex::new(QueueState {
                    queue: CommandQueue::default(),
                    executing: None,
                    refresh_pending: HashSet::new(),
                }),
                request_lock: Mutex::new(()),
                work_notify: Notify::new(),
                queue_idle_tx,
                executor: StdMutex::new(None),
                updater: StdMutex::new(None),
                reader: StdMutex::new(None),
                reconnector: StdMutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.inner.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.connection.subscribe_state()
    }

    /// True only when the session is `Ready`.
    pub fn available(&self) -> bool {
        self.inner.connection.available()
    }

    /// Open the connection and start the session tasks.
    ///
    /// With `reconnect` disabled a failed dial is returned synchronously;
    /// with it enabled the reconnect supervisor takes over and `connect`
    /// returns `Ok`.
    pub async fn connect(&self, reconnect: bool) -> Result<()> {
        let inner = &self.inner;
        match inner.connection.state() {
            SessionState::Shutdown => return Err(SessionError::Unavailable),
            SessionState::Disconnected => {}
            _ => return Err(SessionError::AlreadyConnected),
        }
        inner.connection.set_reconnect(reconnect);
        inner.connection.set_state(SessionState::Connecting);
        match inner
            .connection
            .dial(&inner.host, inner.port, inner.params.timeout())
            .await
        {
            Ok(read_half) => {
                inner.start_tasks(read_half);
                let session = Arc::clone(inner);
                tokio::spawn(async move { session.run_startup().await });
                Ok(())
            }
            Err(err) => {
                inner.connection.set_state(SessionState::Disconnected);
                if reconnect {
                    warn!("initial connection failed, retrying: {err}");
                    inner.spawn_reconnect();
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Gracefully close the connection. `reconnect` updates the supervisor
    /// policy for future disconnections; `None` keeps the current policy.
    pub async fn disconnect(&self, reconnect: Option<bool>) {
        let inner = &self.inner;
        if let Some(flag) = reconnect {
            inner.connection.set_reconnect(flag);
        }
        if matches!(
            inner.connection.state(),
            SessionState::Disconnected | SessionState::Shutdown
        ) {
            // Still stop a pending reconnect supervisor.
            if !inner.connection.reconnect_enabled() {
                if let Some(handle) = inner.reconnector.lock().unwrap().take() {
                    handle.abort();
                }
            }
            return;
        }
        if let Some(handle) = inner.reconnector.lock().unwrap().take() {
            handle.abort();
        }
        let _ = inner.teardown(true).await;
        if inner.connection.reconnect_enabled() {
            inner.spawn_reconnect();
        }
    }

    /// Close the session permanently. Returns after the socket is closed and
    /// all background tasks have exited; further connects are refused.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.connection.set_reconnect(false);
        if let Some(handle) = inner.reconnector.lock().unwrap().take() {
            handle.abort();
            let _ = handle.await;
        }
        let handles = if matches!(
            inner.connection.state(),
            SessionState::Disconnected | SessionState::Shutdown
        ) {
            vec![]
        } else {
            inner.teardown(true).await
        };
        for handle in handles {
            let _ = handle.await;
        }
        inner.properties.clear_observers();
        inner.connection.set_state(SessionState::Shutdown);
        debug!("session shut down");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Send a command from the code table and await its outcome.
    pub async fn send_command(
        &self,
        command: &str,
        zone: Zone,
        prefix: &str,
        suffix: &str,
        rate_limit: bool,
    ) -> Result<CommandOutcome> {
        self.inner
            .send_command(command, zone, prefix, suffix, rate_limit)
            .await
    }

    /// Send a raw frame without awaiting any response.
    pub async fn send_raw_command(&self, command: &str, rate_limit: bool) -> Result<()> {
        if !self.inner.connection.can_send() {
            return Err(SessionError::Unavailable);
        }
        let delay = rate_limit.then(|| self.inner.params.command_delay());
        self.inner.send_frame_checked(command, delay).await
    }

    /// Send a raw frame and await the response matching `response_prefix`.
    pub async fn send_raw_request(
        &self,
        command: &str,
        response_prefix: &str,
        rate_limit: bool,
    ) -> Result<String> {
        self.inner
            .send_raw_request(command, response_prefix, rate_limit, command)
            .await
    }

    /// Queue a command item. Returns the completion receiver, or `None` when
    /// a skip rule dropped the item.
    pub fn enqueue(&self, item: CommandItem) -> Option<CompletionReceiver> {
        self.inner.enqueue_item(item, true)
    }

    /// Queue several items (no completion handles).
    pub fn extend(&self, items: impl IntoIterator<Item = CommandItem>) {
        for item in items {
            self.inner.enqueue_detached(item);
        }
    }

    /// Names of queued commands, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.inner.queue_state.lock().unwrap().queue.commands()
    }

    /// Index of the active command queue, if any queue is non-empty.
    pub fn active_queue(&self) -> Option<usize> {
        self.inner.queue_state.lock().unwrap().queue.active_queue()
    }

    /// Inspect a queued item (name and args) without removing it. With no
    /// `queue_id` the active queue is used.
    pub fn peek(
        &self,
        queue_id: Option<usize>,
        position: usize,
    ) -> Option<(String, Vec<CommandArg>)> {
        self.inner
            .queue_state
            .lock()
            .unwrap()
            .queue
            .peek(queue_id, position)
            .map(CommandItem::identity)
    }

    /// Remove the head of the active queue without executing it.
    pub fn pop(&self) -> Option<CommandItem> {
        self.inner.queue_state.lock().unwrap().queue.pop()
    }

    /// Drop all queued items without failing their completions.
    pub fn purge(&self) {
        let items = self.inner.queue_state.lock().unwrap().queue.purge();
        debug!("purged {} queued commands", items.len());
    }

    /// Start the executor if there is queued work.
    pub fn schedule(&self) {
        self.inner.schedule_queue();
    }

    /// Drop all queues and fail pending completions and the in-flight waiter
    /// with [`SessionError::Cancelled`].
    pub fn cancel(&self) {
        self.inner.cancel_queue();
    }

    /// Wait until the queues drain and the executor goes idle.
    pub async fn wait(&self) {
        self.inner.schedule_queue();
        let mut rx = self.inner.queue_idle_tx.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }

    /// Queue refresh items for the given zones (all zones by default).
    pub async fn refresh(&self, zones: Option<&[Zone]>, wait: bool) -> Result<()> {
        if !self.inner.connection.available() {
            return Err(SessionError::Unavailable);
        }
        let zones = match zones {
            Some(zones) => zones.to_vec(),
            None => self.inner.properties.zones(),
        };
        for zone in zones {
            self.inner.enqueue_detached(
                CommandItem::new("_refresh_zone").arg(zone).skip_if_queued(true),
            );
        }
        if wait {
            self.wait().await;
        }
        Ok(())
    }
}

impl SessionInner {
    // ------------------------------------------------------------------------
    // Task management
    // ------------------------------------------------------------------------

    fn start_tasks(self: &Arc<Self>, read_half: OwnedReadHalf) {
        self.params.clear_initial_refresh();
        self.connection.set_state(SessionState::Starting);
        let session = Arc::clone(self);
        *self.reader.lock().unwrap() = Some(tokio::spawn(run_reader(session, read_half)));
    }

    async fn run_startup(self: Arc<Self>) {
        match self.startup_probe().await {
            Ok(()) => self.mark_ready(),
            Err(err) => {
                warn!("session startup failed: {err}");
                if self.connection.state() == SessionState::Starting {
                    let _ = self.teardown(true).await;
                    if self.connection.reconnect_enabled() {
                        self.spawn_reconnect();
                    }
                }
            }
        }
    }

    /// The basic query round that promotes `Starting` to `Ready`. On the
    /// first connect this discovers the zones.
    async fn startup_probe(self: &Arc<Self>) -> Result<()> {
        if self.properties.zones().is_empty() {
            self.discover_zones().await
        } else {
            self.send_command("query_power", Zone::Main, "", "", true)
                .await
                .map(|_| ())
        }
    }

    /// Probe each zone with a power query (and a volume query unless
    /// volume checking is disabled). The Main zone must respond.
    async fn discover_zones(self: &Arc<Self>) -> Result<()> {
        info!("querying available zones on AVR");
        let ignored = self.params.ignored_zones();
        let check_volume = !self.params.ignore_volume_check();

        self.send_command("query_power", Zone::Main, "", "", true).await?;
        if check_volume {
            self.send_command("query_volume", Zone::Main, "", "", true).await?;
        }
        if !ignored.contains(&Zone::Main) {
            self.properties
                .add_zone(Zone::Main, self.params.max_volume(Zone::Main));
        }

        for zone in [Zone::Zone2, Zone::Zone3, Zone::HdZone] {
            if ignored.contains(&zone) {
                continue;
            }
            let mut present = match self.send_command("query_power", zone, "", "", true).await {
                Ok(_) => true,
                Err(SessionError::Device { .. } | SessionError::ResponseTimeout { .. }) => false,
                Err(err) => return Err(err),
            };
            if present && check_volume {
                present = matches!(
                    self.send_command("query_volume", zone, "", "", true).await,
                    Ok(_)
                );
            }
            if present {
                self.properties.add_zone(zone, self.params.max_volume(zone));
            }
        }
        Ok(())
    }

    fn mark_ready(self: &Arc<Self>) {
        self.connection.set_state(SessionState::Ready);
        info!("AVR session ready");
        let session = Arc::clone(self);
        *self.updater.lock().unwrap() = Some(tokio::spawn(crate::updater::run_updater(session)));
        self.enqueue_detached(CommandItem::new("_full_refresh").skip_if_queued(true));
    }

    /// Tear down tasks and the socket. Returns the task handles so callers
    /// that need to (shutdown) can await their exit.
    async fn teardown(&self, abort_reader: bool) -> Vec<JoinHandle<()>> {
        self.connection.set_state(SessionState::Disconnecting);
        let mut handles = Vec::new();
        if let Some(handle) = self.updater.lock().unwrap().take() {
            handle.abort();
            handles.push(handle);
        }
        // The executor exits on its own once the link drops; aborting it here
        // could lose the in-flight command's completion.
        if let Some(handle) = self.executor.lock().unwrap().take() {
            handles.push(handle);
        }
        let items = {
            let mut queue_state = self.queue_state.lock().unwrap();
            queue_state.refresh_pending.clear();
            queue_state.queue.purge()
        };
        for mut item in items {
            if let Some(tx) = item.completion.take() {
                let _ = tx.send(Err(SessionError::Cancelled));
            }
        }
        self.responder.fail_all();
        if let Some(handle) = self.reader.lock().unwrap().take() {
            if abort_reader {
                handle.abort();
            }
            handles.push(handle);
        }
        self.connection.close().await;
        let _ = self.queue_idle_tx.send_replace(true);
        self.connection.set_state(SessionState::Disconnected);
        info!("AVR connection closed");
        handles
    }

    /// Reader-observed (or write-observed) link failure.
    pub(crate) async fn on_connection_lost(self: &Arc<Self>) {
        if !matches!(
            self.connection.state(),
            SessionState::Starting | SessionState::Ready | SessionState::Connecting
        ) {
            return;
        }
        warn!("AVR connection lost");
        let _ = self.teardown(false).await;
        if self.connection.reconnect_enabled() {
            self.spawn_reconnect();
        }
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        let mut guard = self.reconnector.lock().unwrap();
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        self.connection.set_state(SessionState::Reconnecting);
        info!("reconnecting to AVR");
        let session = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { session.run_reconnect().await }));
    }

    async fn run_reconnect(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            let delay = Connection::backoff(attempt);
            debug!("waiting {delay:?} before reconnect attempt {}", attempt + 1);
            tokio::time::sleep(delay).await;
            if !self.connection.reconnect_enabled()
                || self.connection.state() == SessionState::Shutdown
            {
                break;
            }
            attempt += 1;
            self.connection.set_state(SessionState::Connecting);
            let read_half = match self
                .connection
                .dial(&self.host, self.port, self.params.timeout())
                .await
            {
                Ok(read_half) => read_half,
                Err(err) => {
                    debug!("could not reconnect to AVR: {err}");
                    self.connection.set_state(SessionState::Reconnecting);
                    continue;
                }
            };
            self.start_tasks(read_half);
            match self.startup_probe().await {
                Ok(()) => {
                    self.mark_ready();
                    break;
                }
                Err(err) => {
                    debug!("reconnect startup failed: {err}");
                    let _ = self.teardown(true).await;
                    self.connection.set_state(SessionState::Reconnecting);
                }
            }
        }
        debug!("reconnect supervisor finished");
    }

    // ------------------------------------------------------------------------
    // Frame handling
    // ------------------------------------------------------------------------

    /// Decode a frame into the property cache, then offer it to the
    /// outstanding waiters. Decoding first guarantees the cache reflects a
    /// response before the request that solicited it completes.
    fn handle_frame(&self, frame: &str) {
        if ErrorCode::parse(frame).is_none() {
            let zones = self.registry.dispatch(frame, &self.properties, &self.params);
            if !zones.is_empty() {
                self.properties.notify_zones(&zones);
            }
        }
        self.responder.offer(frame);
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    async fn send_frame_checked(
        self: &Arc<Self>,
        frame: &str,
        rate_limit: Option<Duration>,
    ) -> Result<()> {
        match self.connection.send_frame(frame, rate_limit).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if matches!(err, SessionError::ConnectionFailed(_)) {
                    // A broken write means the socket is gone.
                    let session = Arc::clone(self);
                    tokio::spawn(async move { session.on_connection_lost().await });
                }
                Err(err)
            }
        }
    }

    pub(crate) async fn send_command(
        self: &Arc<Self>,
        command: &str,
        zone: Zone,
        prefix: &str,
        suffix: &str,
        rate_limit: bool,
    ) -> Result<CommandOutcome> {
        let entry = pioneer_api::lookup(command, zone)?;
        let wire = format!("{prefix}{}{suffix}", entry.wire);
        match entry.response_prefix {
            Some(response_prefix) => self
                .send_raw_request(&wire, response_prefix, rate_limit, command)
                .await
                .map(CommandOutcome::Response),
            None => {
                if !self.connection.can_send() {
                    return Err(SessionError::Unavailable);
                }
                let delay = rate_limit.then(|| self.params.command_delay());
                self.send_frame_checked(&wire, delay).await?;
                Ok(CommandOutcome::Ack)
            }
        }
    }

    async fn send_raw_request(
        self: &Arc<Self>,
        command: &str,
        response_prefix: &str,
        rate_limit: bool,
        label: &str,
    ) -> Result<String> {
        if !self.connection.can_send() {
            return Err(SessionError::Unavailable);
        }
        // Requests keep the deadline in force when they were issued.
        let timeout = self.params.timeout();
        let delay = rate_limit.then(|| self.params.command_delay());

        let _guard = self.request_lock.lock().await;
        let rx = self.responder.register(response_prefix);
        self.send_frame_checked(command, delay).await?;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(SessionError::ResponseTimeout {
                command: label.to_string(),
            }),
            Ok(Err(_)) => Err(SessionError::Cancelled),
            Ok(Ok(WaiterOutcome::Response(suffix))) => Ok(suffix),
            Ok(Ok(WaiterOutcome::Device(code))) => Err(SessionError::Device {
                command: label.to_string(),
                code,
            }),
            Ok(Ok(WaiterOutcome::Disconnected)) => Err(SessionError::ConnectionFailed(
                "connection lost awaiting response".to_string(),
            )),
        }
    }

    /// Send a command ignoring device errors (refresh queries run against
    /// zones that may reject them, e.g. volume right after power-on).
    async fn send_ignore_device(self: &Arc<Self>, command: &str, zone: Zone) -> Result<()> {
        match self.send_command(command, zone, "", "", true).await {
            Ok(_) | Err(SessionError::Device { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    // ------------------------------------------------------------------------
    // Queue and executor
    // ------------------------------------------------------------------------

    /// Queue an item without a completion handle.
    pub(crate) fn enqueue_detached(self: &Arc<Self>, item: CommandItem) {
        let _ = self.enqueue_item(item, false);
    }

    pub(crate) fn enqueue_item(
        self: &Arc<Self>,
        item: CommandItem,
        with_completion: bool,
    ) -> Option<CompletionReceiver> {
        let (item, rx) = if with_completion {
            let (item, rx) = item.with_completion();
            (item, Some(rx))
        } else {
            (item, None)
        };
        let name = item.name.clone();
        let zone = item.zone_arg();
        let outcome = {
            let mut queue_state = self.queue_state.lock().unwrap();
            let starting = self.connection.state() == SessionState::Starting;
            let executing = queue_state.executing.clone();
            let refreshing = queue_state.refresh_pending.clone();
            let ctx = SkipContext {
                starting,
                refreshing: &refreshing,
                executing: executing.as_ref(),
            };
            let outcome = queue_state.queue.enqueue(item, &ctx);
            if matches!(outcome, EnqueueOutcome::Queued) {
                let _ = self.queue_idle_tx.send_replace(false);
                if name == "_delayed_refresh_zone" {
                    if let Some(zone) = zone {
                        queue_state.refresh_pending.insert(zone);
                    }
                }
            }
            outcome
        };
        match outcome {
            EnqueueOutcome::Queued => {
                self.work_notify.notify_one();
                self.schedule_queue();
                rx
            }
            EnqueueOutcome::Skipped(reason) => {
                debug!("{name} not queued: {reason}");
                None
            }
        }
    }

    pub(crate) fn schedule_queue(self: &Arc<Self>) {
        if !self.connection.can_send() {
            return;
        }
        if self.queue_state.lock().unwrap().queue.is_empty() {
            return;
        }
        let mut guard = self.executor.lock().unwrap();
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        let session = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { session.run_executor().await }));
    }

    async fn run_executor(self: Arc<Self>) {
        debug!("command queue executor started");
        loop {
            if !self.connection.can_send() {
                break;
            }
            let item = {
                let mut queue_state = self.queue_state.lock().unwrap();
                match queue_state.queue.pop() {
                    Some(item) => {
                        queue_state.executing = Some(item.identity());
                        let _ = self.queue_idle_tx.send_replace(false);
                        Some(item)
                    }
                    None => {
                        // Empty and nothing executing: idle, still under the
                        // queue lock so enqueues cannot interleave.
                        queue_state.executing = None;
                        let _ = self.queue_idle_tx.send_replace(true);
                        None
                    }
                }
            };
            let Some(mut item) = item else {
                // Park until new work arrives or the session stops.
                let mut state_rx = self.connection.subscribe_state();
                tokio::select! {
                    _ = self.work_notify.notified() => continue,
                    _ = state_rx.wait_for(|state| !state.can_send()) => break,
                }
            };
            debug!("command queue executing: {}", item.name);
            let result = self.execute_item(&item).await;
            let fatal = matches!(
                result,
                Err(SessionError::Unavailable
                    | SessionError::ConnectionFailed(_)
                    | SessionError::Cancelled)
            );
            if let Err(err) = &result {
                warn!("command {} failed: {err}", item.name);
            }
            if let Some(tx) = item.completion.take() {
                let _ = tx.send(result);
            }
            self.queue_state.lock().unwrap().executing = None;
            if fatal {
                break;
            }
        }
        let _ = self.queue_idle_tx.send_replace(true);
        debug!("command queue executor finished");
    }

    async fn execute_item(self: &Arc<Self>, item: &CommandItem) -> Result<CommandOutcome> {
        if item.is_local() {
            self.execute_local(item).await?;
            return Ok(CommandOutcome::Ack);
        }
        let zone = item.zone_arg().unwrap_or(Zone::Main);
        let prefix = item.wire_prefix();
        self.send_command(&item.name, zone, &prefix, "", true).await
    }

    /// Sleep that aborts when the session leaves a sendable state, so queued
    /// delays never outlive the connection.
    async fn local_sleep(&self, duration: Duration) -> Result<()> {
        let mut state_rx = self.connection.subscribe_state();
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = state_rx.wait_for(|state| !state.can_send()) => Err(SessionError::Cancelled),
        }
    }

    async fn execute_local(self: &Arc<Self>, item: &CommandItem) -> Result<()> {
        match item.name.as_str() {
            "_sleep" => {
                let secs = item.float_arg().unwrap_or(0.0).max(0.0);
                self.local_sleep(Duration::from_secs_f64(secs)).await
            }
            "_full_refresh" => {
                for zone in self.properties.zones() {
                    self.refresh_zone(zone).await?;
                }
                Ok(())
            }
            "_refresh_zone" => {
                let Some(zone) = item.zone_arg() else {
                    return Err(SessionError::UnknownCommand(
                        pioneer_api::ApiError::UnknownCommand {
                            command: item.name.clone(),
                            zone: Zone::All,
                        },
                    ));
                };
                self.refresh_zone(zone).await
            }
            "_delayed_refresh_zone" => {
                let Some(zone) = item.zone_arg() else {
                    return Ok(());
                };
                self.enqueue_detached(
                    CommandItem::new("_sleep")
                        .arg(DELAYED_REFRESH_DELAY)
                        .queue(DELAYED_QUEUE),
                );
                self.enqueue_detached(
                    CommandItem::new("_refresh_zone")
                        .arg(zone)
                        .queue(DELAYED_QUEUE)
                        .skip_if_queued(true),
                );
                Ok(())
            }
            "_delayed_query_basic" => {
                if self.params.disable_auto_query() {
                    debug!("auto query disabled, skipping basic query");
                    return Ok(());
                }
                let delay = item.float_arg().unwrap_or(DELAYED_REFRESH_DELAY);
                self.enqueue_detached(
                    CommandItem::new("_sleep").arg(delay).queue(DELAYED_QUEUE),
                );
                self.enqueue_detached(
                    CommandItem::new("_query_basic")
                        .queue(DELAYED_QUEUE)
                        .skip_if_queued(true),
                );
                Ok(())
            }
            "_query_basic" => {
                for zone in self.properties.zones() {
                    self.send_ignore_device("query_power", zone).await?;
                    if self.properties.power(zone) == Some(true) {
                        self.send_ignore_device("query_volume", zone).await?;
                        self.send_ignore_device("query_mute", zone).await?;
                        self.send_ignore_device("query_source_id", zone).await?;
                    }
                }
                Ok(())
            }
            "_query_device_info" => {
                self.send_ignore_device("query_model", Zone::Main).await?;
                self.send_ignore_device("query_software_version", Zone::Main).await?;
                self.send_ignore_device("query_mac_addr", Zone::Main).await?;
                if let Some(model) = self.properties.model() {
                    if self.params.model().as_deref() != Some(model.as_str()) {
                        self.params.set_default_params_model(&model);
                    }
                }
                self.params.update_listening_modes();
                Ok(())
            }
            "_update_listening_modes" => {
                self.params.update_listening_modes();
                Ok(())
            }
            "_calculate_am_frequency_step" => self.calculate_am_step().await,
            other => Err(SessionError::UnknownCommand(
                pioneer_api::ApiError::UnknownCommand {
                    command: other.to_string(),
                    zone: Zone::All,
                },
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    async fn refresh_zone(self: &Arc<Self>, zone: Zone) -> Result<()> {
        self.queue_state.lock().unwrap().refresh_pending.remove(&zone);
        if !self.properties.has_zone(zone) {
            return Ok(());
        }
        debug!("refreshing {zone}");
        self.send_command("query_power", zone, "", "", true).await?;
        if self.properties.power(zone) != Some(true) {
            return Ok(());
        }
        for command in ["query_volume", "query_mute", "query_source_id"] {
            self.send_ignore_device(command, zone).await?;
        }

        if !self.params.disable_auto_query() {
            let enabled = self.params.enabled_functions();
            for (command, group, _) in query_commands(zone) {
                if matches!(
                    command,
                    "query_power" | "query_volume" | "query_mute" | "query_source_id"
                        | "query_source_name"
                ) {
                    continue;
                }
                if !enabled.iter().any(|function| function == group) {
                    continue;
                }
                match self.send_command(command, zone, "", "", true).await {
                    Ok(_)
                    | Err(SessionError::Device { .. } | SessionError::ResponseTimeout { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
            if zone == Zone::Main
                && enabled.iter().any(|function| function == "channels")
                && self.properties.power(Zone::Main) == Some(true)
            {
                for channel in tables::CHANNELS {
                    let prefix = format!("?{channel:_<3}");
                    match self
                        .send_command("set_channel_levels", Zone::Main, &prefix, "", true)
                        .await
                    {
                        Ok(_)
                        | Err(SessionError::Device { .. }
                        | SessionError::ResponseTimeout { .. }) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        if self.params.mark_zone_initial_refresh(zone) {
            info!("completed initial refresh for {zone}");
            if zone == Zone::Main {
                // Device information queries wait for Main's first refresh.
                self.enqueue_detached(
                    CommandItem::new("_query_device_info").skip_if_queued(true),
                );
            }
        }
        Ok(())
    }

    /// Measure the AM frequency step by stepping the frequency up and back.
    async fn calculate_am_step(self: &Arc<Self>) -> Result<()> {
        if self.params.am_frequency_step().is_some() {
            return Ok(());
        }
        let tuner_active = Zone::DEVICE_ZONES
            .iter()
            .any(|zone| self.properties.source_id(*zone).as_deref() == Some(SOURCE_TUNER));
        if !tuner_active || self.properties.tuner().band != Some(TunerBand::Am) {
            warn!("cannot calculate AM frequency step: tuner not active on AM");
            return Ok(());
        }

        self.send_ignore_device("query_tuner_am_step", Zone::Main).await?;
        if self.params.am_frequency_step().is_some() {
            return Ok(());
        }

        let start = self.properties.tuner().frequency;
        let mut current = start;
        let mut attempts = 3;
        while current == start && attempts > 0 {
            self.send_ignore_device("increase_tuner_frequency", Zone::Main).await?;
            current = self.properties.tuner().frequency;
            attempts -= 1;
        }
        match (start, current) {
            (Some(start), Some(current)) if current != start => {
                self.params.set_runtime_param(
                    ParamKey::AmFrequencyStep,
                    ParamValue::Float(current - start),
                );
                self.send_ignore_device("decrease_tuner_frequency", Zone::Main).await?;
            }
            _ => error!("cannot calculate AM frequency step: frequency did not move"),
        }
        Ok(())
    }

    fn cancel_queue(&self) {
        if let Some(handle) = self.executor.lock().unwrap().take() {
            handle.abort();
        }
        let items = {
            let mut queue_state = self.queue_state.lock().unwrap();
            queue_state.executing = None;
            queue_state.refresh_pending.clear();
            queue_state.queue.purge()
        };
        for mut item in items {
            if let Some(tx) = item.completion.take() {
                let _ = tx.send(Err(SessionError::Cancelled));
            }
        }
        self.responder.clear();
        let _ = self.queue_idle_tx.send_replace(true);
    }
}

/// Reader task: split the inbound stream into frames and hand them to the
/// responder and decoders. Any frame counts as link activity.
async fn run_reader(session: Arc<SessionInner>, read_half: OwnedReadHalf) {
    debug!("reader started");
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                session.connection.touch_received();
                let frame = line.trim();
                if frame.is_empty() {
                    continue;
                }
                debug!("received AVR response: {frame}");
                session.handle_frame(frame);
            }
            Ok(None) => {
                debug!("reader detected EOF");
                break;
            }
            Err(err) => {
                debug!("reader error: {err}");
                break;
            }
        }
    }
    if matches!(
        session.connection.state(),
        SessionState::Starting | SessionState::Ready
    ) {
        session.on_connection_lost().await;
    }
    debug!("reader finished");
}
