//! Command queue data structures.
//!
//! Items carry a command mnemonic (or a local pseudo-command starting with
//! `_`), ordered scalar arguments, placement and skip flags, and an optional
//! completion channel. Dedup equality is `(name, args)`; placement flags are
//! ignored.
//!
//! `CommandQueue` keeps one FIFO queue per `queue_id`; the active queue is
//! the lowest-id non-empty one. Skip rules are evaluated at enqueue time
//! against the session context ([`SkipContext`]), including the item the
//! executor is currently running.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tokio::sync::oneshot;
use tracing::debug;

use pioneer_api::Zone;

use crate::error::SessionError;

/// A scalar command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Zone(Zone),
    Int(i64),
    Float(f64),
    Str(String),
}

impl CommandArg {
    /// Render the argument for wire transmission.
    pub fn render(&self) -> String {
        match self {
            CommandArg::Zone(zone) => zone.code().to_string(),
            CommandArg::Int(value) => value.to_string(),
            CommandArg::Float(value) => value.to_string(),
            CommandArg::Str(value) => value.clone(),
        }
    }
}

impl From<Zone> for CommandArg {
    fn from(zone: Zone) -> Self {
        CommandArg::Zone(zone)
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        CommandArg::Int(value)
    }
}

impl From<f64> for CommandArg {
    fn from(value: f64) -> Self {
        CommandArg::Float(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Str(value.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        CommandArg::Str(value)
    }
}

/// Result of executing one command item.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Fire-and-forget command was written.
    Ack,
    /// The expected response arrived; carries the frame suffix.
    Response(String),
}

pub(crate) type Completion = oneshot::Sender<Result<CommandOutcome, SessionError>>;

/// An intent to act, queued for the executor.
#[derive(Debug)]
pub struct CommandItem {
    pub name: String,
    pub args: Vec<CommandArg>,
    pub queue_id: usize,
    /// Insert position; negative counts from the tail (`-1` appends).
    pub insert_at: isize,
    pub skip_if_starting: Option<bool>,
    pub skip_if_queued: Option<bool>,
    pub skip_if_refreshing: Option<bool>,
    pub(crate) completion: Option<Completion>,
}

impl PartialEq for CommandItem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl CommandItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            queue_id: 0,
            insert_at: -1,
            skip_if_starting: None,
            skip_if_queued: None,
            skip_if_refreshing: None,
            completion: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<CommandArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn queue(mut self, queue_id: usize) -> Self {
        self.queue_id = queue_id;
        self
    }

    pub fn insert_at(mut self, position: isize) -> Self {
        self.insert_at = position;
        self
    }

    pub fn skip_if_starting(mut self, skip: bool) -> Self {
        self.skip_if_starting = Some(skip);
        self
    }

    pub fn skip_if_queued(mut self, skip: bool) -> Self {
        self.skip_if_queued = Some(skip);
        self
    }

    pub fn skip_if_refreshing(mut self, skip: bool) -> Self {
        self.skip_if_refreshing = Some(skip);
        self
    }

    /// Local pseudo-commands start with `_` and never hit the wire.
    pub fn is_local(&self) -> bool {
        self.name.starts_with('_')
    }

    /// First zone argument, if any.
    pub fn zone_arg(&self) -> Option<Zone> {
        self.args.iter().find_map(|arg| match arg {
            CommandArg::Zone(zone) => Some(*zone),
            _ => None,
        })
    }

    /// First numeric argument, if any.
    pub fn float_arg(&self) -> Option<f64> {
        self.args.iter().find_map(|arg| match arg {
            CommandArg::Float(value) => Some(*value),
            CommandArg::Int(value) => Some(*value as f64),
            _ => None,
        })
    }

    /// Rendered non-zone arguments, concatenated into the wire prefix.
    pub fn wire_prefix(&self) -> String {
        self.args
            .iter()
            .filter(|arg| !matches!(arg, CommandArg::Zone(_)))
            .map(CommandArg::render)
            .collect()
    }

    /// Attach a completion channel and return its receiver.
    pub(crate) fn with_completion(
        mut self,
    ) -> (Self, oneshot::Receiver<Result<CommandOutcome, SessionError>>) {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        (self, rx)
    }

    /// Dedup identity: `(name, args)`.
    pub(crate) fn identity(&self) -> (String, Vec<CommandArg>) {
        (self.name.clone(), self.args.clone())
    }
}

/// Enqueue-time context for skip-rule evaluation.
pub(crate) struct SkipContext<'a> {
    pub starting: bool,
    pub refreshing: &'a HashSet<Zone>,
    pub executing: Option<&'a (String, Vec<CommandArg>)>,
}

pub(crate) enum EnqueueOutcome {
    Queued,
    Skipped(&'static str),
}

/// Multi-queue FIFO keyed by `queue_id`.
#[derive(Default)]
pub(crate) struct CommandQueue {
    queues: BTreeMap<usize, VecDeque<CommandItem>>,
}

impl CommandQueue {
    pub fn contains(&self, item: &CommandItem) -> bool {
        self.queues
            .values()
            .any(|queue| queue.iter().any(|queued| queued == item))
    }

    /// Evaluate skip rules and insert the item.
    pub fn enqueue(&mut self, item: CommandItem, ctx: &SkipContext<'_>) -> EnqueueOutcome {
        if item.skip_if_starting == Some(true) && ctx.starting {
            return EnqueueOutcome::Skipped("session starting");
        }
        if item.skip_if_queued == Some(true) {
            let executing_matches = ctx
                .executing
                .map(|(name, args)| *name == item.name && *args == item.args)
                .unwrap_or(false);
            if executing_matches || self.contains(&item) {
                return EnqueueOutcome::Skipped("already queued");
            }
        }
        if item.skip_if_refreshing == Some(true) {
            if let Some(zone) = item.zone_arg() {
                if ctx.refreshing.contains(&zone) {
                    return EnqueueOutcome::Skipped("refresh pending");
                }
            }
        }

        let queue = self.queues.entry(item.queue_id).or_default();
        let len = queue.len() as isize;
        let position = if item.insert_at < 0 {
            (len + 1 + item.insert_at).clamp(0, len)
        } else {
            item.insert_at.min(len)
        };
        debug!("queuing {} at {position} in queue {}", item.name, item.queue_id);
        queue.insert(position as usize, item);
        EnqueueOutcome::Queued
    }

    /// Index of the active (lowest-id non-empty) queue.
    pub fn active_queue(&self) -> Option<usize> {
        self.queues
            .iter()
            .find(|(_, queue)| !queue.is_empty())
            .map(|(id, _)| *id)
    }

    /// Pop the head of the active queue.
    pub fn pop(&mut self) -> Option<CommandItem> {
        let id = self.active_queue()?;
        self.queues.get_mut(&id)?.pop_front()
    }

    /// Peek into a queue (or the active queue) at a position.
    pub fn peek(&self, queue_id: Option<usize>, position: usize) -> Option<&CommandItem> {
        let id = match queue_id {
            Some(id) => id,
            None => self.active_queue()?,
        };
        self.queues.get(&id)?.get(position)
    }

    /// Drain every queue, returning the dropped items.
    pub fn purge(&mut self) -> Vec<CommandItem> {
        self.queues
            .values_mut()
            .flat_map(|queue| queue.drain(..))
            .collect()
    }

    /// Names of all queued commands, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.queues
            .values()
            .flat_map(|queue| queue.iter().map(|item| item.name.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(refreshing: &'a HashSet<Zone>) -> SkipContext<'a> {
        SkipContext {
            starting: false,
            refreshing,
            executing: None,
        }
    }

    #[test]
    fn test_fifo_order_within_queue() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(CommandItem::new("a"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("b"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("c"), &ctx(&refreshing));
        assert_eq!(queue.commands(), vec!["a", "b", "c"]);
        assert_eq!(queue.pop().unwrap().name, "a");
        assert_eq!(queue.pop().unwrap().name, "b");
    }

    #[test]
    fn test_lowest_queue_id_is_active() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(CommandItem::new("delayed").queue(1), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("main"), &ctx(&refreshing));
        assert_eq!(queue.active_queue(), Some(0));
        assert_eq!(queue.pop().unwrap().name, "main");
        assert_eq!(queue.active_queue(), Some(1));
        assert_eq!(queue.pop().unwrap().name, "delayed");
    }

    #[test]
    fn test_insert_at_head() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(CommandItem::new("a"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("b"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("up").insert_at(0), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("down").insert_at(1), &ctx(&refreshing));
        assert_eq!(queue.commands(), vec!["up", "down", "a", "b"]);
    }

    #[test]
    fn test_negative_insert_appends() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(CommandItem::new("a"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("b").insert_at(-1), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("c").insert_at(-2), &ctx(&refreshing));
        assert_eq!(queue.commands(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_skip_if_queued_leaves_length_unchanged() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(
            CommandItem::new("_refresh_zone").arg(Zone::Zone2),
            &ctx(&refreshing),
        );
        let outcome = queue.enqueue(
            CommandItem::new("_refresh_zone")
                .arg(Zone::Zone2)
                .skip_if_queued(true),
            &ctx(&refreshing),
        );
        assert!(matches!(outcome, EnqueueOutcome::Skipped(_)));
        assert_eq!(queue.len(), 1);

        // Different args are a different item.
        let outcome = queue.enqueue(
            CommandItem::new("_refresh_zone")
                .arg(Zone::Zone3)
                .skip_if_queued(true),
            &ctx(&refreshing),
        );
        assert!(matches!(outcome, EnqueueOutcome::Queued));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_skip_if_queued_checks_executing_item() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        let executing = ("turn_on".to_string(), vec![CommandArg::Zone(Zone::Main)]);
        let ctx = SkipContext {
            starting: false,
            refreshing: &refreshing,
            executing: Some(&executing),
        };
        let outcome = queue.enqueue(
            CommandItem::new("turn_on").arg(Zone::Main).skip_if_queued(true),
            &ctx,
        );
        assert!(matches!(outcome, EnqueueOutcome::Skipped(_)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_skip_if_starting() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        let ctx = SkipContext {
            starting: true,
            refreshing: &refreshing,
            executing: None,
        };
        let outcome = queue.enqueue(CommandItem::new("turn_on").skip_if_starting(true), &ctx);
        assert!(matches!(outcome, EnqueueOutcome::Skipped(_)));
        let outcome = queue.enqueue(CommandItem::new("turn_on"), &ctx);
        assert!(matches!(outcome, EnqueueOutcome::Queued));
    }

    #[test]
    fn test_skip_if_refreshing() {
        let mut queue = CommandQueue::default();
        let mut refreshing = HashSet::new();
        refreshing.insert(Zone::Zone2);
        let outcome = queue.enqueue(
            CommandItem::new("_delayed_refresh_zone")
                .arg(Zone::Zone2)
                .skip_if_refreshing(true),
            &ctx(&refreshing),
        );
        assert!(matches!(outcome, EnqueueOutcome::Skipped(_)));

        let outcome = queue.enqueue(
            CommandItem::new("_delayed_refresh_zone")
                .arg(Zone::Zone3)
                .skip_if_refreshing(true),
            &ctx(&refreshing),
        );
        assert!(matches!(outcome, EnqueueOutcome::Queued));
    }

    #[test]
    fn test_purge_returns_items() {
        let mut queue = CommandQueue::default();
        let refreshing = HashSet::new();
        queue.enqueue(CommandItem::new("a"), &ctx(&refreshing));
        queue.enqueue(CommandItem::new("b").queue(1), &ctx(&refreshing));
        let items = queue.purge();
        assert_eq!(items.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wire_prefix_rendering() {
        let item = CommandItem::new("set_volume_level")
            .arg(Zone::Zone2)
            .arg("081");
        assert_eq!(item.zone_arg(), Some(Zone::Zone2));
        assert_eq!(item.wire_prefix(), "081");

        let item = CommandItem::new("_sleep").arg(2.5);
        assert_eq!(item.float_arg(), Some(2.5));
    }
}
