use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::tracker::constants::DEFAULT_QUEUE_NAME;
use crate::tracker::context::TrackerContext;
use crate::tracker::error::TrackerResult;
use crate::tracker::value::Arg;
use crate::tracker::LOGGER;

/// Closure queued by the async bridge. The queue runtime calls it with its tracker object.
pub type AccessorClosure = Box<dyn FnOnce(&dyn TrackerContext) + Send + 'static>;

/// A single command appended to the Matomo queue: `[name, ...args]` or `[closure]`.
pub enum QueueEntry {
    Method { name: String, args: Vec<Arg> },
    Closure(AccessorClosure),
}

impl QueueEntry {
    pub fn method(name: impl Into<String>, args: Vec<Arg>) -> Self {
        QueueEntry::Method {
            name: name.into(),
            args,
        }
    }

    pub fn method_name(&self) -> Option<&str> {
        match self {
            QueueEntry::Method { name, .. } => Some(name),
            QueueEntry::Closure(_) => None,
        }
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, QueueEntry::Closure(_))
    }

    /// Executes the entry the way the tracker script would.
    pub fn run(self, context: &dyn TrackerContext) -> TrackerResult<()> {
        match self {
            QueueEntry::Method { name, args } => context.apply(&name, &args),
            QueueEntry::Closure(closure) => {
                closure(context);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEntry::Method { name, args } => f
                .debug_struct("Method")
                .field("name", name)
                .field("args", args)
                .finish(),
            QueueEntry::Closure(_) => f.write_str("Closure(..)"),
        }
    }
}

/// The command queue the tracker script drains.
pub trait CommandQueue: Send + Sync {
    /// Name the queue is reachable under, used in error messages.
    fn name(&self) -> &str {
        DEFAULT_QUEUE_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn push(&self, entry: QueueEntry) -> TrackerResult<()>;

    /// Runs pending entries against `context` and returns how many ran.
    ///
    /// Queues drained by an external runtime, like the browser's `_paq`, run nothing here.
    fn drain(&self, _context: &dyn TrackerContext) -> usize {
        0
    }
}

/// In-memory FIFO queue.
///
/// Buffers commands until [`RecordingQueue::drain`] replays them against a tracker context, which
/// makes it both a test double and the native stand-in for the browser's `_paq` array.
#[derive(Default)]
pub struct RecordingQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
}

impl fmt::Debug for RecordingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingQueue")
            .field("entries", &*self.entries.lock().unwrap())
            .finish()
    }
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn closure_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.is_closure())
            .count()
    }

    /// Snapshot of the pending named commands, in queue order.
    pub fn method_calls(&self) -> Vec<(String, Vec<Arg>)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| match entry {
                QueueEntry::Method { name, args } => Some((name.clone(), args.clone())),
                QueueEntry::Closure(_) => None,
            })
            .collect()
    }

    /// Removes and returns every pending entry.
    pub fn take(&self) -> Vec<QueueEntry> {
        self.entries.lock().unwrap().drain(..).collect()
    }

    /// Discards every pending entry. Pending accessor requests complete with a dropped error.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Runs pending entries in FIFO order against `context` until the queue is empty and returns
    /// how many ran. Entries pushed while draining run in the same pass.
    pub fn drain(&self, context: &dyn TrackerContext) -> usize {
        let mut processed = 0;
        loop {
            // The lock is released before running so entries can enqueue follow-ups.
            let next = self.entries.lock().unwrap().pop_front();
            let Some(entry) = next else {
                return processed;
            };
            let label = entry.method_name().unwrap_or("<closure>").to_owned();
            if let Err(err) = entry.run(context) {
                LOGGER.debug(format!("tracker rejected `{label}`: {err}"));
            }
            processed += 1;
        }
    }
}

impl CommandQueue for RecordingQueue {
    fn push(&self, entry: QueueEntry) -> TrackerResult<()> {
        self.entries.lock().unwrap().push_back(entry);
        Ok(())
    }

    fn drain(&self, context: &dyn TrackerContext) -> usize {
        RecordingQueue::drain(self, context)
    }
}
