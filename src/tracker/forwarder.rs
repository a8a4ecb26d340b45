use std::fmt;
use std::sync::Arc;

use crate::tracker::error::TrackerResult;
use crate::tracker::queue::{CommandQueue, QueueEntry};
use crate::tracker::value::Arg;
use crate::tracker::LOGGER;

/// Appends fire-and-forget `[method, ...args]` commands to the queue.
///
/// Nothing is validated: names and arguments reach the tracker script exactly as given.
#[derive(Clone)]
pub struct CommandForwarder {
    queue: Arc<dyn CommandQueue>,
}

impl fmt::Debug for CommandForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandForwarder")
            .field("queue", &self.queue.name())
            .finish()
    }
}

impl CommandForwarder {
    pub fn new(queue: Arc<dyn CommandQueue>) -> Self {
        Self { queue }
    }

    /// Queues `method` with `args`. Fails with `tracker/missing-runtime` when the queue is gone.
    pub fn forward(&self, method: &str, args: Vec<Arg>) -> TrackerResult<()> {
        LOGGER.debug(format!(
            "queueing `{method}` on `{}` with {} argument(s)",
            self.queue.name(),
            args.len()
        ));
        self.queue.push(QueueEntry::method(method, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::error::{missing_runtime, TrackerErrorCode};
    use crate::tracker::queue::RecordingQueue;

    struct AbsentQueue;

    impl CommandQueue for AbsentQueue {
        fn is_available(&self) -> bool {
            false
        }

        fn push(&self, _entry: QueueEntry) -> TrackerResult<()> {
            Err(missing_runtime(self.name()))
        }
    }

    #[test]
    fn forwards_bare_command() {
        let queue = Arc::new(RecordingQueue::new());
        let forwarder = CommandForwarder::new(queue.clone());

        forwarder.forward("trackPageView", Vec::new()).unwrap();

        assert_eq!(
            queue.method_calls(),
            vec![("trackPageView".to_string(), Vec::new())]
        );
    }

    #[test]
    fn forwards_arguments_in_order() {
        let queue = Arc::new(RecordingQueue::new());
        let forwarder = CommandForwarder::new(queue.clone());

        forwarder
            .forward(
                "setCustomVariable",
                vec![
                    Arg::from(1),
                    Arg::from("name"),
                    Arg::from("val"),
                    Arg::from("visit"),
                ],
            )
            .unwrap();

        let calls = queue.method_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "setCustomVariable");
        assert_eq!(
            calls[0].1,
            vec![
                Arg::Int(1),
                Arg::Str("name".into()),
                Arg::Str("val".into()),
                Arg::Str("visit".into()),
            ]
        );
    }

    #[test]
    fn absent_queue_is_reported() {
        let forwarder = CommandForwarder::new(Arc::new(AbsentQueue));
        let err = forwarder.forward("ping", Vec::new()).unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::MissingRuntime);
    }
}
