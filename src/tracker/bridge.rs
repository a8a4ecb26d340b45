//! Callback-to-future bridge for Matomo's read accessors.
//!
//! Matomo has no promise API: reading tracker state means queueing a function that the script
//! later calls with its tracker object. [`AsyncBridge::request`] queues such a closure and hands
//! back a [`PendingRequest`] that completes once the script gets to it.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::platform::runtime::{self, Timer};
use crate::tracker::context::TrackerContext;
use crate::tracker::error::{
    invalid_argument, request_dropped, timeout, unexpected_value, TrackerError, TrackerResult,
};
use crate::tracker::queue::{AccessorClosure, CommandQueue, QueueEntry};
use crate::tracker::value::Arg;
use crate::tracker::LOGGER;

/// Read operations exposed by the Matomo tracker object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Accessor {
    PiwikUrl,
    CurrentUrl,
    LinkTrackingTimer,
    VisitorId,
    VisitorInfo,
    AttributionInfo,
    AttributionCampaignName,
    AttributionCampaignKeyword,
    AttributionReferrerTimestamp,
    AttributionReferrerUrl,
    UserId,
    CustomVariable,
    CustomDimension,
    CrossDomainLinkingUrlParameter,
    EcommerceItems,
    HasCookies,
}

impl Accessor {
    pub const ALL: [Accessor; 16] = [
        Accessor::PiwikUrl,
        Accessor::CurrentUrl,
        Accessor::LinkTrackingTimer,
        Accessor::VisitorId,
        Accessor::VisitorInfo,
        Accessor::AttributionInfo,
        Accessor::AttributionCampaignName,
        Accessor::AttributionCampaignKeyword,
        Accessor::AttributionReferrerTimestamp,
        Accessor::AttributionReferrerUrl,
        Accessor::UserId,
        Accessor::CustomVariable,
        Accessor::CustomDimension,
        Accessor::CrossDomainLinkingUrlParameter,
        Accessor::EcommerceItems,
        Accessor::HasCookies,
    ];

    /// Name of the method on the Matomo tracker object.
    pub fn as_str(&self) -> &'static str {
        match self {
            Accessor::PiwikUrl => "getPiwikUrl",
            Accessor::CurrentUrl => "getCurrentUrl",
            Accessor::LinkTrackingTimer => "getLinkTrackingTimer",
            Accessor::VisitorId => "getVisitorId",
            Accessor::VisitorInfo => "getVisitorInfo",
            Accessor::AttributionInfo => "getAttributionInfo",
            Accessor::AttributionCampaignName => "getAttributionCampaignName",
            Accessor::AttributionCampaignKeyword => "getAttributionCampaignKeyword",
            Accessor::AttributionReferrerTimestamp => "getAttributionReferrerTimestamp",
            Accessor::AttributionReferrerUrl => "getAttributionReferrerUrl",
            Accessor::UserId => "getUserId",
            Accessor::CustomVariable => "getCustomVariable",
            Accessor::CustomDimension => "getCustomDimension",
            Accessor::CrossDomainLinkingUrlParameter => "getCrossDomainLinkingUrlParameter",
            Accessor::EcommerceItems => "getEcommerceItems",
            Accessor::HasCookies => "hasCookies",
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accessor {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Accessor::ALL
            .into_iter()
            .find(|accessor| accessor.as_str() == s)
            .ok_or_else(|| invalid_argument(format!("`{s}` is not a Matomo accessor")))
    }
}

/// Queues accessor closures and turns their callbacks into futures.
#[derive(Clone)]
pub struct AsyncBridge {
    queue: Arc<dyn CommandQueue>,
    timeout: Option<Duration>,
}

impl fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBridge")
            .field("queue", &self.queue.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AsyncBridge {
    /// `timeout` bounds how long a request waits for the tracker script; `None` waits forever.
    pub fn new(queue: Arc<dyn CommandQueue>, timeout: Option<Duration>) -> Self {
        Self { queue, timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Queues a call to `accessor` with `args` and returns a future for its result.
    ///
    /// The closure is queued immediately, before the future is first polled, and stays queued if
    /// the future is dropped. The result is decoded into `T` with serde.
    pub fn request<T>(&self, accessor: Accessor, args: Vec<Arg>) -> PendingRequest<T>
    where
        T: DeserializeOwned,
    {
        let (sender, receiver) = oneshot::channel::<TrackerResult<Value>>();
        let closure: AccessorClosure = Box::new(move |context: &dyn TrackerContext| {
            let _ = sender.send(context.invoke(accessor.as_str(), &args));
        });

        let state = match self.queue.push(QueueEntry::Closure(closure)) {
            Ok(()) => PendingState::Waiting {
                receiver,
                timeout: self.timeout,
                timer: None,
            },
            Err(err) => PendingState::Failed(err),
        };

        PendingRequest {
            accessor,
            state,
            _marker: PhantomData,
        }
    }
}

/// Future returned by [`AsyncBridge::request`].
///
/// Completes exactly once: with the decoded value, or with an error when the accessor fails, the
/// queued closure is discarded unrun, the timeout elapses, or the queue was missing.
#[must_use = "the accessor result is only observable by awaiting the request"]
pub struct PendingRequest<T> {
    accessor: Accessor,
    state: PendingState,
    _marker: PhantomData<fn() -> T>,
}

enum PendingState {
    Waiting {
        receiver: oneshot::Receiver<TrackerResult<Value>>,
        // Armed on the first pending poll, inside the executor that drives the request.
        timeout: Option<Duration>,
        timer: Option<Timer>,
    },
    Failed(TrackerError),
}

impl<T> PendingRequest<T> {
    pub fn accessor(&self) -> Accessor {
        self.accessor
    }
}

impl<T> fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            PendingState::Waiting { .. } => "pending",
            PendingState::Failed(_) => "failed",
        };
        f.debug_struct("PendingRequest")
            .field("accessor", &self.accessor)
            .field("state", &state)
            .finish()
    }
}

impl<T> Future for PendingRequest<T>
where
    T: DeserializeOwned,
{
    type Output = TrackerResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let accessor = this.accessor;
        let outcome = match &mut this.state {
            PendingState::Failed(err) => Err(err.clone()),
            PendingState::Waiting {
                receiver,
                timeout: pending_timeout,
                timer,
            } => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(Ok(value))) => decode(accessor, value),
                Poll::Ready(Ok(Err(err))) => Err(err),
                Poll::Ready(Err(oneshot::Canceled)) => Err(request_dropped(accessor.as_str())),
                Poll::Pending => {
                    if let Some(duration) = pending_timeout.take() {
                        *timer = runtime::timer(duration);
                        if timer.is_none() {
                            LOGGER.debug(format!(
                                "no timer available, `{accessor}` waits without a timeout"
                            ));
                        }
                    }
                    let expired = match timer {
                        Some(timer) => timer.as_mut().poll(cx).is_ready(),
                        None => false,
                    };
                    if !expired {
                        return Poll::Pending;
                    }
                    Err(timeout(accessor.as_str()))
                }
            },
        };

        if let Err(err) = &outcome {
            LOGGER.warn(format!("Matomo accessor `{accessor}` did not resolve: {err}"));
        }
        Poll::Ready(outcome)
    }
}

fn decode<T>(accessor: Accessor, value: Value) -> TrackerResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|err| unexpected_value(accessor.as_str(), err))
}
