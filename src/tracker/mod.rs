//! Matomo tracker adapter.
//!
//! Matomo is driven through a global command queue (`_paq`): commands are pushed as
//! `[name, ...args]` and the tracker script applies them once loaded. [`MatomoTracker`] offers a
//! typed method per command on top of [`CommandForwarder`], and turns Matomo's getter-style
//! accessors into futures through [`AsyncBridge`].
//!
//! ```no_run
//! use matomo_rs_tracker::tracker::{InjectorConfig, MatomoInjector, MatomoTracker};
//!
//! # async fn demo() -> matomo_rs_tracker::tracker::error::TrackerResult<()> {
//! MatomoInjector::global().init(&InjectorConfig::new("https://stats.example.org", 1))?;
//!
//! let tracker = MatomoTracker::new();
//! tracker.track_event("Videos", "Play", Some("Intro"), None)?;
//! let visitor_id = tracker.get_visitor_id().await?;
//! # let _ = visitor_id;
//! # Ok(())
//! # }
//! ```

use std::sync::LazyLock;

use crate::logger::Logger;

mod api;
mod bridge;
mod constants;
mod context;
pub mod error;
mod forwarder;
mod global;
mod injector;
mod queue;
mod settings;
mod value;

pub use api::MatomoTracker;
pub use bridge::{Accessor, AsyncBridge, PendingRequest};
pub use constants::{
    DEFAULT_QUEUE_NAME, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCRIPT_NAME, DEFAULT_TRACKER_ENDPOINT,
};
pub use context::{ScriptedTracker, TrackerContext};
pub use forwarder::CommandForwarder;
pub use global::{global_queue, install_global_queue, uninstall_global_queue, GlobalCommandQueue};
pub use injector::MatomoInjector;
pub use queue::{AccessorClosure, CommandQueue, QueueEntry, RecordingQueue};
pub use settings::{InjectorConfig, TrackerSettings};
pub use value::{Arg, DomNode, NameList, RequestMethod, RequestProcessor, VariableScope};

pub(crate) static LOGGER: LazyLock<Logger> =
    LazyLock::new(|| Logger::new(constants::TRACKER_LOGGER_NAME));
