use std::time::Duration;

pub(crate) const TRACKER_LOGGER_NAME: &str = "@matomo/tracker";

/// Name of the global command queue the Matomo snippet creates.
pub const DEFAULT_QUEUE_NAME: &str = "_paq";
pub const DEFAULT_SCRIPT_NAME: &str = "piwik.js";
pub const DEFAULT_TRACKER_ENDPOINT: &str = "piwik.php";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const NOT_INITIALIZED_WARNING: &str =
    "Matomo has not yet been initialized! (Did you forget to inject it?)";
