use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::platform::environment::matomo_defaults;
use crate::tracker::constants::{
    DEFAULT_QUEUE_NAME, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCRIPT_NAME, DEFAULT_TRACKER_ENDPOINT,
};
use crate::tracker::error::{invalid_argument, TrackerResult};

/// Options for [`MatomoTracker`](crate::tracker::MatomoTracker).
///
/// Deserializes from `{"queueName": "_paq", "requestTimeoutMs": 30000}`; a timeout of `0` or
/// `null` disables it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub queue_name: String,
    #[serde(rename = "requestTimeoutMs", deserialize_with = "deserialize_timeout")]
    pub request_timeout: Option<Duration>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl TrackerSettings {
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads settings from the Matomo defaults (see
    /// [`matomo_defaults`](crate::platform::environment::matomo_defaults)), falling back to
    /// [`TrackerSettings::default`] when none are configured.
    pub fn from_env() -> TrackerResult<Self> {
        match matomo_defaults() {
            Some(map) => serde_json::from_value(Value::Object(map))
                .map_err(|err| invalid_argument(format!("invalid tracker settings: {err}"))),
            None => Ok(Self::default()),
        }
    }
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.filter(|ms| *ms > 0).map(Duration::from_millis))
}

/// Bootstrap options for [`MatomoInjector`](crate::tracker::MatomoInjector).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectorConfig {
    /// Root of the Matomo installation, e.g. `https://stats.example.org/`.
    pub url: String,
    #[serde(deserialize_with = "deserialize_site_id")]
    pub site_id: u32,
    #[serde(default = "default_script_name")]
    pub script_name: String,
    #[serde(default = "default_tracker_endpoint")]
    pub tracker_endpoint: String,
    #[serde(default = "default_true")]
    pub track_page_view: bool,
    #[serde(default = "default_true")]
    pub enable_link_tracking: bool,
}

impl InjectorConfig {
    pub fn new(url: impl Into<String>, site_id: u32) -> Self {
        Self {
            url: url.into(),
            site_id,
            script_name: default_script_name(),
            tracker_endpoint: default_tracker_endpoint(),
            track_page_view: true,
            enable_link_tracking: true,
        }
    }

    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn with_tracker_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.tracker_endpoint = endpoint.into();
        self
    }

    pub fn with_page_view(mut self, enabled: bool) -> Self {
        self.track_page_view = enabled;
        self
    }

    pub fn with_link_tracking(mut self, enabled: bool) -> Self {
        self.enable_link_tracking = enabled;
        self
    }

    /// Builds the config from the Matomo defaults; `url` and `siteId` are required.
    pub fn from_env() -> TrackerResult<Self> {
        let map = matomo_defaults()
            .ok_or_else(|| invalid_argument("no Matomo defaults configured"))?;
        serde_json::from_value(Value::Object(map))
            .map_err(|err| invalid_argument(format!("invalid injector config: {err}")))
    }

    /// Validated installation root, always ending in `/`.
    ///
    /// Protocol-relative roots (`//stats.example.org/`) are accepted and kept as given.
    pub fn base_url(&self) -> TrackerResult<String> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(invalid_argument("Matomo url must not be empty"));
        }

        let absolute = if trimmed.starts_with("//") {
            format!("https:{trimmed}")
        } else {
            trimmed.to_string()
        };
        let parsed = Url::parse(&absolute)
            .map_err(|err| invalid_argument(format!("invalid Matomo url `{trimmed}`: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(invalid_argument(format!(
                "Matomo url `{trimmed}` must be an http(s) address"
            )));
        }

        let mut base = trimmed.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(base)
    }

    pub fn tracker_url(&self) -> TrackerResult<String> {
        Ok(format!("{}{}", self.base_url()?, self.tracker_endpoint))
    }

    pub fn script_url(&self) -> TrackerResult<String> {
        Ok(format!("{}{}", self.base_url()?, self.script_name))
    }
}

fn default_script_name() -> String {
    DEFAULT_SCRIPT_NAME.to_string()
}

fn default_tracker_endpoint() -> String {
    DEFAULT_TRACKER_ENDPOINT.to_string()
}

fn default_true() -> bool {
    true
}

// Accepts numbers and numeric strings so `key=value` defaults work.
fn deserialize_site_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid site id {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<u32>()
            .map_err(|err| D::Error::custom(format!("invalid site id `{text}`: {err}"))),
        other => Err(D::Error::custom(format!("invalid site id {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_settings_defaults() {
        let settings = TrackerSettings::default();
        assert_eq!(settings.queue_name, "_paq");
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn tracker_settings_from_json() {
        let settings: TrackerSettings =
            serde_json::from_str(r#"{"queueName":"_mtm","requestTimeoutMs":250}"#).unwrap();
        assert_eq!(settings.queue_name, "_mtm");
        assert_eq!(settings.request_timeout, Some(Duration::from_millis(250)));

        let disabled: TrackerSettings =
            serde_json::from_str(r#"{"requestTimeoutMs":0}"#).unwrap();
        assert_eq!(disabled.queue_name, "_paq");
        assert_eq!(disabled.request_timeout, None);
    }

    #[test]
    fn injector_config_accepts_string_site_ids() {
        let config: InjectorConfig =
            serde_json::from_str(r#"{"url":"https://stats.example.org","siteId":"7"}"#).unwrap();
        assert_eq!(config.site_id, 7);
        assert!(config.track_page_view);
        assert_eq!(config.script_name, "piwik.js");

        let err = serde_json::from_str::<InjectorConfig>(r#"{"url":"x","siteId":"seven"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid site id"));
    }

    #[test]
    fn derived_urls_gain_trailing_slash() {
        let config = InjectorConfig::new("https://stats.example.org/matomo", 1)
            .with_script_name("matomo.js")
            .with_tracker_endpoint("matomo.php");
        assert_eq!(
            config.tracker_url().unwrap(),
            "https://stats.example.org/matomo/matomo.php"
        );
        assert_eq!(
            config.script_url().unwrap(),
            "https://stats.example.org/matomo/matomo.js"
        );
    }

    #[test]
    fn protocol_relative_urls_are_kept() {
        let config = InjectorConfig::new("//stats.example.org/", 1);
        assert_eq!(config.tracker_url().unwrap(), "//stats.example.org/piwik.php");
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(InjectorConfig::new("   ", 1).base_url().is_err());
        assert!(InjectorConfig::new("not a url", 1).base_url().is_err());
        assert!(InjectorConfig::new("ftp://stats.example.org/", 1)
            .base_url()
            .is_err());
    }
}
