use std::fmt;
use std::sync::Arc;

use crate::platform::environment::is_browser;
use crate::tracker::error::TrackerResult;
use crate::tracker::forwarder::CommandForwarder;
use crate::tracker::global::GlobalCommandQueue;
use crate::tracker::queue::CommandQueue;
use crate::tracker::settings::InjectorConfig;
use crate::tracker::value::Arg;
use crate::tracker::LOGGER;

/// Bootstraps Matomo: queues the initial commands and loads the tracker script.
///
/// This is the programmatic form of the snippet Matomo asks sites to paste into their pages.
#[derive(Clone)]
pub struct MatomoInjector {
    queue: Arc<dyn CommandQueue>,
    global: Option<GlobalCommandQueue>,
}

impl fmt::Debug for MatomoInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatomoInjector")
            .field("queue", &self.queue.name())
            .field("global", &self.global.is_some())
            .finish()
    }
}

impl MatomoInjector {
    /// Injector for an explicit queue. No queue is created and no script is loaded.
    pub fn new(queue: Arc<dyn CommandQueue>) -> Self {
        Self {
            queue,
            global: None,
        }
    }

    /// Injector for the global `_paq` queue.
    pub fn global() -> Self {
        Self::for_queue_name(crate::tracker::constants::DEFAULT_QUEUE_NAME)
    }

    pub fn for_queue_name(name: impl Into<String>) -> Self {
        let global = GlobalCommandQueue::new(name);
        Self {
            queue: Arc::new(global.clone()),
            global: Some(global),
        }
    }

    /// Queues the bootstrap commands, then injects `<script async defer src=...>` once.
    ///
    /// The commands go in Matomo's snippet order: `trackPageView` and `enableLinkTracking` (when
    /// enabled), `setTrackerUrl`, `setSiteId`. The url is validated before anything is queued.
    pub fn init(&self, config: &InjectorConfig) -> TrackerResult<()> {
        let tracker_url = config.tracker_url()?;
        let script_url = config.script_url()?;

        if let Some(global) = &self.global {
            global.ensure()?;
        }

        let forwarder = CommandForwarder::new(self.queue.clone());
        if config.track_page_view {
            forwarder.forward("trackPageView", Vec::new())?;
        }
        if config.enable_link_tracking {
            forwarder.forward("enableLinkTracking", Vec::new())?;
        }
        forwarder.forward("setTrackerUrl", vec![Arg::from(tracker_url)])?;
        forwarder.forward("setSiteId", vec![Arg::from(config.site_id.to_string())])?;

        if self.global.is_some() {
            if is_browser() {
                inject_script(&script_url)?;
            } else {
                LOGGER.debug(format!("No document available, skipping script {script_url}"));
            }
        }
        LOGGER.debug(format!(
            "Matomo initialized for site {} with {script_url}",
            config.site_id
        ));
        Ok(())
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn inject_script(src: &str) -> TrackerResult<()> {
    web::inject_script(src)
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn inject_script(_src: &str) -> TrackerResult<()> {
    Ok(())
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
mod web {
    use wasm_bindgen::JsCast;

    use crate::tracker::error::{internal_error, TrackerResult};

    pub(super) fn inject_script(src: &str) -> TrackerResult<()> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| internal_error("Document not available"))?;

        if document
            .query_selector(&format!("script[src=\"{src}\"]"))
            .ok()
            .flatten()
            .is_some()
        {
            return Ok(());
        }

        let script = document
            .create_element("script")
            .map_err(|err| internal_error(format!("Failed to create script: {err:?}")))?
            .dyn_into::<web_sys::HtmlScriptElement>()
            .map_err(|_| internal_error("Script element has wrong type"))?;
        script.set_type("text/javascript");
        script.set_async(true);
        script.set_defer(true);
        script.set_src(src);

        // Matomo's snippet inserts before the first script on the page.
        let first_script = document
            .get_elements_by_tag_name("script")
            .item(0)
            .and_then(|element| element.parent_node().map(|parent| (parent, element)));
        match first_script {
            Some((parent, element)) => {
                parent
                    .insert_before(&script, Some(&element))
                    .map_err(|err| internal_error(format!("Failed to insert script: {err:?}")))?;
            }
            None => {
                let head = document
                    .head()
                    .ok_or_else(|| internal_error("Document has no <head>"))?;
                head.append_child(&script)
                    .map_err(|err| internal_error(format!("Failed to append script: {err:?}")))?;
            }
        }
        Ok(())
    }
}

#[cfg(all(test, not(all(target_arch = "wasm32", feature = "wasm-web"))))]
mod tests {
    use super::*;
    use crate::tracker::error::TrackerErrorCode;
    use crate::tracker::global::{global_queue, uninstall_global_queue};
    use crate::tracker::queue::RecordingQueue;

    fn s(value: &str) -> Arg {
        Arg::Str(value.to_string())
    }

    #[test]
    fn init_queues_snippet_commands_in_order() {
        let queue = Arc::new(RecordingQueue::new());
        let injector = MatomoInjector::new(queue.clone());
        injector
            .init(&InjectorConfig::new("https://stats.example.org", 3))
            .unwrap();

        assert_eq!(
            queue.method_calls(),
            vec![
                ("trackPageView".to_string(), vec![]),
                ("enableLinkTracking".to_string(), vec![]),
                (
                    "setTrackerUrl".to_string(),
                    vec![s("https://stats.example.org/piwik.php")]
                ),
                ("setSiteId".to_string(), vec![s("3")]),
            ]
        );
    }

    #[test]
    fn disabled_bootstrap_commands_are_skipped() {
        let queue = Arc::new(RecordingQueue::new());
        let config = InjectorConfig::new("https://stats.example.org/", 9)
            .with_page_view(false)
            .with_link_tracking(false);
        MatomoInjector::new(queue.clone()).init(&config).unwrap();

        let names: Vec<_> = queue
            .method_calls()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["setTrackerUrl", "setSiteId"]);
    }

    #[test]
    fn invalid_url_queues_nothing() {
        let queue = Arc::new(RecordingQueue::new());
        let err = MatomoInjector::new(queue.clone())
            .init(&InjectorConfig::new("stats.example.org", 1))
            .unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::InvalidArgument);
        assert!(queue.is_empty());
    }

    #[test]
    fn global_injector_creates_the_queue() {
        let name = "_paq_injector_global";
        assert!(global_queue(name).is_none());

        MatomoInjector::for_queue_name(name)
            .init(&InjectorConfig::new("https://stats.example.org", 1))
            .unwrap();

        let queue = global_queue(name).expect("queue installed");
        assert!(queue.is_available());
        uninstall_global_queue(name);
    }
}
