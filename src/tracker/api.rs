use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tracker::bridge::{Accessor, AsyncBridge, PendingRequest};
use crate::tracker::constants::NOT_INITIALIZED_WARNING;
use crate::tracker::error::TrackerResult;
use crate::tracker::forwarder::CommandForwarder;
use crate::tracker::global::GlobalCommandQueue;
use crate::tracker::queue::CommandQueue;
use crate::tracker::settings::TrackerSettings;
use crate::tracker::value::{
    positional, Arg, DomNode, NameList, RequestMethod, RequestProcessor, VariableScope,
};
use crate::tracker::LOGGER;

/// Typed wrapper around the Matomo JavaScript tracker.
///
/// Every command method queues one `[name, ...args]` entry and returns once it is queued; the
/// tracker script applies it later. Accessors queue a closure and return a [`PendingRequest`]
/// that resolves when the script has run it. Optional arguments left as `None` are omitted from
/// the queued command.
#[derive(Clone)]
pub struct MatomoTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    forwarder: CommandForwarder,
    bridge: AsyncBridge,
    settings: TrackerSettings,
}

impl fmt::Debug for MatomoTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatomoTracker")
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl Default for MatomoTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MatomoTracker {
    /// Tracker bound to the global `_paq` queue with default settings.
    pub fn new() -> Self {
        Self::with_settings(TrackerSettings::default())
    }

    /// Tracker bound to the global queue named in `settings`.
    pub fn with_settings(settings: TrackerSettings) -> Self {
        let queue = Arc::new(GlobalCommandQueue::new(settings.queue_name.clone()));
        Self::with_queue(queue, settings)
    }

    /// Tracker bound to an explicit queue.
    ///
    /// A missing queue is not an error here: a warning is logged and later calls fail instead.
    pub fn with_queue(queue: Arc<dyn CommandQueue>, settings: TrackerSettings) -> Self {
        if !queue.is_available() {
            LOGGER.warn(NOT_INITIALIZED_WARNING);
        }

        let inner = TrackerInner {
            forwarder: CommandForwarder::new(queue.clone()),
            bridge: AsyncBridge::new(queue, settings.request_timeout),
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.inner.settings
    }

    /// Queues an arbitrary command, for operations without a typed method.
    pub fn forward(&self, method: &str, args: Vec<Arg>) -> TrackerResult<()> {
        self.inner.forwarder.forward(method, args)
    }

    /// Calls an accessor and decodes its result into `T`.
    pub fn request<T>(&self, accessor: Accessor, args: Vec<Arg>) -> PendingRequest<T>
    where
        T: DeserializeOwned,
    {
        self.inner.bridge.request(accessor, args)
    }

    fn run(&self, method: &str, args: Vec<Arg>) -> TrackerResult<()> {
        self.inner.forwarder.forward(method, positional(args))
    }

    /// Log a page view.
    pub fn track_page_view(&self, custom_title: Option<&str>) -> TrackerResult<()> {
        self.run("trackPageView", vec![custom_title.into()])
    }

    /// Log an event with a category, an action, and an optional name and numeric value.
    pub fn track_event(
        &self,
        category: &str,
        action: &str,
        name: Option<&str>,
        value: Option<f64>,
    ) -> TrackerResult<()> {
        self.run(
            "trackEvent",
            vec![category.into(), action.into(), name.into(), value.into()],
        )
    }

    /// Log an internal site search for a keyword, with an optional category and result count.
    pub fn track_site_search(
        &self,
        keyword: &str,
        category: Option<&str>,
        results_count: Option<u32>,
    ) -> TrackerResult<()> {
        self.run(
            "trackSiteSearch",
            vec![keyword.into(), category.into(), results_count.into()],
        )
    }

    /// Log a conversion for the numeric goal id, with optional custom revenue.
    pub fn track_goal(&self, id_goal: u32, custom_revenue: Option<f64>) -> TrackerResult<()> {
        self.run("trackGoal", vec![id_goal.into(), custom_revenue.into()])
    }

    /// Log a click from your own code. `link_type` is `link` for an outlink or `download`.
    pub fn track_link(&self, url: &str, link_type: &str) -> TrackerResult<()> {
        self.run("trackLink", vec![url.into(), link_type.into()])
    }

    /// Scan the DOM for all content blocks and track their impressions once the DOM is ready.
    pub fn track_all_content_impressions(&self) -> TrackerResult<()> {
        self.run("trackAllContentImpressions", Vec::new())
    }

    /// Track impressions of content blocks only while they are actually visible.
    pub fn track_visible_content_impressions(
        &self,
        check_on_scroll: bool,
        time_interval_in_ms: u32,
    ) -> TrackerResult<()> {
        self.run(
            "trackVisibleContentImpressions",
            vec![check_on_scroll.into(), time_interval_in_ms.into()],
        )
    }

    /// Scan the given node and its children for content blocks not tracked yet.
    pub fn track_content_impressions_within_node(&self, dom_node: DomNode) -> TrackerResult<()> {
        self.run("trackContentImpressionsWithinNode", vec![dom_node.into()])
    }

    /// Track an interaction with the given node or content block.
    pub fn track_content_interaction_node(
        &self,
        dom_node: DomNode,
        content_interaction: &str,
    ) -> TrackerResult<()> {
        self.run(
            "trackContentInteractionNode",
            vec![dom_node.into(), content_interaction.into()],
        )
    }

    /// Track a content impression using the specified values.
    pub fn track_content_impression(
        &self,
        content_name: &str,
        content_piece: &str,
        content_target: &str,
    ) -> TrackerResult<()> {
        self.run(
            "trackContentImpression",
            vec![
                content_name.into(),
                content_piece.into(),
                content_target.into(),
            ],
        )
    }

    /// Track a content interaction using the specified values.
    pub fn track_content_interaction(
        &self,
        content_interaction: &str,
        content_name: &str,
        content_piece: &str,
        content_target: &str,
    ) -> TrackerResult<()> {
        self.run(
            "trackContentInteraction",
            vec![
                content_interaction.into(),
                content_name.into(),
                content_piece.into(),
                content_target.into(),
            ],
        )
    }

    /// Log all content blocks found on the page to the console.
    pub fn log_all_content_blocks_on_page(&self) -> TrackerResult<()> {
        self.run("logAllContentBlocksOnPage", Vec::new())
    }

    /// Send a ping request, extending the current visit without tracking an action.
    pub fn ping(&self) -> TrackerResult<()> {
        self.run("ping", Vec::new())
    }

    /// Send regular heartbeat requests while the page is active and in focus.
    pub fn enable_heart_beat_timer(&self, delay_in_seconds: u32) -> TrackerResult<()> {
        self.run("enableHeartBeatTimer", vec![delay_in_seconds.into()])
    }

    /// Install link tracking; `enable` treats middle click and context menu as clicks.
    pub fn enable_link_tracking(&self, enable: bool) -> TrackerResult<()> {
        self.run("enableLinkTracking", vec![enable.into()])
    }

    /// Forward the visitor id to other domains through the `pk_vid` link parameter.
    pub fn enable_cross_domain_linking(&self) -> TrackerResult<()> {
        self.run("enableCrossDomainLinking", Vec::new())
    }

    /// Set the cross domain linking timeout in seconds (default 180).
    pub fn set_cross_domain_linking_timeout(&self, timeout: u32) -> TrackerResult<()> {
        self.run("setCrossDomainLinkingTimeout", vec![timeout.into()])
    }

    /// Override `document.title`.
    pub fn set_document_title(&self, title: &str) -> TrackerResult<()> {
        self.run("setDocumentTitle", vec![title.into()])
    }

    /// Set the hostnames or domains treated as local, e.g. `*.example.com`.
    pub fn set_domains(&self, domains: &[&str]) -> TrackerResult<()> {
        self.run("setDomains", vec![domains.into()])
    }

    /// Override the page's reported URL.
    pub fn set_custom_url(&self, url: &str) -> TrackerResult<()> {
        self.run("setCustomUrl", vec![url.into()])
    }

    /// Override the detected HTTP referrer.
    pub fn set_referrer_url(&self, url: &str) -> TrackerResult<()> {
        self.run("setReferrerUrl", vec![url.into()])
    }

    /// Specify the website id.
    pub fn set_site_id(&self, site_id: u32) -> TrackerResult<()> {
        self.run("setSiteId", vec![site_id.into()])
    }

    /// Specify the Matomo HTTP API endpoint; only needed when the overlay report fails.
    pub fn set_api_url(&self, url: &str) -> TrackerResult<()> {
        self.run("setApiUrl", vec![url.into()])
    }

    /// Specify the Matomo tracking endpoint.
    pub fn set_tracker_url(&self, url: &str) -> TrackerResult<()> {
        self.run("setTrackerUrl", vec![url.into()])
    }

    /// Set classes treated as downloads, in addition to `piwik_download`.
    pub fn set_download_classes(&self, classes: impl Into<NameList>) -> TrackerResult<()> {
        self.run("setDownloadClasses", vec![classes.into().into()])
    }

    /// Set the file extensions recognized as downloads.
    pub fn set_download_extensions(&self, extensions: impl Into<NameList>) -> TrackerResult<()> {
        self.run("setDownloadExtensions", vec![extensions.into().into()])
    }

    /// Add file extensions recognized as downloads.
    pub fn add_download_extensions(&self, extensions: impl Into<NameList>) -> TrackerResult<()> {
        self.run("addDownloadExtensions", vec![extensions.into().into()])
    }

    /// Remove file extensions from the download list.
    pub fn remove_download_extensions(
        &self,
        extensions: impl Into<NameList>,
    ) -> TrackerResult<()> {
        self.run("removeDownloadExtensions", vec![extensions.into().into()])
    }

    /// Set classes ignored by link tracking, in addition to `piwik_ignore`.
    pub fn set_ignore_classes(&self, classes: impl Into<NameList>) -> TrackerResult<()> {
        self.run("setIgnoreClasses", vec![classes.into().into()])
    }

    /// Set classes treated as outlinks, in addition to `piwik_link`.
    pub fn set_link_classes(&self, classes: impl Into<NameList>) -> TrackerResult<()> {
        self.run("setLinkClasses", vec![classes.into().into()])
    }

    /// Set the link tracking delay in milliseconds.
    pub fn set_link_tracking_timer(&self, delay: u32) -> TrackerResult<()> {
        self.run("setLinkTrackingTimer", vec![delay.into()])
    }

    /// Do not record the hash part of URLs.
    pub fn discard_hash_tag(&self, value: bool) -> TrackerResult<()> {
        self.run("discardHashTag", vec![value.into()])
    }

    /// Override the page generation time in milliseconds.
    pub fn set_generation_time_ms(&self, generation_time: u32) -> TrackerResult<()> {
        self.run("setGenerationTimeMs", vec![generation_time.into()])
    }

    /// Append a custom string to the end of tracking requests.
    pub fn append_to_tracking_url(&self, append_to_url: &str) -> TrackerResult<()> {
        self.run("appendToTrackingUrl", vec![append_to_url.into()])
    }

    /// Honor the browser's Do Not Track setting.
    pub fn set_do_not_track(&self, do_not_track: bool) -> TrackerResult<()> {
        self.run("setDoNotTrack", vec![do_not_track.into()])
    }

    /// Prevent the tracked page from being framed.
    pub fn kill_frame(&self) -> TrackerResult<()> {
        self.run("killFrame", Vec::new())
    }

    /// Load the live URL when the page is opened from a local file.
    pub fn redirect_file(&self, url: &str) -> TrackerResult<()> {
        self.run("redirectFile", vec![url.into()])
    }

    /// Record the time spent on the page once `minimum_visit_length` seconds are reached.
    pub fn set_heart_beat_timer(
        &self,
        minimum_visit_length: u32,
        heart_beat_delay: u32,
    ) -> TrackerResult<()> {
        self.run(
            "setHeartBeatTimer",
            vec![minimum_visit_length.into(), heart_beat_delay.into()],
        )
    }

    /// Set the User ID of the current visitor.
    pub fn set_user_id(&self, user_id: &str) -> TrackerResult<()> {
        self.run("setUserId", vec![user_id.into()])
    }

    /// Clear the User ID, e.g. after logout and before the next page view.
    pub fn reset_user_id(&self) -> TrackerResult<()> {
        self.run("resetUserId", Vec::new())
    }

    /// Set a custom variable.
    pub fn set_custom_variable(
        &self,
        index: u32,
        name: &str,
        value: &str,
        scope: VariableScope,
    ) -> TrackerResult<()> {
        self.run(
            "setCustomVariable",
            vec![index.into(), name.into(), value.into(), scope.into()],
        )
    }

    /// Delete a custom variable.
    pub fn delete_custom_variable(&self, index: u32, scope: VariableScope) -> TrackerResult<()> {
        self.run("deleteCustomVariable", vec![index.into(), scope.into()])
    }

    /// Persist visit-scoped custom variables in a first party cookie.
    pub fn store_custom_variables_in_cookie(&self) -> TrackerResult<()> {
        self.run("storeCustomVariablesInCookie", Vec::new())
    }

    /// Set a custom dimension.
    pub fn set_custom_dimension(
        &self,
        custom_dimension_id: u32,
        custom_dimension_value: &str,
    ) -> TrackerResult<()> {
        self.run(
            "setCustomDimension",
            vec![custom_dimension_id.into(), custom_dimension_value.into()],
        )
    }

    /// Delete a custom dimension.
    pub fn delete_custom_dimension(&self, custom_dimension_id: u32) -> TrackerResult<()> {
        self.run("deleteCustomDimension", vec![custom_dimension_id.into()])
    }

    /// Set the campaign name URL parameter(s).
    pub fn set_campaign_name_key(&self, name: &str) -> TrackerResult<()> {
        self.run("setCampaignNameKey", vec![name.into()])
    }

    /// Set the campaign keyword URL parameter(s).
    pub fn set_campaign_keyword_key(&self, keyword: &str) -> TrackerResult<()> {
        self.run("setCampaignKeywordKey", vec![keyword.into()])
    }

    /// Attribute conversions to the first referrer instead of the most recent one.
    pub fn set_conversion_attribution_first_referrer(
        &self,
        conversion_to_first_referrer: bool,
    ) -> TrackerResult<()> {
        self.run(
            "setConversionAttributionFirstReferrer",
            vec![conversion_to_first_referrer.into()],
        )
    }

    /// Mark the next page view as a product or category view.
    ///
    /// Leave `product_sku` and `product_name` unset for a category page; they are sent as
    /// `false`, as Matomo expects.
    pub fn set_ecommerce_view(
        &self,
        product_sku: Option<&str>,
        product_name: Option<&str>,
        category: impl Into<NameList>,
        price: Option<f64>,
    ) -> TrackerResult<()> {
        let or_false = |value: Option<&str>| value.map(Arg::from).unwrap_or(Arg::Bool(false));
        self.run(
            "setEcommerceView",
            vec![
                or_false(product_sku),
                or_false(product_name),
                category.into().into(),
                price.into(),
            ],
        )
    }

    /// Add a product to the ecommerce order; call once per product.
    pub fn add_ecommerce_item(
        &self,
        product_sku: &str,
        product_name: Option<&str>,
        product_category: Option<NameList>,
        price: Option<f64>,
        quantity: Option<u32>,
    ) -> TrackerResult<()> {
        self.run(
            "addEcommerceItem",
            vec![
                product_sku.into(),
                product_name.into(),
                product_category.into(),
                price.into(),
                quantity.into(),
            ],
        )
    }

    /// Remove a product from the untracked ecommerce order.
    pub fn remove_ecommerce_item(&self, product_sku: &str) -> TrackerResult<()> {
        self.run("removeEcommerceItem", vec![product_sku.into()])
    }

    /// Remove every product from the untracked ecommerce order.
    pub fn clear_ecommerce_cart(&self) -> TrackerResult<()> {
        self.run("clearEcommerceCart", Vec::new())
    }

    /// Track a cart update; call whenever a product is added, updated or removed.
    pub fn track_ecommerce_cart_update(&self, grand_total: f64) -> TrackerResult<()> {
        self.run("trackEcommerceCartUpdate", vec![grand_total.into()])
    }

    /// Track an ecommerce order including the items added so far.
    pub fn track_ecommerce_order(
        &self,
        order_id: &str,
        grand_total: f64,
        sub_total: Option<f64>,
        tax: Option<f64>,
        shipping: Option<f64>,
        discount: Option<f64>,
    ) -> TrackerResult<()> {
        self.run(
            "trackEcommerceOrder",
            vec![
                order_id.into(),
                grand_total.into(),
                sub_total.into(),
                tax.into(),
                shipping.into(),
                discount.into(),
            ],
        )
    }

    /// Track nothing until the user consents.
    pub fn require_consent(&self) -> TrackerResult<()> {
        self.run("requireConsent", Vec::new())
    }

    /// Record consent for the current session only.
    pub fn set_consent_given(&self) -> TrackerResult<()> {
        self.run("setConsentGiven", Vec::new())
    }

    /// Record consent and remember it in a cookie, optionally expiring after some hours.
    pub fn remember_consent_given(&self, hours_to_expire: Option<u32>) -> TrackerResult<()> {
        self.run("rememberConsentGiven", vec![hours_to_expire.into()])
    }

    /// Withdraw consent, whether one-time or remembered.
    pub fn forget_consent_given(&self) -> TrackerResult<()> {
        self.run("forgetConsentGiven", Vec::new())
    }

    /// Disable all first party cookies.
    pub fn disable_cookies(&self) -> TrackerResult<()> {
        self.run("disableCookies", Vec::new())
    }

    /// Delete the tracking cookies currently set.
    pub fn delete_cookies(&self) -> TrackerResult<()> {
        self.run("deleteCookies", Vec::new())
    }

    /// Set the cookie name prefix (default `pk`).
    pub fn set_cookie_name_prefix(&self, prefix: &str) -> TrackerResult<()> {
        self.run("setCookieNamePrefix", vec![prefix.into()])
    }

    /// Set the cookie domain, e.g. `.example.com`.
    pub fn set_cookie_domain(&self, domain: &str) -> TrackerResult<()> {
        self.run("setCookieDomain", vec![domain.into()])
    }

    /// Set the cookie path (default `/`).
    pub fn set_cookie_path(&self, path: &str) -> TrackerResult<()> {
        self.run("setCookiePath", vec![path.into()])
    }

    /// Set the Secure flag on first party cookies.
    pub fn set_secure_cookie(&self, secure: bool) -> TrackerResult<()> {
        self.run("setSecureCookie", vec![secure.into()])
    }

    /// Visitor cookie lifetime in seconds (default 13 months).
    pub fn set_visitor_cookie_timeout(&self, seconds: u64) -> TrackerResult<()> {
        self.run("setVisitorCookieTimeout", vec![seconds.into()])
    }

    /// Referral cookie lifetime in seconds (default 6 months).
    pub fn set_referral_cookie_timeout(&self, seconds: u64) -> TrackerResult<()> {
        self.run("setReferralCookieTimeout", vec![seconds.into()])
    }

    /// Session cookie lifetime in seconds (default 30 minutes).
    pub fn set_session_cookie_timeout(&self, seconds: u64) -> TrackerResult<()> {
        self.run("setSessionCookieTimeout", vec![seconds.into()])
    }

    /// Track clicks on a specific link element.
    pub fn add_listener(&self, element: DomNode) -> TrackerResult<()> {
        self.run("addListener", vec![element.into()])
    }

    /// Send tracking requests with GET (default) or POST.
    pub fn set_request_method(&self, method: RequestMethod) -> TrackerResult<()> {
        self.run("setRequestMethod", vec![method.into()])
    }

    /// Rewrite each request's query string before it is sent.
    pub fn set_custom_request_processing(&self, callback: RequestProcessor) -> TrackerResult<()> {
        self.run("setCustomRequestProcessing", vec![callback.into()])
    }

    /// Set the Content-Type header used for POST requests.
    pub fn set_request_content_type(&self, content_type: &str) -> TrackerResult<()> {
        self.run("setRequestContentType", vec![content_type.into()])
    }

    /// Send every tracking request individually instead of in bulk.
    pub fn disable_queue_request(&self) -> TrackerResult<()> {
        self.run("disableQueueRequest", Vec::new())
    }

    /// Return the Matomo server URL.
    pub fn get_piwik_url(&self) -> PendingRequest<String> {
        self.request(Accessor::PiwikUrl, Vec::new())
    }

    /// Return the URL of the current page, or the custom URL if one was set.
    pub fn get_current_url(&self) -> PendingRequest<String> {
        self.request(Accessor::CurrentUrl, Vec::new())
    }

    /// Return the link tracking delay in milliseconds.
    pub fn get_link_tracking_timer(&self) -> PendingRequest<u64> {
        self.request(Accessor::LinkTrackingTimer, Vec::new())
    }

    /// Return the 16 character visitor id.
    pub fn get_visitor_id(&self) -> PendingRequest<String> {
        self.request(Accessor::VisitorId, Vec::new())
    }

    /// Return the visitor cookie contents.
    pub fn get_visitor_info(&self) -> PendingRequest<Vec<Value>> {
        self.request(Accessor::VisitorInfo, Vec::new())
    }

    /// Return the attribution data (referrer and campaign) used to credit conversions.
    pub fn get_attribution_info(&self) -> PendingRequest<Vec<Value>> {
        self.request(Accessor::AttributionInfo, Vec::new())
    }

    pub fn get_attribution_campaign_name(&self) -> PendingRequest<String> {
        self.request(Accessor::AttributionCampaignName, Vec::new())
    }

    pub fn get_attribution_campaign_keyword(&self) -> PendingRequest<String> {
        self.request(Accessor::AttributionCampaignKeyword, Vec::new())
    }

    /// The referrer timestamp as stored by Matomo (a number or a string).
    pub fn get_attribution_referrer_timestamp(&self) -> PendingRequest<Value> {
        self.request(Accessor::AttributionReferrerTimestamp, Vec::new())
    }

    pub fn get_attribution_referrer_url(&self) -> PendingRequest<String> {
        self.request(Accessor::AttributionReferrerUrl, Vec::new())
    }

    /// Return the User ID, empty when none was set.
    pub fn get_user_id(&self) -> PendingRequest<String> {
        self.request(Accessor::UserId, Vec::new())
    }

    /// Retrieve a custom variable as returned by Matomo: `[name, value]`, or `false` when unset.
    pub fn get_custom_variable(&self, index: u32, scope: VariableScope) -> PendingRequest<Value> {
        self.request(Accessor::CustomVariable, vec![index.into(), scope.into()])
    }

    /// Retrieve a custom dimension; `None` when it has no value.
    pub fn get_custom_dimension(&self, custom_dimension_id: u32) -> PendingRequest<Option<String>> {
        self.request(Accessor::CustomDimension, vec![custom_dimension_id.into()])
    }

    /// Return the query parameter that carries the visitor id across domains.
    pub fn get_cross_domain_linking_url_parameter(&self) -> PendingRequest<String> {
        self.request(Accessor::CrossDomainLinkingUrlParameter, Vec::new())
    }

    /// Return a copy of the items in the untracked ecommerce order.
    pub fn get_ecommerce_items(&self) -> PendingRequest<Value> {
        self.request(Accessor::EcommerceItems, Vec::new())
    }

    /// Return whether cookies are enabled and supported by the browser.
    pub fn has_cookies(&self) -> PendingRequest<bool> {
        self.request(Accessor::HasCookies, Vec::new())
    }
}
