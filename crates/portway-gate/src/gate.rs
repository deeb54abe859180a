// SPDX-License-Identifier: Apache-2.0
//! The decision function.

use std::panic::{catch_unwind, AssertUnwindSafe};

use portway_proto::TabId;
use thiserror::Error;
use tracing::{debug, warn};

use crate::filter::{FilterResponse, RequestDetails, RequestFilter};
use crate::resource::{ResourceType, HOST_TYPE_CODES, TYPE_DOCUMENT};
use crate::verdict::Verdict;

/// One candidate load as reported by the host pipeline.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a, C> {
    /// Host resource code (see [`ResourceType::from_host_code`]).
    pub host_type: u32,
    /// Target location.
    pub url: &'a str,
    /// Element or document that triggered the load, if any.
    pub context: Option<&'a C>,
}

/// The host could not resolve window or tab identity for a load.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The context's owning window could not be determined.
    #[error("owning window unavailable: {0}")]
    Window(String),
    /// The top-level browser for a window could not be determined.
    #[error("top-level browser unavailable: {0}")]
    Browser(String),
}

/// Window/tab collaborator, as seen from the load path.
///
/// All methods are synchronous lookups into host state.
pub trait FrameResolver: Send + Sync {
    /// Host handle for the element or document that triggered a load.
    type Context;
    /// Host handle for a browsing context.
    type Window;

    /// Window owning `context`.
    fn owning_window(
        &self,
        context: &Self::Context,
    ) -> Result<Option<Self::Window>, ResolutionError>;

    /// Whether `window` is its own top-level browsing context.
    fn is_top_level(&self, window: &Self::Window) -> bool;

    /// Tab identity of the top-level browser hosting `window`.
    fn top_level_tab(&self, window: &Self::Window) -> Result<Option<TabId>, ResolutionError>;
}

/// Interception gate: one filter, one resolver.
#[derive(Debug)]
pub struct Gate<F, R> {
    filter: F,
    resolver: R,
}

impl<F, R> Gate<F, R>
where
    F: RequestFilter,
    R: FrameResolver,
{
    /// Gate consulting `filter`, resolving identity through `resolver`.
    pub fn new(filter: F, resolver: R) -> Self {
        Self { filter, resolver }
    }

    /// Host resource codes this gate should be registered for.
    pub fn host_type_codes() -> &'static [u32] {
        &HOST_TYPE_CODES
    }

    /// The registered filter.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// The identity resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Decide on one load. Never panics; internal failures accept the load.
    pub fn decide(&self, request: &LoadRequest<'_, R::Context>) -> Verdict {
        match catch_unwind(AssertUnwindSafe(|| self.evaluate(request))) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(url = request.url, "load evaluation panicked; accepting");
                Verdict::Accept
            }
        }
    }

    fn evaluate(&self, request: &LoadRequest<'_, R::Context>) -> Verdict {
        if request.host_type == TYPE_DOCUMENT || !is_network_scheme(request.url) {
            return Verdict::Accept;
        }
        let Some(context) = request.context else {
            return Verdict::Accept;
        };

        let window = match self.resolver.owning_window(context) {
            Ok(Some(window)) => window,
            Ok(None) => return Verdict::Accept,
            Err(err) => {
                debug!(%err, url = request.url, "no owning window; accepting");
                return Verdict::Accept;
            }
        };

        let resource_type = ResourceType::from_host_code(request.host_type);
        if let Some(types) = self.filter.types() {
            if !types.contains(&resource_type) {
                return Verdict::Accept;
            }
        }

        let tab_id = match self.resolver.top_level_tab(&window) {
            Ok(Some(tab_id)) => tab_id,
            Ok(None) => return Verdict::Accept,
            Err(err) => {
                debug!(%err, url = request.url, "no tab identity; accepting");
                return Verdict::Accept;
            }
        };
        let top_level = self.resolver.is_top_level(&window);

        let details = RequestDetails {
            url: request.url,
            resource_type,
            tab_id,
            frame_id: if top_level { 0 } else { 1 },
            parent_frame_id: if top_level { -1 } else { 0 },
        };

        match self.filter.on_before_request(&details) {
            Some(FilterResponse { cancel: true, .. }) => Verdict::Reject,
            Some(FilterResponse {
                redirect_url: Some(location),
                ..
            }) if !location.is_empty() => Verdict::Redirect(location),
            _ => Verdict::Accept,
        }
    }
}

fn is_network_scheme(url: &str) -> bool {
    url.split_once(':').is_some_and(|(scheme, _)| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::filter::filter_fn;

    // Context = (is_top_level, tab); `None` tab means unresolvable browser.
    struct Flat;

    impl FrameResolver for Flat {
        type Context = (bool, Option<&'static str>);
        type Window = (bool, Option<&'static str>);

        fn owning_window(
            &self,
            context: &Self::Context,
        ) -> Result<Option<Self::Window>, ResolutionError> {
            Ok(Some(*context))
        }

        fn is_top_level(&self, window: &Self::Window) -> bool {
            window.0
        }

        fn top_level_tab(&self, window: &Self::Window) -> Result<Option<TabId>, ResolutionError> {
            Ok(window.1.map(|t| TabId(t.to_owned())))
        }
    }

    fn load<'a>(
        host_type: u32,
        url: &'a str,
        ctx: &'a (bool, Option<&'static str>),
    ) -> LoadRequest<'a, (bool, Option<&'static str>)> {
        LoadRequest {
            host_type,
            url,
            context: Some(ctx),
        }
    }

    #[test]
    fn scheme_check_is_exact_and_case_insensitive() {
        assert!(is_network_scheme("http://a"));
        assert!(is_network_scheme("HTTPS://a"));
        assert!(!is_network_scheme("httpx://a"));
        assert!(!is_network_scheme("data:text/plain,hi"));
        assert!(!is_network_scheme("no-scheme"));
    }

    #[test]
    fn frame_ids_follow_nesting() {
        let gate = Gate::new(
            filter_fn(None, |d| {
                let expected = if d.url.ends_with("top") { (0, -1) } else { (1, 0) };
                assert_eq!((d.frame_id, d.parent_frame_id), expected);
                Some(FilterResponse::cancel())
            }),
            Flat,
        );
        let top = (true, Some("1"));
        let nested = (false, Some("1"));
        assert_eq!(gate.decide(&load(2, "https://a/top", &top)), Verdict::Reject);
        assert_eq!(
            gate.decide(&load(2, "https://a/nested", &nested)),
            Verdict::Reject
        );
    }

    #[test]
    fn empty_redirect_is_accept() {
        let gate = Gate::new(
            filter_fn(None, |_| Some(FilterResponse::redirect(""))),
            Flat,
        );
        let ctx = (true, Some("1"));
        assert_eq!(gate.decide(&load(3, "http://a/i.png", &ctx)), Verdict::Accept);
    }

    #[test]
    fn panicking_filter_accepts() {
        let gate = Gate::new(filter_fn(None, |_| panic!("filter bug")), Flat);
        let ctx = (true, Some("1"));
        assert_eq!(gate.decide(&load(2, "http://a/s.js", &ctx)), Verdict::Accept);
    }

    #[test]
    fn registration_codes_exclude_documents() {
        let codes = Gate::<FnFilter, Flat>::host_type_codes();
        assert!(!codes.contains(&TYPE_DOCUMENT));
        assert_eq!(codes.len(), 6);
    }

    type FnFilter = crate::filter::FnFilter<fn(&RequestDetails<'_>) -> Option<FilterResponse>>;
}
