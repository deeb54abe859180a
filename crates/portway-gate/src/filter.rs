// SPDX-License-Identifier: Apache-2.0
//! Policy filter contract.

use std::sync::Arc;

use portway_proto::TabId;
use serde::{Deserialize, Serialize};

use crate::resource::ResourceType;

/// What the filter is told about a candidate load.
///
/// Serializes as `{"url", "type", "tabId", "frameId", "parentFrameId"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails<'a> {
    /// Target location.
    pub url: &'a str,
    /// Normalized resource type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Tab owning the load.
    pub tab_id: TabId,
    /// `0` for the top-level frame, `1` for nested frames.
    pub frame_id: i32,
    /// `-1` for the top-level frame, `0` otherwise.
    pub parent_frame_id: i32,
}

/// A filter's answer for one load.
///
/// Deserializes from `{"cancel": true}` or `{"redirectURL": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResponse {
    /// Block the load.
    #[serde(default)]
    pub cancel: bool,
    /// Replace the load with this location.
    #[serde(
        rename = "redirectURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_url: Option<String>,
}

impl FilterResponse {
    /// Block the load.
    pub fn cancel() -> Self {
        Self {
            cancel: true,
            redirect_url: None,
        }
    }

    /// Reject the load and replace it with `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            cancel: false,
            redirect_url: Some(location.into()),
        }
    }
}

/// Policy callback consulted by the gate.
///
/// Called synchronously on the host's load path; implementations must answer
/// from data they already hold and must not block on I/O.
pub trait RequestFilter: Send + Sync {
    /// Resource types this filter wants to see. `None` means all of them.
    fn types(&self) -> Option<&[ResourceType]> {
        None
    }

    /// Decide on one load. `None` lets it through.
    fn on_before_request(&self, details: &RequestDetails<'_>) -> Option<FilterResponse>;
}

impl<T: RequestFilter + ?Sized> RequestFilter for Arc<T> {
    fn types(&self) -> Option<&[ResourceType]> {
        (**self).types()
    }

    fn on_before_request(&self, details: &RequestDetails<'_>) -> Option<FilterResponse> {
        (**self).on_before_request(details)
    }
}

/// Closure-backed [`RequestFilter`].
pub struct FnFilter<F> {
    types: Option<Vec<ResourceType>>,
    f: F,
}

impl<F> RequestFilter for FnFilter<F>
where
    F: Fn(&RequestDetails<'_>) -> Option<FilterResponse> + Send + Sync,
{
    fn types(&self) -> Option<&[ResourceType]> {
        self.types.as_deref()
    }

    fn on_before_request(&self, details: &RequestDetails<'_>) -> Option<FilterResponse> {
        (self.f)(details)
    }
}

/// Wrap a closure as a filter interested in `types` (`None` = all types).
pub fn filter_fn<F>(types: Option<Vec<ResourceType>>, f: F) -> FnFilter<F>
where
    F: Fn(&RequestDetails<'_>) -> Option<FilterResponse> + Send + Sync,
{
    FnFilter { types, f }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn details_use_host_field_names() {
        let details = RequestDetails {
            url: "https://a.test/x.js",
            resource_type: ResourceType::Script,
            tab_id: TabId("7".into()),
            frame_id: 1,
            parent_frame_id: 0,
        };
        assert_eq!(
            serde_json::to_string(&details).unwrap(),
            r#"{"url":"https://a.test/x.js","type":"script","tabId":"7","frameId":1,"parentFrameId":0}"#
        );
    }

    #[test]
    fn responses_parse_from_policy_json() {
        let cancel: FilterResponse = serde_json::from_str(r#"{"cancel":true}"#).unwrap();
        assert_eq!(cancel, FilterResponse::cancel());
        let redirect: FilterResponse =
            serde_json::from_str(r#"{"redirectURL":"https://x/"}"#).unwrap();
        assert_eq!(redirect, FilterResponse::redirect("https://x/"));
        let empty: FilterResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, FilterResponse::default());
    }
}
