// SPDX-License-Identifier: Apache-2.0
//! Recording request filter.

use std::sync::{Mutex, MutexGuard};

use portway_gate::{FilterResponse, RequestDetails, RequestFilter, ResourceType};
use portway_proto::TabId;

/// Owned copy of the [`RequestDetails`] a filter was called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Target location.
    pub url: String,
    /// Normalized type.
    pub resource_type: ResourceType,
    /// Owning tab.
    pub tab_id: TabId,
    /// Frame id as reported.
    pub frame_id: i32,
    /// Parent frame id as reported.
    pub parent_frame_id: i32,
}

/// [`RequestFilter`] that answers with a fixed response and records calls.
#[derive(Debug)]
pub struct RecordingFilter {
    types: Option<Vec<ResourceType>>,
    response: Option<FilterResponse>,
    calls: Mutex<Vec<RecordedRequest>>,
}

impl RecordingFilter {
    /// Filter interested in every type, always answering `response`.
    pub fn new(response: Option<FilterResponse>) -> Self {
        Self {
            types: None,
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Restrict the filter to `types`.
    pub fn with_types(mut self, types: &[ResourceType]) -> Self {
        self.types = Some(types.to_vec());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Calls so far.
    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.lock().clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.lock().len()
    }
}

impl RequestFilter for RecordingFilter {
    fn types(&self) -> Option<&[ResourceType]> {
        self.types.as_deref()
    }

    fn on_before_request(&self, details: &RequestDetails<'_>) -> Option<FilterResponse> {
        self.lock().push(RecordedRequest {
            url: details.url.to_owned(),
            resource_type: details.resource_type,
            tab_id: details.tab_id.clone(),
            frame_id: details.frame_id,
            parent_frame_id: details.parent_frame_id,
        });
        self.response.clone()
    }
}
