// SPDX-License-Identifier: Apache-2.0
//! Synchronous request-interception gate.
//!
//! The host's resource-loading pipeline calls [`Gate::decide`] once per
//! candidate load and blocks on the answer. The gate normalizes the host's
//! resource code, short-circuits loads that can never be filtered, resolves
//! the owning tab, asks the registered [`RequestFilter`], and translates its
//! answer into a [`Verdict`].
//!
//! Everything on this path is a plain function call: the filter contract has
//! no async form, so a verdict is always produced before `decide` returns.
//! Internal failures degrade to [`Verdict::Accept`].

mod filter;
mod gate;
mod resource;
mod verdict;

pub use filter::{filter_fn, FilterResponse, FnFilter, RequestDetails, RequestFilter};
pub use gate::{FrameResolver, Gate, LoadRequest, ResolutionError};
pub use resource::{ResourceType, HOST_TYPE_CODES, TYPE_DOCUMENT};
pub use verdict::Verdict;

pub use portway_proto::TabId;
