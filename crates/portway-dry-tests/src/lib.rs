// SPDX-License-Identifier: Apache-2.0
//! Shared test doubles and fixtures for Portway crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`envelopes`] - Wire envelope builders for router input
//! - [`filters`] - Recording request filter for gate tests
//! - [`frames`] - Fake window/tab hierarchy implementing `FrameResolver`
//! - [`tabs`] - Static `TabDirectory`
//! - [`transport`] - Recording `Transport` that captures every outbound frame

pub mod config;
pub mod envelopes;
pub mod filters;
pub mod frames;
pub mod tabs;
pub mod transport;

// Re-export commonly used items at crate root for convenience
pub use config::InMemoryConfigStore;
pub use envelopes::{inbound, request_bytes};
pub use filters::{RecordedRequest, RecordingFilter};
pub use frames::{FakeContext, FakeFrames, FakeWindow};
pub use tabs::StaticTabDirectory;
pub use transport::{RecordingTransport, Sent};
