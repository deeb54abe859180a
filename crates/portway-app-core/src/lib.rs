// SPDX-License-Identifier: Apache-2.0
//! Application services shared by the Portway service and tools.
//!
//! [`config`] persists JSON blobs behind a storage port so adapters stay thin;
//! [`prefs`] holds the coordinator's saved settings.

pub mod config;
pub mod prefs;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use prefs::{HostPrefs, DEFAULT_MAX_FRAME_BYTES, HOST_PREFS_KEY};
