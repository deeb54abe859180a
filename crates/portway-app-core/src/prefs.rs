// SPDX-License-Identifier: Apache-2.0
//! Saved coordinator settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Config key [`HostPrefs`] is stored under.
pub const HOST_PREFS_KEY: &str = "portway_host";

/// Default cap on a single frame payload (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;

/// Settings for the coordinator service.
///
/// Fields missing from a stored blob take their defaults, so older files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPrefs {
    /// Unix socket to listen on; `None` uses the runtime-dir default.
    pub socket_path: Option<PathBuf>,
    /// Lowercase application name used for channel names.
    pub app_name: String,
    /// Largest accepted frame payload, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for HostPrefs {
    fn default() -> Self {
        Self {
            socket_path: None,
            app_name: "portway".to_owned(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_blob_fills_defaults() {
        let prefs: HostPrefs = serde_json::from_str(r#"{"max_frame_bytes": 4096}"#).unwrap();
        assert_eq!(prefs.max_frame_bytes, 4096);
        assert_eq!(prefs.app_name, "portway");
        assert_eq!(prefs.socket_path, None);
    }
}
