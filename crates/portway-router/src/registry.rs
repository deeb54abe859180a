// SPDX-License-Identifier: Apache-2.0
//! Logical port → handler table with a single fallback.

use std::collections::HashMap;

use tracing::debug;

use crate::handler::Handler;

/// Maps logical port names to handlers.
///
/// One handler per port; registering again replaces the previous handler.
/// At most one default handler is active at a time.
#[derive(Default)]
pub struct PortRegistry {
    ports: HashMap<String, Box<dyn Handler>>,
    default: Option<Box<dyn Handler>>,
}

impl PortRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `port`, replacing any existing one.
    pub fn register(&mut self, port: impl Into<String>, handler: Box<dyn Handler>) {
        let port = port.into();
        if self.ports.insert(port.clone(), handler).is_some() {
            debug!(port = %port, "replaced port handler");
        }
    }

    /// Drop the handler for `port`. Unknown ports are ignored.
    pub fn unregister(&mut self, port: &str) {
        self.ports.remove(port);
    }

    /// Handler registered for `port`.
    pub fn lookup(&self, port: &str) -> Option<&dyn Handler> {
        self.ports.get(port).map(|handler| &**handler)
    }

    /// Install the default handler.
    ///
    /// Returns `false` and keeps the existing one when a default is already
    /// active, so repeated setup during re-initialization is harmless.
    pub fn set_default_handler(&mut self, handler: Box<dyn Handler>) -> bool {
        if self.default.is_some() {
            debug!("default handler already installed; ignoring");
            return false;
        }
        self.default = Some(handler);
        true
    }

    /// The active default handler.
    pub fn default_handler(&self) -> Option<&dyn Handler> {
        self.default.as_deref()
    }

    /// Whether a default handler is installed.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Registered port names, sorted.
    pub fn ports(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Drop every handler, including the default.
    pub fn clear(&mut self) {
        self.ports.clear();
        self.default = None;
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistry")
            .field("ports", &self.ports())
            .field("has_default", &self.has_default())
            .finish()
    }
}
