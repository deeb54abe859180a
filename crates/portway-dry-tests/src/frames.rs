// SPDX-License-Identifier: Apache-2.0
//! Fake window/tab hierarchy for gate tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use portway_gate::{FrameResolver, ResolutionError};
use portway_proto::TabId;

/// A browsing context as the fake host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeWindow {
    /// Whether this is the tab's top-level frame.
    pub top_level: bool,
    /// Tab hosting the window; `None` for windows outside any tab.
    pub tab: Option<TabId>,
    /// Make tab resolution fail.
    pub tab_lookup_fails: bool,
}

impl FakeWindow {
    /// Top-level frame of `tab`.
    pub fn top(tab: &str) -> Self {
        Self {
            top_level: true,
            tab: Some(TabId(tab.to_owned())),
            tab_lookup_fails: false,
        }
    }

    /// Nested frame inside `tab`.
    pub fn nested(tab: &str) -> Self {
        Self {
            top_level: false,
            ..Self::top(tab)
        }
    }

    /// Window with no owning tab (e.g. a hidden system window).
    pub fn detached() -> Self {
        Self {
            top_level: true,
            tab: None,
            tab_lookup_fails: false,
        }
    }

    /// Window whose tab lookup errors.
    pub fn broken() -> Self {
        Self {
            tab_lookup_fails: true,
            ..Self::detached()
        }
    }
}

/// The element or document that triggered a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeContext {
    /// Lives in this window.
    In(FakeWindow),
    /// Has no owning window.
    Orphan,
    /// Window lookup errors.
    Broken,
}

/// [`FrameResolver`] over [`FakeContext`] values; counts window lookups.
#[derive(Debug, Default)]
pub struct FakeFrames {
    lookups: AtomicUsize,
}

impl FakeFrames {
    /// Fresh resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the gate asked for an owning window.
    pub fn window_lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl FrameResolver for FakeFrames {
    type Context = FakeContext;
    type Window = FakeWindow;

    fn owning_window(&self, context: &FakeContext) -> Result<Option<FakeWindow>, ResolutionError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        match context {
            FakeContext::In(window) => Ok(Some(window.clone())),
            FakeContext::Orphan => Ok(None),
            FakeContext::Broken => Err(ResolutionError::Window("fake lookup failure".into())),
        }
    }

    fn is_top_level(&self, window: &FakeWindow) -> bool {
        window.top_level
    }

    fn top_level_tab(&self, window: &FakeWindow) -> Result<Option<TabId>, ResolutionError> {
        if window.tab_lookup_fails {
            return Err(ResolutionError::Browser("fake browser failure".into()));
        }
        Ok(window.tab.clone())
    }
}
