// SPDX-License-Identifier: Apache-2.0
//! Gate decisions.

/// What the host must do with a candidate load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the load proceed.
    Accept,
    /// Reject the load outright.
    Reject,
    /// Reject the original load and start a new one at this location.
    ///
    /// Never rewrite the original request in place: the replacement must go
    /// through the host's own redirect/loop protection.
    Redirect(String),
}

impl Verdict {
    /// Whether the original load proceeds.
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// Whether the original load is rejected (blocked or redirected).
    pub fn is_reject(&self) -> bool {
        !self.is_accept()
    }

    /// Replacement location for a redirect.
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Verdict::Redirect(location) => Some(location),
            _ => None,
        }
    }
}
