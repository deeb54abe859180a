// SPDX-License-Identifier: Apache-2.0
//! Host resource codes and the canonical resource-type vocabulary.

use serde::{Deserialize, Serialize};

/// Host code for a top-level document load. Never filtered.
pub const TYPE_DOCUMENT: u32 = 6;

/// Host codes the gate arbitrates, in registration order.
pub const HOST_TYPE_CODES: [u32; 6] = [7, 4, 2, 3, 5, 11];

/// Canonical resource type handed to filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Nested document (iframe/frame).
    SubFrame,
    /// CSS.
    Stylesheet,
    /// JavaScript.
    Script,
    /// Images.
    Image,
    /// Plugin content.
    Object,
    /// XHR / fetch.
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    /// Anything without a dedicated bucket.
    Other,
}

impl ResourceType {
    /// Normalize a host resource code; unknown codes map to [`ResourceType::Other`].
    pub fn from_host_code(code: u32) -> Self {
        match code {
            7 => ResourceType::SubFrame,
            4 => ResourceType::Stylesheet,
            2 => ResourceType::Script,
            3 => ResourceType::Image,
            5 => ResourceType::Object,
            11 => ResourceType::XmlHttpRequest,
            _ => ResourceType::Other,
        }
    }

    /// Host code for this type, if it has a dedicated one.
    pub fn host_code(self) -> Option<u32> {
        match self {
            ResourceType::SubFrame => Some(7),
            ResourceType::Stylesheet => Some(4),
            ResourceType::Script => Some(2),
            ResourceType::Image => Some(3),
            ResourceType::Object => Some(5),
            ResourceType::XmlHttpRequest => Some(11),
            ResourceType::Other => None,
        }
    }

    /// Canonical name, as filters see it.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Object => "object",
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn host_codes_round_trip() {
        for code in HOST_TYPE_CODES {
            assert_eq!(ResourceType::from_host_code(code).host_code(), Some(code));
        }
    }

    #[test]
    fn unknown_codes_are_other() {
        assert_eq!(ResourceType::from_host_code(0), ResourceType::Other);
        assert_eq!(ResourceType::from_host_code(TYPE_DOCUMENT), ResourceType::Other);
        assert_eq!(ResourceType::from_host_code(999), ResourceType::Other);
    }

    #[test]
    fn serde_names_match_display() {
        for ty in [
            ResourceType::SubFrame,
            ResourceType::XmlHttpRequest,
            ResourceType::Other,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
        }
    }
}
