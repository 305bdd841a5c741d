//! Copy-Suggestion Content Type
//!
//! A small custom content type attached to outbound messages so capable
//! clients can render a one-click copy button. Clients that do not know the
//! type fall back to the raw copy text.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const AUTHORITY_ID: &str = "songcast.xyz";
const TYPE_ID: &str = "copy-suggestion";
const VERSION_MAJOR: u32 = 1;
const VERSION_MINOR: u32 = 0;

/// The structured payload: a button label and the text to copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySuggestion {
    pub label: String,
    pub text: String,
}

/// Content-type identity tuple. Two identities are the same when the four
/// identity fields match; any extra fields a peer attaches are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeId {
    pub authority_id: String,
    pub type_id: String,
    pub version_major: u32,
    pub version_minor: u32,
}

impl ContentTypeId {
    pub fn same_as(&self, other: &ContentTypeId) -> bool {
        self.authority_id == other.authority_id
            && self.type_id == other.type_id
            && self.version_major == other.version_major
            && self.version_minor == other.version_minor
    }
}

/// The copy-suggestion content-type identity.
pub static CONTENT_TYPE_COPY_SUGGESTION: LazyLock<ContentTypeId> = LazyLock::new(|| ContentTypeId {
    authority_id: AUTHORITY_ID.to_string(),
    type_id: TYPE_ID.to_string(),
    version_major: VERSION_MAJOR,
    version_minor: VERSION_MINOR,
});

/// Codec for the copy-suggestion payload. Encoding is plain JSON bytes;
/// version negotiation beyond the identity tuple is the consuming client's
/// responsibility.
pub struct CopySuggestionCodec;

impl CopySuggestionCodec {
    pub fn content_type(&self) -> &'static ContentTypeId {
        &CONTENT_TYPE_COPY_SUGGESTION
    }

    /// Whether push notifications should fire for this content type.
    pub fn should_push(&self) -> bool {
        true
    }

    pub fn encode(&self, content: &CopySuggestion) -> Result<Vec<u8>> {
        serde_json::to_vec(content).context("Failed to encode copy suggestion")
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<CopySuggestion> {
        serde_json::from_slice(bytes).context("Failed to decode copy suggestion")
    }

    /// Plain-text rendering for clients that cannot display the button.
    pub fn fallback(&self, content: &CopySuggestion) -> String {
        content.text.clone()
    }
}
