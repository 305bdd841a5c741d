//! Mention Detection
//!
//! Lets the agent respond in group chats only when addressed. Only the
//! `@handle` form counts as a mention; a handle appearing as plain text
//! (for example inside a URL) does not.

use anyhow::{Context, Result};
use regex::Regex;

/// Detects and strips `@handle` mentions for a configured set of aliases.
pub struct MentionGate {
    pattern: Regex,
}

impl MentionGate {
    /// Build the gate from a handle alias set. Matching is case-insensitive
    /// and anchored on start-of-string or whitespace before the `@`.
    ///
    /// An empty handle set is rejected: the alternation would collapse to an
    /// empty group and match every `@`-prefixed word.
    pub fn new(handles: &[String]) -> Result<Self> {
        if handles.is_empty() {
            anyhow::bail!("Mention detection requires at least one handle");
        }
        let alternatives = handles
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)(^|\s)@\s*(?:{})\b", alternatives))
            .context("Failed to build mention pattern from configured handles")?;
        Ok(Self { pattern })
    }

    /// Whether the message addresses the agent.
    pub fn is_mentioned(&self, text: &str) -> bool {
        !text.is_empty() && self.pattern.is_match(text)
    }

    /// Remove the mention span, collapsing the surrounding whitespace to a
    /// single space and trimming the ends.
    pub fn strip_mention(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let replaced = self.pattern.replace_all(text, " ");
        replaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
