//! Trust boundary for toast text.
//!
//! Toast text is markup. The queue never renders it; it only stores the output of a
//! [`Sanitizer`] as [`Trusted`] and compares that output when filtering duplicates.

use std::fmt;

/// Markup that went through a [`Sanitizer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trusted(String);

impl Trusted {
    /// Wraps `markup` without cleaning it.
    ///
    /// This bypasses sanitization. It exists for [`Sanitizer`] implementations, which
    /// must only pass markup they have already cleaned.
    pub fn new_unchecked(markup: String) -> Self {
        Self(markup)
    }

    /// Returns the underlying markup.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Trusted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts raw caller text into [`Trusted`] markup.
pub trait Sanitizer: Send {
    /// Cleans `raw` for rendering.
    fn sanitize(&self, raw: &str) -> Trusted;
}

/// Strips scripts, event handlers and unknown tags using `ammonia`'s default allowlist.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSanitizer;

impl Sanitizer for HtmlSanitizer {
    fn sanitize(&self, raw: &str) -> Trusted {
        Trusted::new_unchecked(ammonia::clean(raw))
    }
}

/// Trusts text as-is. For hosts that already sanitize upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSanitizer;

impl Sanitizer for PassthroughSanitizer {
    fn sanitize(&self, raw: &str) -> Trusted {
        Trusted::new_unchecked(raw.to_string())
    }
}
