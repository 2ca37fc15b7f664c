use std::{fmt, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the group used when a caller does not pick one.
pub const DEFAULT_GROUP: &str = "default";

/// Severity of a toast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operation completed.
    Success,
    /// Operation failed.
    Error,
    /// Informational message.
    Info,
    /// Something needs attention.
    Warning,
}

impl Severity {
    /// Lowercase label, as used in configuration files.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }

    /// Title shown when a toast does not carry one of its own.
    pub fn default_title(self) -> &'static str {
        match self {
            Severity::Success => "Success",
            Severity::Error => "Error",
            Severity::Info => "Information",
            Severity::Warning => "Warning",
        }
    }

    /// Parses a label case-insensitively. `warn` is accepted for `warning`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Severity::Success),
            "error" => Some(Severity::Error),
            "info" => Some(Severity::Info),
            "warning" | "warn" => Some(Severity::Warning),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Key of a display group. Every key is valid; an empty key is the default group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct GroupKey(String);

impl GroupKey {
    /// Creates a key, mapping an empty name to [`DEFAULT_GROUP`].
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self::default()
        } else {
            Self(name)
        }
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the shared default group.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_GROUP
    }
}

impl Default for GroupKey {
    fn default() -> Self {
        Self(DEFAULT_GROUP.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<GroupKey> for String {
    fn from(value: GroupKey) -> Self {
        value.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an accepted toast, unique within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Time-to-live of a toast.
///
/// On the wire this is a number of milliseconds; `-1`, zero, negative, non-finite and
/// non-numeric values all mean [`Ttl::Never`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Stays until removed explicitly.
    #[default]
    Never,
    /// Removed automatically after the duration.
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a millisecond count, tolerating garbage.
    pub fn from_millis(millis: f64) -> Self {
        if !millis.is_finite() || millis <= 0.0 {
            return Ttl::Never;
        }

        match Duration::try_from_secs_f64(millis / 1000.0) {
            Ok(duration) if !duration.is_zero() => Ttl::After(duration),
            _ => Ttl::Never,
        }
    }

    /// Returns the auto-dismiss delay, if any.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::After(duration) => Some(duration),
        }
    }

    /// Returns `true` when the toast dismisses itself.
    pub fn is_positive(self) -> bool {
        matches!(self, Ttl::After(_))
    }

    /// Milliseconds, with `-1` for [`Ttl::Never`].
    pub fn as_millis(self) -> i64 {
        match self {
            Ttl::Never => -1,
            Ttl::After(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(value: Duration) -> Self {
        if value.is_zero() {
            Ttl::Never
        } else {
            Ttl::After(value)
        }
    }
}

impl Serialize for Ttl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_millis())
    }
}

impl<'de> Deserialize<'de> for Ttl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTtl {
            Int(i64),
            Float(f64),
            Other(serde::de::IgnoredAny),
        }

        Ok(match RawTtl::deserialize(deserializer)? {
            RawTtl::Int(millis) => Ttl::from_millis(millis as f64),
            RawTtl::Float(millis) => Ttl::from_millis(millis),
            RawTtl::Other(_) => Ttl::Never,
        })
    }
}

/// Caller-supplied presentation flags. The queue only reads `disable_countdown` and
/// `click_to_close`; the rest is passed through to renderers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DisplayFlags {
    /// Hide the severity icon.
    pub disable_icons: bool,
    /// Hide the close button.
    pub disable_close_button: bool,
    /// Hide the seconds-left counter.
    pub disable_countdown: bool,
    /// Clicking the body does not pause or close the toast.
    pub click_to_close: bool,
}

/// Why a toast left its queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CloseReason {
    /// The dismiss timer fired.
    Expired,
    /// Removed on request (close button, second click, API call).
    Dismissed,
    /// Pushed out by a newer toast or a smaller capacity.
    Evicted,
    /// Removed by a destroy-all of its group.
    Destroyed,
}

/// Read-only copy of a live toast, as handed to renderers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToastSnapshot {
    /// Toast id.
    pub id: MessageId,
    /// Owning group.
    pub group: GroupKey,
    /// Severity, if any.
    pub severity: Option<Severity>,
    /// Explicit title, or the severity's default title.
    pub title: Option<String>,
    /// Sanitized markup.
    pub text: String,
    /// Seconds left, for toasts with a TTL. May be fractional.
    pub countdown: Option<f64>,
    /// Whether the counter should be drawn.
    pub show_countdown: bool,
    /// Presentation flags.
    pub flags: DisplayFlags,
    /// The toast has started closing (first click or removal in progress).
    pub closing: bool,
}

/// Direction in which a group's toasts are read back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewOrder {
    /// Oldest first.
    #[default]
    Insertion,
    /// Newest first.
    Reverse,
}

/// Lifecycle event published by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToastEvent {
    /// A toast was accepted and is visible.
    Opened {
        /// State right after acceptance.
        snapshot: Box<ToastSnapshot>,
    },
    /// A toast left its queue.
    Closed {
        /// Closed toast id.
        id: MessageId,
        /// Group it belonged to.
        group: GroupKey,
        /// Why it closed.
        reason: CloseReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        ttl: Ttl,
    }

    fn ttl_from_toml(raw: &str) -> Ttl {
        toml::from_str::<Holder>(raw).unwrap().ttl
    }

    #[test]
    fn ttl_accepts_integer_and_float_millis() {
        assert_eq!(
            ttl_from_toml("ttl = 5000"),
            Ttl::After(Duration::from_secs(5))
        );
        assert_eq!(
            ttl_from_toml("ttl = 1500.0"),
            Ttl::After(Duration::from_millis(1500))
        );
    }

    #[test]
    fn ttl_treats_garbage_as_never() {
        assert_eq!(ttl_from_toml("ttl = -1"), Ttl::Never);
        assert_eq!(ttl_from_toml("ttl = 0"), Ttl::Never);
        assert_eq!(ttl_from_toml("ttl = \"soon\""), Ttl::Never);
        assert_eq!(ttl_from_toml("ttl = nan"), Ttl::Never);
        assert_eq!(ttl_from_toml("ttl = inf"), Ttl::Never);
        assert_eq!(Ttl::from_millis(f64::MAX), Ttl::Never);
    }

    #[test]
    fn ttl_reports_minus_one_for_never() {
        assert_eq!(Ttl::Never.as_millis(), -1);
        assert_eq!(Ttl::from_millis(250.0).as_millis(), 250);
    }

    #[test]
    fn empty_group_key_is_default() {
        assert_eq!(GroupKey::new(""), GroupKey::default());
        assert!(GroupKey::from("").is_default());
        assert_eq!(GroupKey::from("sidebar").as_str(), "sidebar");
    }

    #[test]
    fn severity_parse_accepts_warn_alias() {
        assert_eq!(Severity::parse("WARN"), Some(Severity::Warning));
        assert_eq!(Severity::parse(" error "), Some(Severity::Error));
        assert_eq!(Severity::parse("fatal"), None);
        assert_eq!(Severity::Info.default_title(), "Information");
    }
}
