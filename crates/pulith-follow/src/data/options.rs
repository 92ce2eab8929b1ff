use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::headers::Headers;

/// Header set by blob storage once a log will receive no further bytes.
pub const DEFAULT_COMPLETE_HEADER: &str = "x-ms-meta-complete";

/// Default delay between polls when no new data is available.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// How the reader waits for the resource to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Re-issue the conditional ranged GET after every interval.
    ///
    /// An unchanged resource answers with `304 Not Modified`, so each poll
    /// costs one round trip and no body.
    #[default]
    Refetch,

    /// Issue a HEAD probe after every interval and only fetch once the
    /// reported length exceeds the current offset.
    Probe,
}

impl std::fmt::Display for PollMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollMode::Refetch => write!(f, "refetch"),
            PollMode::Probe => write!(f, "probe"),
        }
    }
}

/// Configuration for a [`PollingReader`](crate::PollingReader).
///
/// # Examples
///
/// ```
/// use pulith_follow::{FollowOptions, PollMode};
/// use std::time::Duration;
///
/// let options = FollowOptions::default()
///     .interval(Duration::from_millis(250))
///     .poll_mode(PollMode::Probe)
///     .header("User-Agent", "pulith/0.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowOptions {
    /// Response header whose presence marks the resource as complete.
    ///
    /// Default: `x-ms-meta-complete`
    pub complete_header: String,

    /// Fixed delay between polls while no new data is available.
    ///
    /// Default: 100ms
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,

    /// Custom HTTP headers sent with every request.
    ///
    /// Default: empty
    pub headers: Headers,

    /// Change detection strategy used while waiting.
    ///
    /// Default: [`PollMode::Refetch`]
    pub poll_mode: PollMode,

    /// Number of consecutive unexpected statuses (neither 2xx nor 304)
    /// tolerated before the stream fails.
    ///
    /// `None` keeps polling through them indefinitely.
    ///
    /// Default: `None`
    pub max_status_retries: Option<u32>,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            complete_header:    DEFAULT_COMPLETE_HEADER.to_string(),
            interval:           DEFAULT_INTERVAL,
            headers:            Headers::new(),
            poll_mode:          PollMode::default(),
            max_status_retries: None,
        }
    }
}

impl FollowOptions {
    /// Set the completion marker header name.
    #[must_use]
    pub fn complete_header(mut self, name: impl Into<String>) -> Self {
        self.complete_header = name.into();
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Add a single custom HTTP header.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all custom HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the change detection strategy.
    #[must_use]
    pub fn poll_mode(mut self, poll_mode: PollMode) -> Self {
        self.poll_mode = poll_mode;
        self
    }

    /// Bound the number of consecutive unexpected statuses.
    #[must_use]
    pub fn max_status_retries(mut self, max: Option<u32>) -> Self {
        self.max_status_retries = max;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
