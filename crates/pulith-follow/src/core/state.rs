use crate::data::{Headers, Method, RequestOptions};

/// Progress record for a single followed resource.
///
/// Tracks how many bytes were delivered, the fingerprint of that content and
/// whether the server declared the resource complete. Request descriptors are
/// derived from it without side effects; only the reader mutates it, after a
/// response has been processed.
#[derive(Debug, Clone)]
pub struct FetchState {
    url:      String,
    headers:  Headers,
    offset:   u64,
    etag:     Option<String>,
    complete: bool,
}

impl FetchState {
    pub fn new(url: impl Into<String>, headers: Headers) -> Self {
        Self {
            url: url.into(),
            headers,
            offset: 0,
            etag: None,
            complete: false,
        }
    }

    pub fn url(&self) -> &str { &self.url }

    pub fn headers(&self) -> &Headers { &self.headers }

    pub fn offset(&self) -> u64 { self.offset }

    pub fn etag(&self) -> Option<&str> { self.etag.as_deref() }

    pub fn is_complete(&self) -> bool { self.complete }

    /// Request descriptor for fetching bytes past the current offset.
    ///
    /// Sends `If-None-Match` once a fingerprint is known and
    /// `Range: bytes=<offset>-` once any bytes were delivered.
    pub fn build_fetch_options(&self, extra: &Headers) -> RequestOptions {
        let mut headers = self.conditional_headers(extra);
        if self.offset > 0 {
            headers.insert("Range", format!("bytes={}-", self.offset));
        }
        RequestOptions {
            url: self.url.clone(),
            method: Method::Get,
            headers,
        }
    }

    /// Request descriptor for a metadata-only change probe.
    ///
    /// Never carries a range: the probe asks for the length of the whole
    /// resource as it currently stands.
    pub fn build_probe_options(&self, extra: &Headers) -> RequestOptions {
        RequestOptions {
            url:     self.url.clone(),
            method:  Method::Head,
            headers: self.conditional_headers(extra),
        }
    }

    /// Flips `complete` when `headers` carry a non-empty `completion_header`.
    ///
    /// Returns whether the marker was present. Absent markers leave the state
    /// untouched, so calling this on every response is safe.
    pub fn mark_complete_if_signaled(&mut self, headers: &Headers, completion_header: &str) -> bool {
        if !is_truthy(headers.get(completion_header)) {
            return false;
        }
        self.complete = true;
        true
    }

    /// Advance the offset by `len` delivered bytes.
    pub fn record_bytes(&mut self, len: u64) { self.offset = self.offset.saturating_add(len); }

    /// Replace the fingerprint after new bytes were fetched.
    pub fn record_etag(&mut self, etag: Option<String>) { self.etag = etag; }

    fn conditional_headers(&self, extra: &Headers) -> Headers {
        let mut headers = self.headers.merged(extra);
        if let Some(etag) = &self.etag {
            headers.insert("If-None-Match", etag.clone());
        }
        headers
    }
}

/// Any non-blank value counts, including `0` and `false`.
fn is_truthy(value: Option<&str>) -> bool { value.is_some_and(|v| !v.trim().is_empty()) }

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "x-ms-meta-complete";

    fn state() -> FetchState {
        FetchState::new(
            "http://localhost/log",
            Headers::new().with("User-Agent", "pulith"),
        )
    }

    #[test]
    fn test_initial_fetch_has_no_conditions() {
        let options = state().build_fetch_options(&Headers::new());

        assert_eq!(options.method, Method::Get);
        assert_eq!(options.url, "http://localhost/log");
        assert_eq!(options.headers.get("user-agent"), Some("pulith"));
        assert!(!options.headers.contains("if-none-match"));
        assert!(!options.headers.contains("range"));
    }

    #[test]
    fn test_fetch_reflects_progress() {
        let mut state = state();
        state.record_bytes(100);
        state.record_etag(Some("\"v1\"".to_string()));

        let options = state.build_fetch_options(&Headers::new().with("X-Request", "7"));

        assert_eq!(options.headers.get("if-none-match"), Some("\"v1\""));
        assert_eq!(options.headers.get("range"), Some("bytes=100-"));
        assert_eq!(options.headers.get("x-request"), Some("7"));
        assert_eq!(options.headers.get("user-agent"), Some("pulith"));
    }

    #[test]
    fn test_probe_never_ranges() {
        let mut state = state();
        state.record_bytes(42);
        state.record_etag(Some("abc".to_string()));

        let options = state.build_probe_options(&Headers::new());

        assert_eq!(options.method, Method::Head);
        assert_eq!(options.headers.get("if-none-match"), Some("abc"));
        assert!(!options.headers.contains("range"));
    }

    #[test]
    fn test_build_does_not_mutate_custom_headers() {
        let mut state = state();
        state.record_etag(Some("abc".to_string()));
        let _ = state.build_fetch_options(&Headers::new().with("X-Extra", "1"));

        assert_eq!(state.headers().len(), 1);
        assert!(!state.headers().contains("if-none-match"));
    }

    #[test]
    fn test_mark_complete_if_signaled() {
        let mut state = state();

        assert!(!state.mark_complete_if_signaled(&Headers::new(), MARKER));
        assert!(!state.is_complete());

        let headers = Headers::new().with("X-Ms-Meta-Complete", "1");
        assert!(state.mark_complete_if_signaled(&headers, MARKER));
        assert!(state.is_complete());

        // idempotent, and a later absent marker never un-completes
        assert!(state.mark_complete_if_signaled(&headers, MARKER));
        assert!(!state.mark_complete_if_signaled(&Headers::new(), MARKER));
        assert!(state.is_complete());
    }

    #[test]
    fn test_marker_values() {
        for value in ["", "  "] {
            let mut state = state();
            let headers = Headers::new().with(MARKER, value);
            assert!(!state.mark_complete_if_signaled(&headers, MARKER), "{value:?}");
            assert!(!state.is_complete());
        }
        for value in ["1", "true", "yes", "0", "false", "FALSE"] {
            let mut state = state();
            let headers = Headers::new().with(MARKER, value);
            assert!(state.mark_complete_if_signaled(&headers, MARKER), "{value:?}");
        }
    }

    #[test]
    fn test_offset_is_monotonic() {
        let mut state = state();
        state.record_bytes(10);
        state.record_bytes(0);
        state.record_bytes(5);
        assert_eq!(state.offset(), 15);

        state.record_bytes(u64::MAX);
        assert_eq!(state.offset(), u64::MAX);
    }
}
