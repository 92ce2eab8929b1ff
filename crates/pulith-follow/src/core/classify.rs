use crate::data::Headers;

/// How the reader treats a response, derived from its status code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 200-299: the body (or probe metadata) describes the resource.
    Data,
    /// 304: nothing changed since the fingerprint we sent.
    NotModified,
    /// 416: the server cannot serve bytes from our offset.
    RangeNotSatisfiable,
    /// Anything else. Polled through unless a retry bound is configured.
    Unexpected,
}

/// Classify an HTTP status code.
///
/// # Examples
///
/// ```
/// use pulith_follow::{Disposition, classify_status};
///
/// assert_eq!(classify_status(206), Disposition::Data);
/// assert_eq!(classify_status(304), Disposition::NotModified);
/// assert_eq!(classify_status(503), Disposition::Unexpected);
/// ```
pub fn classify_status(status: u16) -> Disposition {
    match status {
        200..=299 => Disposition::Data,
        304 => Disposition::NotModified,
        416 => Disposition::RangeNotSatisfiable,
        _ => Disposition::Unexpected,
    }
}

/// Parse the `Content-Length` header, if present and well formed.
pub fn content_length(headers: &Headers) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range_is_data() {
        for code in [200, 201, 204, 206, 226, 299] {
            assert_eq!(classify_status(code), Disposition::Data, "{code}");
        }
    }

    #[test]
    fn test_not_modified() {
        assert_eq!(classify_status(304), Disposition::NotModified);
    }

    #[test]
    fn test_range_not_satisfiable() {
        assert_eq!(classify_status(416), Disposition::RangeNotSatisfiable);
    }

    #[test]
    fn test_everything_else_is_unexpected() {
        let codes = [
            100, 101, 199, 300, 301, 302, 303, 305, 307, 308, 400, 401, 403, 404, 409, 412, 429,
            500, 502, 503, 504, 600,
        ];
        for code in codes {
            assert_eq!(classify_status(code), Disposition::Unexpected, "{code}");
        }
    }

    #[test]
    fn test_content_length() {
        assert_eq!(content_length(&Headers::new().with("Content-Length", "150")), Some(150));
        assert_eq!(content_length(&Headers::new().with("content-length", " 0 ")), Some(0));
        assert_eq!(content_length(&Headers::new().with("content-length", "-1")), None);
        assert_eq!(content_length(&Headers::new().with("content-length", "abc")), None);
        assert_eq!(content_length(&Headers::new()), None);
    }
}
