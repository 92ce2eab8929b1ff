use super::headers::Headers;

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Retrieve with body.
    Get,
    /// Retrieve metadata only.
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// A fully built request: target, method and every header to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub url:     String,
    pub method:  Method,
    pub headers: Headers,
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status:  u16,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: u16, headers: Headers) -> Self { Self { status, headers } }
}
