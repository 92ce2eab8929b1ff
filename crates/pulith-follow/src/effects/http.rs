use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use crate::data::{RequestOptions, ResponseHead};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Response of a body-returning request.
pub struct FetchResponse<E> {
    pub head: ResponseHead,
    pub body: BoxStream<'static, std::result::Result<Bytes, E>>,
}

impl<E> FetchResponse<E> {
    pub fn new(head: ResponseHead, body: BoxStream<'static, std::result::Result<Bytes, E>>) -> Self {
        Self { head, body }
    }
}

impl<E> std::fmt::Debug for FetchResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("head", &self.head)
            .field("body", &"{ ... }")
            .finish()
    }
}

/// Asynchronous HTTP transport used by the reader.
///
/// Implementations return every response, whatever its status; deciding what
/// a 304 or a 404 means is left to the caller. Only failures to obtain a
/// response at all (DNS, connect, reset, timeout) are errors.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Scripted implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for transport failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a body-returning request described by `request`.
    fn fetch(
        &self,
        request: &RequestOptions,
    ) -> impl Future<Output = std::result::Result<FetchResponse<Self::Error>, Self::Error>> + Send;

    /// Issue a metadata-only request described by `request`.
    ///
    /// The reported `Content-Length` is the length of the resource, not of a
    /// (nonexistent) body.
    fn probe(
        &self,
        request: &RequestOptions,
    ) -> impl Future<Output = std::result::Result<ResponseHead, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::data::{Headers, Method};

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default configuration.
        pub fn new() -> Self { Self::default() }

        /// Wrap an already configured `reqwest::Client`.
        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }

        fn request(&self, request: &RequestOptions) -> reqwest::RequestBuilder {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Head => reqwest::Method::HEAD,
            };
            let mut builder = self.client.request(method, &request.url);
            for (key, value) in request.headers.iter() {
                builder = builder.header(key, value);
            }
            builder
        }

        fn head_of(response: &reqwest::Response) -> ResponseHead {
            // Content-Length is taken from the header map: for HEAD the body
            // size hint is zero.
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
                .collect();
            ResponseHead::new(response.status().as_u16(), headers)
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn fetch(
            &self,
            request: &RequestOptions,
        ) -> std::result::Result<FetchResponse<Self::Error>, Self::Error> {
            let response = self.request(request).send().await?;
            let head = Self::head_of(&response);
            Ok(FetchResponse::new(head, Box::pin(response.bytes_stream())))
        }

        async fn probe(&self, request: &RequestOptions) -> std::result::Result<ResponseHead, Self::Error> {
            let response = self.request(request).send().await?;
            Ok(Self::head_of(&response))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
