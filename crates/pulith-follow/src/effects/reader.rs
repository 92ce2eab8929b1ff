//! Polling reader over a growing remote resource.
//!
//! [`PollingReader`] is a pull-based [`Stream`] of byte chunks. Each poll
//! advances one explicit state machine with two event sources: the single
//! in-flight HTTP request and the single pending poll timer. The two are
//! variants of the same enum, so they can never coexist.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::FusedStream;
use futures_util::{Stream, StreamExt};
use tokio::time::Sleep;
use tracing::{debug, trace, warn};

use crate::core::{Disposition, FetchState, classify_status, content_length};
use crate::data::{FollowOptions, Headers, PollMode, ResponseHead};
use crate::effects::http::{BoxStream, FetchResponse, HttpClient};
use crate::error::{FollowError, Result};

type Pending<T, E> = Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send>>;

/// Observable state of a [`PollingReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No request in flight, no timer armed.
    Idle,
    /// A fetch is in flight or its body is being delivered.
    Requesting,
    /// Waiting for the poll timer, or for a probe to answer.
    Waiting,
    /// Terminal: completed or cancelled.
    Done,
    /// Terminal: an error was yielded.
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Requesting => write!(f, "Requesting"),
            EngineState::Waiting => write!(f, "Waiting"),
            EngineState::Done => write!(f, "Done"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Body of a 2xx response being forwarded downstream.
struct Body<E> {
    head:      ResponseHead,
    stream:    BoxStream<'static, std::result::Result<Bytes, E>>,
    /// Leading bytes already delivered by an earlier response.
    skip:      u64,
    expected:  Option<u64>,
    received:  u64,
    forwarded: u64,
}

impl<E> Body<E> {
    fn accept(&mut self, mut chunk: Bytes) -> Option<Bytes> {
        self.received += chunk.len() as u64;
        if self.skip > 0 {
            let n = self.skip.min(chunk.len() as u64);
            self.skip -= n;
            chunk = chunk.slice(n as usize..);
        }
        if chunk.is_empty() {
            return None;
        }
        self.forwarded += chunk.len() as u64;
        Some(chunk)
    }
}

enum Phase<E> {
    Idle,
    Requesting(Pending<FetchResponse<E>, E>),
    Streaming(Body<E>),
    Draining {
        head: ResponseHead,
        body: BoxStream<'static, std::result::Result<Bytes, E>>,
    },
    Waiting(Pin<Box<Sleep>>),
    Probing(Pending<ResponseHead, E>),
    Done,
    Failed,
}

/// Byte stream over a remote append-only resource.
///
/// Starts at the first byte, never yields a byte twice, polls through
/// `304 Not Modified` answers and ends once a response carries the
/// completion marker header.
///
/// Nothing is read ahead: the next request is only issued when the consumer
/// polls after the previous body was fully delivered. Dropping the reader, or
/// calling [`PollingReader::cancel`], drops the pending timer and any
/// in-flight request.
///
/// # Examples
///
/// ```no_run
/// use futures_util::StreamExt;
/// use pulith_follow::{FollowOptions, PollingReader, ReqwestClient};
///
/// # async fn run() -> pulith_follow::Result<()> {
/// let mut reader = PollingReader::with_options(
///     ReqwestClient::new(),
///     "https://logs.example.com/task/live.log",
///     FollowOptions::default(),
/// )?;
///
/// while let Some(chunk) = reader.next().await {
///     print!("{}", String::from_utf8_lossy(&chunk?));
/// }
/// # Ok(())
/// # }
/// ```
pub struct PollingReader<C: HttpClient> {
    client:          Arc<C>,
    state:           FetchState,
    options:         FollowOptions,
    phase:           Phase<C::Error>,
    status_failures: u32,
}

impl<C: HttpClient + 'static> PollingReader<C> {
    /// Follow `url` with default options.
    pub fn new(client: C, url: impl Into<String>) -> Result<Self> {
        Self::with_options(client, url, FollowOptions::default())
    }

    /// Follow `url` with the given options.
    pub fn with_options(client: C, url: impl Into<String>, options: FollowOptions) -> Result<Self> {
        Self::from_shared(Arc::new(client), url, options)
    }

    /// Follow `url` using a client shared with other readers.
    pub fn from_shared(client: Arc<C>, url: impl Into<String>, options: FollowOptions) -> Result<Self> {
        let url = url.into();
        validate_url(&url)?;
        debug!(%url, mode = %options.poll_mode, interval = ?options.interval, "following resource");
        Ok(Self {
            client,
            state: FetchState::new(url, options.headers.clone()),
            options,
            phase: Phase::Idle,
            status_failures: 0,
        })
    }

    pub fn url(&self) -> &str { self.state.url() }

    /// Bytes delivered so far.
    pub fn offset(&self) -> u64 { self.state.offset() }

    pub fn etag(&self) -> Option<&str> { self.state.etag() }

    /// Whether the server has marked the resource complete.
    pub fn is_complete(&self) -> bool { self.state.is_complete() }

    pub fn fetch_state(&self) -> &FetchState { &self.state }

    pub fn options(&self) -> &FollowOptions { &self.options }

    pub fn state(&self) -> EngineState {
        match self.phase {
            Phase::Idle => EngineState::Idle,
            Phase::Requesting(_) | Phase::Streaming(_) | Phase::Draining { .. } => EngineState::Requesting,
            Phase::Waiting(_) | Phase::Probing(_) => EngineState::Waiting,
            Phase::Done => EngineState::Done,
            Phase::Failed => EngineState::Failed,
        }
    }

    /// Stop following the resource.
    ///
    /// Drops the pending timer and any in-flight request. The stream yields
    /// `None` from then on.
    pub fn cancel(&mut self) {
        if !matches!(self.phase, Phase::Done | Phase::Failed) {
            debug!(url = %self.state.url(), offset = self.state.offset(), "cancelled");
            self.phase = Phase::Done;
        }
    }

    /// Drive the reader to completion and return every delivered byte.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    fn start_fetch(&self) -> Phase<C::Error> {
        let request = self.state.build_fetch_options(&Headers::new());
        debug!(
            url = %request.url,
            offset = self.state.offset(),
            etag = ?self.state.etag(),
            "fetch"
        );
        let client = Arc::clone(&self.client);
        Phase::Requesting(Box::pin(async move { client.fetch(&request).await }))
    }

    fn start_probe(&self) -> Phase<C::Error> {
        let request = self.state.build_probe_options(&Headers::new());
        debug!(url = %request.url, offset = self.state.offset(), "probe");
        let client = Arc::clone(&self.client);
        Phase::Probing(Box::pin(async move { client.probe(&request).await }))
    }

    fn schedule(&self) -> Phase<C::Error> {
        trace!(interval = ?self.options.interval, "poll scheduled");
        Phase::Waiting(Box::pin(tokio::time::sleep(self.options.interval)))
    }

    fn on_response(&mut self, response: FetchResponse<C::Error>) {
        let FetchResponse { head, body } = response;
        debug!(status = head.status, "response");

        if classify_status(head.status) != Disposition::Data {
            // Bodies of non-data responses are read to the end so the
            // connection goes back to the pool.
            self.phase = Phase::Draining { head, body };
            return;
        }

        let offset = self.state.offset();
        let skip = if head.status == 200 && offset > 0 {
            warn!(offset, "server ignored range request, skipping delivered bytes");
            offset
        } else {
            0
        };
        self.phase = Phase::Streaming(Body {
            expected: content_length(&head.headers),
            head,
            stream: body,
            skip,
            received: 0,
            forwarded: 0,
        });
    }

    fn finish_body(&mut self, body: Body<C::Error>) -> Result<()> {
        if let Some(expected) = body.expected
            && body.received < expected
        {
            return Err(FollowError::ShortBody {
                expected,
                received: body.received,
            });
        }

        if body.forwarded == 0 {
            return self.settle(&body.head);
        }

        self.status_failures = 0;
        self.state
            .record_etag(body.head.headers.get("etag").map(str::to_string));
        debug!(
            bytes = body.forwarded,
            offset = self.state.offset(),
            etag = ?self.state.etag(),
            "new data"
        );

        self.phase = if self.complete_signaled(&body.head) {
            Phase::Done
        } else {
            Phase::Idle
        };
        Ok(())
    }

    fn on_probe(&mut self, head: ResponseHead) -> Result<()> {
        debug!(status = head.status, length = ?content_length(&head.headers), "probe response");

        if classify_status(head.status) == Disposition::Data {
            let grown = content_length(&head.headers).is_none_or(|len| len > self.state.offset());
            if grown {
                self.status_failures = 0;
                self.phase = self.start_fetch();
                return Ok(());
            }
        }
        self.settle(&head)
    }

    /// Decide what follows a response that delivered no new bytes.
    fn settle(&mut self, head: &ResponseHead) -> Result<()> {
        if self.complete_signaled(head) {
            self.phase = Phase::Done;
            return Ok(());
        }

        match classify_status(head.status) {
            Disposition::Data | Disposition::NotModified => self.status_failures = 0,
            Disposition::RangeNotSatisfiable => {
                return Err(FollowError::RangeNotSatisfiable {
                    offset: self.state.offset(),
                });
            }
            Disposition::Unexpected => {
                self.status_failures = self.status_failures.saturating_add(1);
                warn!(
                    status = head.status,
                    attempts = self.status_failures,
                    "unexpected status, polling again"
                );
                if let Some(max) = self.options.max_status_retries
                    && self.status_failures > max
                {
                    return Err(FollowError::UnexpectedStatus {
                        status:   head.status,
                        attempts: self.status_failures,
                    });
                }
            }
        }

        self.phase = self.schedule();
        Ok(())
    }

    fn complete_signaled(&mut self, head: &ResponseHead) -> bool {
        let complete = self
            .state
            .mark_complete_if_signaled(&head.headers, &self.options.complete_header);
        if complete {
            debug!(offset = self.state.offset(), "resource complete");
        }
        complete
    }

    fn fail(&mut self, err: FollowError) -> Poll<Option<Result<Bytes>>> {
        debug!(error = %err, offset = self.state.offset(), "failed");
        self.phase = Phase::Failed;
        Poll::Ready(Some(Err(err)))
    }
}

impl<C: HttpClient + 'static> Stream for PollingReader<C> {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match std::mem::replace(&mut this.phase, Phase::Failed) {
                Phase::Idle => {
                    this.phase = if this.state.is_complete() {
                        Phase::Done
                    } else {
                        this.start_fetch()
                    };
                }
                Phase::Requesting(mut request) => match request.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Requesting(request);
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(e)) => return this.fail(FollowError::transport(e)),
                    Poll::Ready(Ok(response)) => this.on_response(response),
                },
                Phase::Streaming(mut body) => match body.stream.as_mut().poll_next(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Streaming(body);
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Err(e))) => return this.fail(FollowError::transport(e)),
                    Poll::Ready(Some(Ok(chunk))) => {
                        let chunk = body.accept(chunk);
                        this.phase = Phase::Streaming(body);
                        if let Some(chunk) = chunk {
                            trace!(len = chunk.len(), "chunk");
                            this.state.record_bytes(chunk.len() as u64);
                            return Poll::Ready(Some(Ok(chunk)));
                        }
                    }
                    Poll::Ready(None) => {
                        if let Err(e) = this.finish_body(body) {
                            return this.fail(e);
                        }
                    }
                },
                Phase::Draining { head, mut body } => match body.as_mut().poll_next(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Draining { head, body };
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Ok(_))) => this.phase = Phase::Draining { head, body },
                    Poll::Ready(Some(Err(e))) => {
                        trace!(error = %e, "discarded body ended with error");
                        if let Err(e) = this.settle(&head) {
                            return this.fail(e);
                        }
                    }
                    Poll::Ready(None) => {
                        if let Err(e) = this.settle(&head) {
                            return this.fail(e);
                        }
                    }
                },
                Phase::Waiting(mut sleep) => match sleep.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Waiting(sleep);
                        return Poll::Pending;
                    }
                    Poll::Ready(()) => {
                        this.phase = match this.options.poll_mode {
                            PollMode::Refetch => this.start_fetch(),
                            PollMode::Probe => this.start_probe(),
                        };
                    }
                },
                Phase::Probing(mut probe) => match probe.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.phase = Phase::Probing(probe);
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(e)) => return this.fail(FollowError::transport(e)),
                    Poll::Ready(Ok(head)) => {
                        if let Err(e) = this.on_probe(head) {
                            return this.fail(e);
                        }
                    }
                },
                Phase::Done => {
                    this.phase = Phase::Done;
                    return Poll::Ready(None);
                }
                Phase::Failed => return Poll::Ready(None),
            }
        }
    }
}

impl<C: HttpClient + 'static> FusedStream for PollingReader<C> {
    fn is_terminated(&self) -> bool { matches!(self.phase, Phase::Done | Phase::Failed) }
}

impl<C: HttpClient> std::fmt::Debug for PollingReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingReader")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("status_failures", &self.status_failures)
            .finish_non_exhaustive()
    }
}

fn validate_url(url: &str) -> Result<()> {
    let scheme = url.split("://").next().unwrap_or_default();
    let valid = url.contains("://")
        && (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"));
    if !valid {
        return Err(FollowError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RequestOptions;

    struct UnreachableClient;

    impl HttpClient for UnreachableClient {
        type Error = std::io::Error;

        async fn fetch(&self, _: &RequestOptions) -> std::result::Result<FetchResponse<Self::Error>, Self::Error> {
            Err(std::io::Error::other("unreachable"))
        }

        async fn probe(&self, _: &RequestOptions) -> std::result::Result<ResponseHead, Self::Error> {
            Err(std::io::Error::other("unreachable"))
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("http://localhost/log").is_ok());
        assert!(validate_url("HTTPS://example.com/a").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("localhost/log").is_err());
        assert!(validate_url("ftp://example.com/log").is_err());
    }

    #[test]
    fn test_body_skips_already_delivered_prefix() {
        let mut body: Body<std::io::Error> = Body {
            head:      ResponseHead::new(200, Headers::new()),
            stream:    Box::pin(futures_util::stream::empty()),
            skip:      5,
            expected:  Some(8),
            received:  0,
            forwarded: 0,
        };

        assert_eq!(body.accept(Bytes::from_static(b"abc")), None);
        assert_eq!(body.accept(Bytes::from_static(b"defgh")), Some(Bytes::from_static(b"fgh")));
        assert_eq!(body.received, 8);
        assert_eq!(body.forwarded, 3);
        assert_eq!(body.skip, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_count_saturates() {
        let mut reader = PollingReader::new(UnreachableClient, "http://localhost/log").unwrap();
        reader.status_failures = u32::MAX;

        reader.settle(&ResponseHead::new(503, Headers::new())).unwrap();

        assert_eq!(reader.status_failures, u32::MAX);
        assert_eq!(reader.state(), EngineState::Waiting);
    }

    #[test]
    fn test_engine_state_display() {
        assert_eq!(EngineState::Waiting.to_string(), "Waiting");
        assert_eq!(EngineState::Failed.to_string(), "Failed");
    }
}
