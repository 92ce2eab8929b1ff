//! I/O for following a remote resource.
//!
//! The [`HttpClient`] transport abstraction, its reqwest implementation and
//! the [`PollingReader`] stream that drives it.

mod http;
mod reader;

pub use http::{BoxStream, FetchResponse, HttpClient};
pub use reader::{EngineState, PollingReader};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
