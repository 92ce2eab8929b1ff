//! Incremental polling reader for remote append-only resources.
//!
//! Follows a resource that grows over time (a live log in blob storage, for
//! instance) and exposes it as one continuous byte stream. Progress is tracked
//! with a byte offset and the resource ETag, so every request is conditional
//! (`If-None-Match`) and ranged (`Range: bytes=<offset>-`). The stream ends once
//! a response carries the completion marker header.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and types
//! - [`core`] - Pure transformations
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **At-Most-Once**: Offsets only move forward; a server that ignores the
//!   range has the already delivered prefix skipped
//! - **No Read-Ahead**: The next request is only issued when the consumer asks
//!   for more bytes
//! - **Deterministic Cancellation**: Dropping the reader drops its timer and
//!   in-flight request

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use self::core::{Disposition, FetchState, classify_status, content_length};
pub use self::data::{FollowOptions, Headers, Method, PollMode, RequestOptions, ResponseHead};
pub use self::effects::{BoxStream, EngineState, FetchResponse, HttpClient, PollingReader};

#[cfg(feature = "reqwest")]
pub use self::effects::ReqwestClient;

pub use self::error::{FollowError, Result};
