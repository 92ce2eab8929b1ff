//! Immutable data types for following a remote resource.
//!
//! Configuration, header maps and request/response descriptors. None of these
//! types perform I/O; they are built once and passed by reference.

pub mod headers;
pub mod options;
pub mod request;

pub use headers::Headers;
pub use options::{DEFAULT_COMPLETE_HEADER, DEFAULT_INTERVAL, FollowOptions, PollMode};
pub use request::{Method, RequestOptions, ResponseHead};
