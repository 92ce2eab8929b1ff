//! Pure logic for following a remote resource.
//!
//! Progress tracking, request construction and response classification. No
//! function in this module performs I/O.

mod classify;
mod state;

pub use classify::{Disposition, classify_status, content_length};
pub use state::FetchState;
