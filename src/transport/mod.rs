//! Shared outbound HTTP plumbing.

mod http;

pub use http::{HttpTransport, TransportError};
