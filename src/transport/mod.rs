//! HTTP transport shared by the discovery and synthesis calls.

mod http;

pub use http::{HttpTransport, TransportError};
