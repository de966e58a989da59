//! Server unit and integration tests.
//!
//! - `common` - shared helpers: in-memory server, users, authenticated requests
//! - `auth` - token issuing/verification and the interceptor
//! - `handlers` - gRPC handler tests through the service traits
//! - `serve` - the full server on a loopback socket

pub mod common;

mod handlers;
