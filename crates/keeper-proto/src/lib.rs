//! gRPC contract for keeper, generated from `proto/keeper.proto`.
//!
//! `AuthService` (Register, Login) is open. Every `VaultService` call must
//! carry `authorization: Bearer <token>`. Timestamps on the wire are unix
//! microseconds.

pub mod convert;

tonic::include_proto!("keeper");

/// Metadata key carrying the bearer token.
pub const AUTHORIZATION: &str = "authorization";
