//! gRPC handler tests.
//!
//! These call the service methods through the AuthService and VaultService
//! traits, with the identity the interceptor would attach already in place.

mod auth;
mod data;
