//! API middleware stack.
//!
//! Execution order (outermost to innermost):
//! 1. Auth validator: bearer token to session user
//! 2. Audit logger: runs after auth, so it knows the caller

pub mod audit;
pub mod auth;
