//! HTTP API.
//!
//! Exposes the domain modules as JSON endpoints under `/api/`, protected
//! by a middleware stack: Auth → Audit → Handler. Committed mutations are
//! streamed to `/ws/changes` subscribers.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
