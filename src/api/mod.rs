//! HTTP API.
//!
//! Routes are nested under `/api/` and carry the caller identity set by
//! the upstream gateway. Middleware stack: Identity → Audit → Handler.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum
//! server instance; `start_server()` runs it on a socket.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
