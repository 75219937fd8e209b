//! WebPeel REST API.
//!
//! Library form of the server: configuration, state assembly, the route
//! table and its handlers. `main.rs` wires this to a listener with
//! graceful shutdown.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod quota_headers;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use routes::router;
pub use state::AppState;
