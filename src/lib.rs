//! certweb - client core for the certification browser
//!
//! Host-agnostic pieces of the web client: routing, the resilient HTTP
//! pipeline, the signed-in session with its idle watchdog, XP/tier scoring,
//! and the small amount of state persisted in the browser.
//!
//! ## Architecture
//!
//! The core runs in two modes:
//! - **Native**: tokio runtime, `env_logger`, the `certweb` CLI
//! - **Web**: wasm32 with `web-sys` adapters for history, storage and timers
//!
//! ## Usage
//!
//! For native builds:
//! ```bash
//! cargo build --features native
//! ```
//!
//! For web builds:
//! ```bash
//! cargo build --target wasm32-unknown-unknown --no-default-features --features dom-web
//! ```

// Pure core (available on all platforms)
pub mod config;
pub mod models;
pub mod router;
pub mod xp;

// Network pipeline and typed endpoints
pub mod api;
pub mod http;

// Session state and idle sign-out
pub mod session;

// Persisted client state
pub mod storage;

// Platform abstraction layer
pub mod platform;

// Re-export commonly used types
pub use config::Config;
pub use http::{ApiClient, ApiError, RequestOptions};
pub use router::{RouteKind, RouteState, RouterStore};
pub use xp::{Tier, XpSummary};
