//! SWR API - HTTP Demo Service
//!
//! Serves `GET /users` from a deliberately slow user directory, with the
//! stale-while-revalidate cache in front of it. Several instances pointed at
//! the same Redis share one cache entry and run at most one refresh at a
//! time between them.

pub mod config;
pub mod error;
pub mod routes;
pub mod source;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, USERS_CACHE_KEY};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use source::{User, UserDirectory};
pub use state::{ApiCache, AppState};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
