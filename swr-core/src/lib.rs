//! SWR Core - Shared Types
//!
//! Error taxonomy, configuration, clock and the envelope codec used by the
//! stale-while-revalidate cache. No I/O lives here.

pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;

pub use clock::{add_duration, Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_LOCK_KEY_PREFIX};
pub use envelope::{decode, encode, Envelope, ENVELOPE_VERSION};
pub use error::{
    CodecError, ConfigError, SourceError, SourceResult, StoreError, StoreResult, SwrError,
    SwrResult,
};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
