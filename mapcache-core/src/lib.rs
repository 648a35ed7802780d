//! mapcache Core - Identity, Entity and Error Types
//!
//! Shared vocabulary for the client-side cache synchronization layer:
//! entity ids and kinds, route-parameter parsing, typed views over cached
//! JSON, the error taxonomy, configuration, and the clock and error-sink
//! seams. All other crates depend on this.

pub mod clock;
pub mod config;
pub mod domain;
pub mod entity;
pub mod error;
pub mod identity;
pub mod report;

pub use clock::{elapsed_since, Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use domain::{ChallengeStatus, ChallengeView, OsmProfile, Point, TaskCluster, UserView};
pub use entity::{EntityKey, EntityKind};
pub use error::{CacheError, CacheResult, ConfigError, StoreError, TransportError};
pub use identity::{parse_numeric_id, ChallengeIdentity, EntityId, RouteParams, Timestamp};
pub use report::{ErrorKind, ErrorSink, TracingErrorSink};
