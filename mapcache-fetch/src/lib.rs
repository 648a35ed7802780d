//! mapcache Fetch - Request Plumbing
//!
//! Endpoint descriptors and API routes, the [`Transport`] seam the HTTP
//! client implements, fetch tokens with per-slot stale-response rejection,
//! and a debounce gate for high-frequency triggers such as map panning.

pub mod debounce;
pub mod endpoint;
pub mod routes;
pub mod sequencer;
pub mod transport;

pub use debounce::{Admission, DebounceGate};
pub use endpoint::{Endpoint, Method};
pub use sequencer::{accepts, FetchSequencer, FetchToken, SlotKey};
pub use transport::Transport;
