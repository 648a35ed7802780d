//! Collaborators shared by every loader.

use mapcache_core::{CacheConfig, Clock, ErrorSink, SystemClock, Timestamp, TracingErrorSink};
use mapcache_fetch::{FetchSequencer, Transport};
use mapcache_store::{Freshness, Schema, SharedStore};
use std::fmt;
use std::sync::Arc;

/// The store, sequencer, transport and sinks a loader works against.
///
/// Cloning is cheap and every clone shares the same store and sequencer,
/// which is how separate consumers observe each other's merges.
#[derive(Clone)]
pub struct LoaderContext {
    pub store: SharedStore,
    pub schema: Arc<Schema>,
    pub sequencer: Arc<FetchSequencer>,
    pub transport: Arc<dyn Transport>,
    pub errors: Arc<dyn ErrorSink>,
    pub clock: Arc<dyn Clock>,
    pub config: CacheConfig,
}

impl LoaderContext {
    /// Fresh store and sequencer over `transport`, with the standard schema,
    /// wall clock, default config and a logging error sink.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            store: SharedStore::new(),
            schema: Arc::new(Schema::standard()),
            sequencer: Arc::new(FetchSequencer::with_clock(clock.clone())),
            transport,
            errors: Arc::new(TracingErrorSink),
            clock,
            config: CacheConfig::default(),
        }
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    /// Also rebuilds the sequencer so token timestamps come from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.sequencer = Arc::new(FetchSequencer::with_clock(clock.clone()));
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Freshness requirement derived from the configured threshold.
    pub fn freshness(&self) -> Freshness {
        Freshness::within(self.config.freshness_threshold)
    }
}

impl fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderContext")
            .field("store", &self.store)
            .field("sequencer", &self.sequencer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
