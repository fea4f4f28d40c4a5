//! # kafka-offset-tracker
//!
//! A live, queryable picture of consumer-group progress across a Kafka cluster: for every
//! (consumer-group, topic, partition) triple, the last committed offset, the current
//! log-end offset, the resulting lag, the owning client, and the commit/expire timestamps.
//!
//! This crate is a library, not a service: it owns three long-lived polling tasks and the
//! concurrent state they feed, but it has no process entry point, no HTTP/UI layer, and no
//! persistent storage. An embedding process is expected to call [`spawn`], hold on to the
//! returned [`Tracker`], and build its own surface (CLI, HTTP handlers, a UI) on top of
//! [`Tracker::query`].
//!
//! ## Architecture
//!
//! Five components, leaves first:
//!
//! * [`decoder`] — a pure function from `__consumer_offsets` record bytes to a decoded
//!   offset commit or an ignore signal.
//! * [`commit_listener`] — tails `__consumer_offsets`, decodes each record, and maintains
//!   the `CommittedOffsets` projection.
//! * [`metadata_poller`] — periodically lists and describes consumer groups through an
//!   admin-style broker client, maintaining `Clients`, `TopicAndGroups` and
//!   `ActiveTopicPartitions`.
//! * [`log_end_poller`] — periodically seeks every partition to its end, maintaining
//!   `LogEnds` and `TopicPartitionsMap`.
//! * [`query`] — read-only joins over the four projections.
//!
//! Control flow: each poller runs as an independent task; projections are mutated only by
//! their owning poller and read by [`query::QueryLayer`]. No component calls another at
//! runtime except through [`projections::TrackerState`].
//!
//! ## 1 topic, 2 message variants
//!
//! `__consumer_offsets` carries two message variants, disambiguated by a leading `i16`
//! `message_version` in the record key: offset-commit (what this crate cares about) and
//! group-metadata (decoded for completeness by [`decoder::decode`], but a consumer-group's
//! membership is instead sourced from the admin-style client by [`metadata_poller`], to keep
//! a single writer per projection).

mod commit_listener;
mod config;
mod decoder;
mod errors;
mod log_end_poller;
mod metadata_poller;
mod projections;
mod query;
mod types;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use config::TrackerConfig;
pub use errors::{DecodeError, TrackerError};
pub use projections::TrackerState;
pub use query::QueryLayer;
pub use types::{ClientGroup, GroupTopicPartition, Node, OffsetInfo, OffsetRecord, PartitionInfo, TopicAndGroup, TopicPartition};

/// A running tracker: the shared state plus handles to its three poller tasks.
///
/// Dropping a `Tracker` does not stop its pollers; call [`Tracker::shutdown`] first and
/// `await` the returned handles if a clean stop is needed.
pub struct Tracker {
    state: Arc<TrackerState>,
    shutdown: CancellationToken,
    commit_listener: JoinHandle<()>,
    metadata_poller: JoinHandle<()>,
    log_end_poller: JoinHandle<()>,
}

impl Tracker {
    /// A read-only view onto the current projections.
    pub fn query(&self) -> QueryLayer<'_> {
        QueryLayer::new(&self.state)
    }

    /// The shared projections, for embedders that want direct access (e.g. a health check
    /// calling [`TrackerState::is_ready`]).
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Signal all three pollers to stop and wait for them to exit cleanly.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = tokio::join!(self.commit_listener, self.metadata_poller, self.log_end_poller);
    }
}

/// Start the three pollers against fresh, empty projections.
///
/// This is the crate's sole entry point: everything else (argument parsing, an HTTP
/// surface, wiring [`Tracker::query`] into handlers) is left to the embedding process, per
/// this crate's scope.
pub fn spawn(config: TrackerConfig) -> Tracker {
    let state = Arc::new(TrackerState::new());
    let config = Arc::new(config);
    let shutdown = CancellationToken::new();

    let commit_listener = tokio::spawn(commit_listener::run(state.clone(), config.clone(), shutdown.clone()));
    let metadata_poller = tokio::spawn(metadata_poller::run(state.clone(), config.clone(), shutdown.clone()));
    let log_end_poller = tokio::spawn(log_end_poller::run(state.clone(), config.clone(), shutdown.clone()));

    Tracker {
        state,
        shutdown,
        commit_listener,
        metadata_poller,
        log_end_poller,
    }
}

/// Test-only helper shared by modules that want to see their `tracing` output under `cargo
/// test -- --nocapture` (e.g. the decoder's malformed-record error logs). Safe to call from
/// multiple tests: only the first call installs a subscriber.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
    });
}
