//! The shared, process-wide state of spec §3/§9 ("Global projections" design note): one
//! value owning the four/five projections, handed out by reference so each poller only
//! ever touches the field(s) it is the single writer of.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::types::{ClientGroup, GroupTopicPartition, OffsetRecord, PartitionInfo, TopicAndGroup, TopicPartition};

/// `CommittedOffsets` projection: written by `CommitListener`, read by everyone else.
///
/// A [`DashMap`] gives single-key reads and writes that are atomic without an external
/// lock (spec §5), which is exactly the access pattern `CommitListener`'s write rule and
/// `QueryLayer::partition_offset_info`'s lookup both need.
pub type CommittedOffsets = DashMap<GroupTopicPartition, OffsetRecord>;

/// `LogEnds` projection: written by `LogEndPoller`, read by everyone else. Same rationale
/// for `DashMap` as `CommittedOffsets`.
pub type LogEnds = DashMap<TopicPartition, i64>;

/// A projection that is replaced wholesale, once per poll cycle, as a single atomic
/// snapshot (spec §5: "Readers always see either the old snapshot or the new, never a
/// partial merge"). [`ArcSwap::store`] is exactly that operation; [`ArcSwap::load`] gives a
/// reader a cheap, immutable handle onto whichever snapshot was current at call time.
pub type Snapshot<T> = ArcSwap<T>;

/// All process-wide state, owned by the process for its whole lifetime (spec §3:
/// "projections are created empty at startup and live for the process lifetime").
pub struct TrackerState {
    pub committed_offsets: CommittedOffsets,
    pub log_ends: LogEnds,
    pub active_topic_partitions: Snapshot<HashSet<TopicPartition>>,
    pub clients: Snapshot<Vec<ClientGroup>>,
    pub topic_and_groups: Snapshot<HashSet<TopicAndGroup>>,
    pub topic_partitions_map: Snapshot<HashMap<String, Vec<PartitionInfo>>>,

    commit_listener_ready: AtomicBool,
    metadata_poller_ready: AtomicBool,
    log_end_poller_ready: AtomicBool,
}

impl Default for TrackerState {
    fn default() -> Self {
        TrackerState {
            committed_offsets: DashMap::new(),
            log_ends: DashMap::new(),
            active_topic_partitions: ArcSwap::from_pointee(HashSet::new()),
            clients: ArcSwap::from_pointee(Vec::new()),
            topic_and_groups: ArcSwap::from_pointee(HashSet::new()),
            topic_partitions_map: ArcSwap::from_pointee(HashMap::new()),
            commit_listener_ready: AtomicBool::new(false),
            metadata_poller_ready: AtomicBool::new(false),
            log_end_poller_ready: AtomicBool::new(false),
        }
    }
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_commit_listener_ready(&self) {
        self.commit_listener_ready.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_metadata_poller_ready(&self) {
        self.metadata_poller_ready.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_log_end_poller_ready(&self) {
        self.log_end_poller_ready.store(true, Ordering::Relaxed);
    }

    /// `true` once every poller has published at least one snapshot (§4.7 supplement).
    ///
    /// This is a cheap, lock-free convenience for an embedding process's health check. It
    /// has no effect on, and is never consulted by, `QueryLayer` — the query layer never
    /// blocks on pollers, per spec §4.5.
    pub fn is_ready(&self) -> bool {
        self.commit_listener_ready.load(Ordering::Relaxed)
            && self.metadata_poller_ready.load(Ordering::Relaxed)
            && self.log_end_poller_ready.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_and_not_ready() {
        let state = TrackerState::new();
        assert!(state.committed_offsets.is_empty());
        assert!(state.log_ends.is_empty());
        assert!(state.active_topic_partitions.load().is_empty());
        assert!(!state.is_ready());
    }

    #[test]
    fn becomes_ready_only_once_all_three_have_published() {
        let state = TrackerState::new();
        state.mark_commit_listener_ready();
        assert!(!state.is_ready());
        state.mark_metadata_poller_ready();
        assert!(!state.is_ready());
        state.mark_log_end_poller_ready();
        assert!(state.is_ready());
    }

    #[test]
    fn snapshot_replacement_is_atomic_store() {
        let state = TrackerState::new();
        let mut first = HashSet::new();
        first.insert(TopicPartition {
            topic: "t1".into(),
            partition: 0,
        });
        state.active_topic_partitions.store(std::sync::Arc::new(first));
        assert_eq!(state.active_topic_partitions.load().len(), 1);
    }
}
