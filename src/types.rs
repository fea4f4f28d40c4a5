//! The value types of the data model (spec §3): projection keys, the records the pollers
//! write into projections, and the structs the query layer computes on demand.

use std::collections::HashSet;

/// Key identifying a single (consumer group, topic, partition) triple.
///
/// This is the key type of the `CommittedOffsets` projection, and doubles as the argument
/// to `QueryLayer::partition_offset_info`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupTopicPartition {
    pub group: String,
    pub topic: String,
    pub partition: i32,
}

/// A decoded offset commit, as last written to `__consumer_offsets` for some
/// [`GroupTopicPartition`].
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetRecord {
    pub offset: i64,
    pub metadata: String,
    pub commit_timestamp_ms: i64,
    pub expire_timestamp_ms: i64,
}

/// A (topic, partition) pair, independent of any consumer group.
///
/// Key type of the `LogEnds` projection and member type of `ActiveTopicPartitions`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

/// A (topic, group) pair: membership in the `TopicAndGroups` set means "this group has at
/// least one active member consuming this topic".
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopicAndGroup {
    pub topic: String,
    pub group: String,
}

/// One active consumer instance, as reported by `MetadataPoller`'s describe-group call.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientGroup {
    pub group: String,
    pub client_id: String,
    pub client_host: String,
    pub topic_partitions: HashSet<TopicPartition>,
}

/// A cluster-metadata snapshot of one partition, as seen by `LogEndPoller`.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionInfo {
    pub topic: String,
    pub partition: i32,
    pub leader_host: String,
    pub leader_port: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

/// Query-layer output: the joined view of a single (group, topic, partition)'s offset, lag
/// and ownership, computed on demand by [`crate::query::QueryLayer::partition_offset_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetInfo {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub log_size: i64,
    pub owner: String,
    pub creation: i64,
    pub modified: i64,
}

/// A node in the tree returned by [`crate::query::QueryLayer::cluster_topology`]: a
/// synthetic root named `"KafkaCluster"` whose children are the cluster's distinct
/// `host:port` broker endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub name: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn leaf(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            children: Vec::new(),
        }
    }
}
