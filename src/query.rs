//! `QueryLayer` (spec §4.5): read-only joins over the four projections. Never blocks on a
//! poller and never triggers a refresh.

use std::collections::{BTreeMap, BTreeSet};

use crate::projections::TrackerState;
use crate::types::{GroupTopicPartition, Node, OffsetInfo};

/// A read handle onto a [`TrackerState`]. Cheap to construct; holds no lock across calls.
pub struct QueryLayer<'a> {
    state: &'a TrackerState,
}

impl<'a> QueryLayer<'a> {
    pub fn new(state: &'a TrackerState) -> Self {
        QueryLayer { state }
    }

    /// Sorted list of distinct groups present in `TopicAndGroups`.
    pub fn list_groups(&self) -> Vec<String> {
        let topic_and_groups = self.state.topic_and_groups.load();
        topic_and_groups.iter().map(|tg| tg.group.clone()).collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Sorted list of distinct topics `group` is associated with in `TopicAndGroups`.
    pub fn list_topics_of_group(&self, group: &str) -> Vec<String> {
        let topic_and_groups = self.state.topic_and_groups.load();
        topic_and_groups
            .iter()
            .filter(|tg| tg.group == group)
            .map(|tg| tg.topic.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Identical to [`Self::list_topics_of_group`] — spec §6 preserves this naming
    /// duplication from the source rather than guess at an intended distinction
    /// (see DESIGN.md's Open Question Decisions).
    pub fn list_active_topics_of_group(&self, group: &str) -> Vec<String> {
        self.list_topics_of_group(group)
    }

    /// Mapping topic → sorted list of groups, built from `TopicAndGroups`.
    pub fn topic_to_groups(&self) -> BTreeMap<String, Vec<String>> {
        let topic_and_groups = self.state.topic_and_groups.load();
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for tg in topic_and_groups.iter() {
            map.entry(tg.topic.clone()).or_default().insert(tg.group.clone());
        }
        map.into_iter().map(|(topic, groups)| (topic, groups.into_iter().collect())).collect()
    }

    /// Sorted list of topic keys of `TopicPartitionsMap`.
    pub fn list_topics(&self) -> Vec<String> {
        let topic_partitions_map = self.state.topic_partitions_map.load();
        let mut topics: Vec<String> = topic_partitions_map.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// A tree rooted at `"KafkaCluster"`, with one sorted, de-duplicated child per distinct
    /// leader `host:port` drawn from the first partition of each topic.
    pub fn cluster_topology(&self) -> Node {
        let topic_partitions_map = self.state.topic_partitions_map.load();
        let mut leaders = BTreeSet::new();

        for partitions in topic_partitions_map.values() {
            if let Some(first) = partitions.first() {
                leaders.insert(format!("{}:{}", first.leader_host, first.leader_port));
            }
        }

        Node {
            name: "KafkaCluster".to_string(),
            children: leaders.into_iter().map(Node::leaf).collect(),
        }
    }

    /// Joined offset/lag/ownership record for a single (group, topic, partition), or `None`
    /// if there is no committed offset for that key (spec §4.5 steps 1-6).
    pub fn partition_offset_info(&self, group: &str, topic: &str, partition: i32) -> Option<OffsetInfo> {
        let key = GroupTopicPartition {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
        };

        let record = self.state.committed_offsets.get(&key)?;
        let log_end = self
            .state
            .log_ends
            .get(&crate::types::TopicPartition {
                topic: topic.to_string(),
                partition,
            })
            .map(|e| *e)
            .unwrap_or(record.offset);

        let lag = log_end - record.offset;
        let log_size = if lag < 0 { record.offset - lag } else { log_end };

        let owner = self.find_owner(group, topic, partition);

        Some(OffsetInfo {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
            offset: record.offset,
            log_size,
            owner,
            creation: record.expire_timestamp_ms,
            modified: record.commit_timestamp_ms,
        })
    }

    fn find_owner(&self, group: &str, topic: &str, partition: i32) -> String {
        let clients = self.state.clients.load();
        let tp = crate::types::TopicPartition {
            topic: topic.to_string(),
            partition,
        };

        clients
            .iter()
            .find(|c| c.group == group && c.topic_partitions.contains(&tp))
            .map(|c| format!("{} / {}", c.client_id, c.client_host))
            .unwrap_or_else(|| "NA".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::types::{ClientGroup, OffsetRecord, PartitionInfo, TopicAndGroup, TopicPartition};

    fn state_with_offset(group: &str, topic: &str, partition: i32, offset: i64, log_end: i64) -> TrackerState {
        let state = TrackerState::new();
        state.committed_offsets.insert(
            GroupTopicPartition {
                group: group.into(),
                topic: topic.into(),
                partition,
            },
            OffsetRecord {
                offset,
                metadata: String::new(),
                commit_timestamp_ms: 1000,
                expire_timestamp_ms: 2000,
            },
        );
        state.log_ends.insert(
            TopicPartition {
                topic: topic.into(),
                partition,
            },
            log_end,
        );
        state
    }

    #[test]
    fn fresh_lag_scenario() {
        let state = state_with_offset("g1", "t1", 0, 100, 150);
        let mut topic_partitions = std::collections::HashSet::new();
        topic_partitions.insert(TopicPartition {
            topic: "t1".into(),
            partition: 0,
        });
        state.clients.store(Arc::new(vec![ClientGroup {
            group: "g1".into(),
            client_id: "c1".into(),
            client_host: "h1".into(),
            topic_partitions,
        }]));

        let info = QueryLayer::new(&state).partition_offset_info("g1", "t1", 0).unwrap();
        assert_eq!(info.offset, 100);
        assert_eq!(info.log_size, 150);
        assert_eq!(info.owner, "c1 / h1");
        assert_eq!(info.modified, 1000);
        assert_eq!(info.creation, 2000);
    }

    #[test]
    fn stale_log_end_scenario() {
        let state = state_with_offset("g1", "t1", 0, 100, 90);
        let mut topic_partitions = std::collections::HashSet::new();
        topic_partitions.insert(TopicPartition {
            topic: "t1".into(),
            partition: 0,
        });
        state.clients.store(Arc::new(vec![ClientGroup {
            group: "g1".into(),
            client_id: "c1".into(),
            client_host: "h1".into(),
            topic_partitions,
        }]));

        let info = QueryLayer::new(&state).partition_offset_info("g1", "t1", 0).unwrap();
        assert_eq!(info.offset, 100);
        assert_eq!(info.log_size, 110);
        assert_eq!(info.owner, "c1 / h1");
    }

    #[test]
    fn no_owner_scenario() {
        let state = state_with_offset("g1", "t1", 0, 100, 150);
        let info = QueryLayer::new(&state).partition_offset_info("g1", "t1", 0).unwrap();
        assert_eq!(info.owner, "NA");
    }

    #[test]
    fn missing_commit_is_absent() {
        let state = TrackerState::new();
        assert!(QueryLayer::new(&state).partition_offset_info("g1", "t1", 0).is_none());
    }

    #[test]
    fn cluster_topology_scenario() {
        let state = TrackerState::new();
        let mut map = std::collections::HashMap::new();
        map.insert(
            "t1".to_string(),
            vec![PartitionInfo {
                topic: "t1".into(),
                partition: 0,
                leader_host: "h2".into(),
                leader_port: 9092,
                replicas: vec![],
                isr: vec![],
            }],
        );
        map.insert(
            "t2".to_string(),
            vec![PartitionInfo {
                topic: "t2".into(),
                partition: 0,
                leader_host: "h1".into(),
                leader_port: 9092,
                replicas: vec![],
                isr: vec![],
            }],
        );
        map.insert(
            "t3".to_string(),
            vec![PartitionInfo {
                topic: "t3".into(),
                partition: 0,
                leader_host: "h2".into(),
                leader_port: 9092,
                replicas: vec![],
                isr: vec![],
            }],
        );
        state.topic_partitions_map.store(Arc::new(map));

        let topology = QueryLayer::new(&state).cluster_topology();
        assert_eq!(topology.name, "KafkaCluster");
        assert_eq!(topology.children, vec![Node::leaf("h1:9092"), Node::leaf("h2:9092")]);
    }

    #[rstest]
    #[case::single_match("g1", true)]
    #[case::no_match("g2", false)]
    fn owner_rendering(#[case] group: &str, #[case] expect_match: bool) {
        let state = TrackerState::new();
        let mut topic_partitions = std::collections::HashSet::new();
        topic_partitions.insert(TopicPartition {
            topic: "t1".into(),
            partition: 0,
        });
        state.clients.store(Arc::new(vec![ClientGroup {
            group: "g1".into(),
            client_id: "c1".into(),
            client_host: "h1".into(),
            topic_partitions,
        }]));

        let owner = QueryLayer::new(&state).find_owner(group, "t1", 0);
        if expect_match {
            assert_eq!(owner, "c1 / h1");
        } else {
            assert_eq!(owner, "NA");
        }
    }

    #[test]
    fn list_groups_and_topics_are_sorted_and_deduplicated() {
        let state = TrackerState::new();
        state.topic_and_groups.store(Arc::new(
            [
                TopicAndGroup { topic: "t2".into(), group: "g1".into() },
                TopicAndGroup { topic: "t1".into(), group: "g1".into() },
                TopicAndGroup { topic: "t1".into(), group: "g2".into() },
            ]
            .into_iter()
            .collect(),
        ));

        let query = QueryLayer::new(&state);
        assert_eq!(query.list_groups(), vec!["g1", "g2"]);
        assert_eq!(query.list_topics_of_group("g1"), vec!["t1", "t2"]);
        assert_eq!(query.list_active_topics_of_group("g1"), query.list_topics_of_group("g1"));

        let topic_to_groups = query.topic_to_groups();
        assert_eq!(topic_to_groups.get("t1"), Some(&vec!["g1".to_string(), "g2".to_string()]));
        assert_eq!(topic_to_groups.get("t2"), Some(&vec!["g1".to_string()]));
    }
}
