//! `LogEndPoller` (spec §4.4): maintains `TopicPartitionsMap` and `LogEnds` by periodically
//! reading cluster metadata and seeking every partition to its end.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::TrackerConfig;
use crate::projections::TrackerState;
use crate::types::{PartitionInfo, TopicPartition};

const GROUP_ID: &str = "kafka-monitor-LogEndOffsetGetter";
const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the poller loop until `shutdown` is cancelled.
///
/// Spec §4.4: any error closes and nulls the consumer and the loop reiterates; success
/// sleeps 10s, error sleeps 30s.
pub async fn run(state: Arc<TrackerState>, config: Arc<TrackerConfig>, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            info!("log-end poller shutting down");
            return;
        }

        let consumer = match build_consumer(&config) {
            Ok(consumer) => consumer,
            Err(e) => {
                error!(error = %e, "failed to construct log-end-poller consumer");
                if sleep_or_cancel(config.error_sleep, &shutdown).await {
                    return;
                }
                continue;
            },
        };

        let sleep_for = match run_cycle(&consumer, &state) {
            Ok(()) => {
                state.mark_log_end_poller_ready();
                config.log_end_cycle_sleep
            },
            Err(e) => {
                warn!(error = %e, "log-end poller cycle failed, reconnecting");
                config.error_sleep
            },
        };

        if sleep_or_cancel(sleep_for, &shutdown).await {
            return;
        }
    }
}

async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.cancelled() => true,
    }
}

fn build_consumer(config: &TrackerConfig) -> Result<BaseConsumer, KafkaError> {
    ClientConfig::new()
        .set("group.id", GROUP_ID)
        .set("bootstrap.servers", &config.kafka_brokers)
        .set("security.protocol", &config.kafka_security_protocol)
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "30000")
        .create()
}

/// One full cycle: refresh `TopicPartitionsMap`, then seek every (topic, partition) to its
/// end and upsert the resulting position into `LogEnds` (spec §4.4 steps a-c).
fn run_cycle(consumer: &BaseConsumer, state: &TrackerState) -> Result<(), KafkaError> {
    let topic_partitions_map = fetch_topic_partitions_map(consumer)?;

    for (topic, partitions) in &topic_partitions_map {
        for info in partitions {
            match seek_to_end(consumer, topic, info.partition) {
                Ok(position) => {
                    state.log_ends.insert(
                        TopicPartition {
                            topic: topic.clone(),
                            partition: info.partition,
                        },
                        position,
                    );
                },
                Err(e) => {
                    warn!(topic = %topic, partition = info.partition, error = %e, "failed to read log-end offset");
                },
            }
        }
    }

    state.topic_partitions_map.store(Arc::new(topic_partitions_map));
    Ok(())
}

fn fetch_topic_partitions_map(consumer: &BaseConsumer) -> Result<HashMap<String, Vec<PartitionInfo>>, KafkaError> {
    let metadata = consumer.fetch_metadata(None, METADATA_FETCH_TIMEOUT)?;
    let mut map: HashMap<String, Vec<PartitionInfo>> = HashMap::new();

    for topic in metadata.topics() {
        let mut partitions: Vec<PartitionInfo> = topic
            .partitions()
            .iter()
            .map(|partition| {
                let leader_broker = metadata.brokers().iter().find(|b| b.id() == partition.leader());
                let (leader_host, leader_port) = leader_broker
                    .map(|b| (b.host().to_string(), b.port()))
                    .unwrap_or_else(|| (String::new(), 0));

                PartitionInfo {
                    topic: topic.name().to_string(),
                    partition: partition.id(),
                    leader_host,
                    leader_port,
                    replicas: partition.replicas().to_vec(),
                    isr: partition.isr().to_vec(),
                }
            })
            .collect();
        partitions.sort_by_key(|p| p.partition);
        map.insert(topic.name().to_string(), partitions);
    }

    Ok(map)
}

/// Assign a single partition (resetting any prior assignment), seek it to the end, and
/// return the resulting position — one-at-a-time per spec §4.4's explicit simplicity
/// trade-off.
fn seek_to_end(consumer: &BaseConsumer, topic: &str, partition: i32) -> Result<i64, KafkaError> {
    let mut assignment = TopicPartitionList::new();
    assignment.add_partition(topic, partition);
    consumer.assign(&assignment)?;
    consumer.seek(topic, partition, Offset::End, Duration::from_secs(10))?;

    let positions = consumer.position()?;
    let position = positions
        .elements_for_topic(topic)
        .into_iter()
        .find(|e| e.partition() == partition)
        .and_then(|e| e.offset().to_raw())
        .unwrap_or(0);

    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_partitions_are_sorted_by_partition_id() {
        let mut partitions = vec![
            PartitionInfo {
                topic: "t1".into(),
                partition: 2,
                leader_host: "h1".into(),
                leader_port: 9092,
                replicas: vec![],
                isr: vec![],
            },
            PartitionInfo {
                topic: "t1".into(),
                partition: 0,
                leader_host: "h1".into(),
                leader_port: 9092,
                replicas: vec![],
                isr: vec![],
            },
        ];
        partitions.sort_by_key(|p| p.partition);
        assert_eq!(partitions[0].partition, 0);
        assert_eq!(partitions[1].partition, 2);
    }

    #[tokio::test]
    async fn run_exits_immediately_when_already_cancelled() {
        let state = Arc::new(TrackerState::new());
        let config = Arc::new(TrackerConfig::new("localhost:9092", "PLAINTEXT").unwrap());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), run(state, config, shutdown))
            .await
            .expect("run() must exit immediately on a pre-cancelled shutdown token");
    }
}
