//! `CommitListener` (spec §4.2): keeps `CommittedOffsets` up to date by tailing
//! `__consumer_offsets`.

use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::decoder::{self, Decoded};
use crate::projections::TrackerState;

const CONSUMER_OFFSETS_TOPIC: &str = "__consumer_offsets";
const GROUP_ID: &str = "kafka-monitor-committedOffsetListener";

/// Run the listener loop until `shutdown` is cancelled.
///
/// Implements the `{NoConsumer -> Subscribed -> Polling}` state machine of spec §4.2: any
/// error anywhere in a cycle drops back to `NoConsumer`, which the top of the loop rebuilds
/// with no backoff beyond the natural cost of consumer construction.
pub async fn run(state: Arc<TrackerState>, config: Arc<TrackerConfig>, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            info!("commit listener shutting down");
            return;
        }

        let consumer = match build_consumer(&config) {
            Ok(consumer) => consumer,
            Err(e) => {
                error!(error = %e, "failed to construct commit-listener consumer");
                continue;
            },
        };

        if let Err(e) = consumer.subscribe(&[CONSUMER_OFFSETS_TOPIC]) {
            error!(error = %e, "failed to subscribe to __consumer_offsets");
            continue;
        }

        poll_until_error(&consumer, &state, &config, &shutdown).await;
    }
}

fn build_consumer(config: &TrackerConfig) -> Result<StreamConsumer, KafkaError> {
    ClientConfig::new()
        .set("group.id", GROUP_ID)
        .set("bootstrap.servers", &config.kafka_brokers)
        .set("security.protocol", &config.kafka_security_protocol)
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "30000")
        .set("auto.offset.reset", "latest")
        .create()
}

/// Poll `consumer` in a tight loop, blocking up to `config.commit_poll_timeout` per
/// iteration, until either `shutdown` fires or the consumer reports an error (spec §4.2:
/// "any uncaught error... the loop reiterates to recreate it").
async fn poll_until_error(consumer: &StreamConsumer, state: &TrackerState, config: &TrackerConfig, shutdown: &CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("commit listener shutting down");
                return;
            }
            result = tokio::time::timeout(config.commit_poll_timeout, consumer.recv()) => {
                match result {
                    Err(_elapsed) => {
                        state.mark_commit_listener_ready();
                        continue;
                    },
                    Ok(Ok(message)) => {
                        decode_and_apply(state, message.key(), message.payload());
                        state.mark_commit_listener_ready();
                    },
                    Ok(Err(e)) => {
                        warn!(error = %e, "commit-listener consumer failure, reconnecting");
                        return;
                    },
                }
            }
        }
    }
}

/// The write-rule core of spec §4.2, factored out of the poll loop so it can be exercised
/// against synthetic decoder output without a broker (spec §8, invariant 4).
pub(crate) fn handle_decoded(state: &TrackerState, decoded: Decoded) {
    match decoded {
        Decoded::OffsetCommit(key, Some(record)) => {
            let should_write = match state.committed_offsets.get(&key) {
                None => true,
                Some(existing) => existing.offset != record.offset,
            };
            if should_write {
                state.committed_offsets.insert(key, record);
            }
        },
        Decoded::OffsetCommit(_key, None) => {
            // Tombstone: spec §4.2 only speaks of overwriting on a new commit: a removal of
            // the underlying key is not itself a write the CommittedOffsets projection acts
            // on, so there is nothing to do here beyond what already happened (no entry is
            // created, and any existing entry is left as the last observed commit).
        },
        Decoded::GroupMetadata | Decoded::Ignored => {
            debug!("commit listener ignoring non-offset-commit record");
        },
    }
}

pub(crate) fn decode_and_apply(state: &TrackerState, key: Option<&[u8]>, payload: Option<&[u8]>) {
    handle_decoded(state, decoder::decode(key, payload));
}
