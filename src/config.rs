//! Injected configuration (spec §6) plus the per-poller tunables spec.md fixes as prose
//! constants, exposed here as `Duration` fields so tests can override them without touching
//! the values that drive the real pollers.

use std::time::Duration;

use crate::errors::TrackerError;

const KAFKA_RECOGNISED_SECURITY_PROTOCOLS: &[&str] = &["PLAINTEXT", "SSL", "SASL_PLAINTEXT", "SASL_SSL"];

/// Configuration shared by all three pollers.
///
/// Constructed by the embedding process (out of scope for this crate, per spec §1) and
/// handed to [`crate::spawn`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Comma-separated `host:port` bootstrap brokers.
    pub kafka_brokers: String,

    /// One of the Kafka-recognised security protocol identifiers (spec §6).
    pub kafka_security_protocol: String,

    /// `CommitListener`'s per-poll block, spec default 500ms.
    pub commit_poll_timeout: Duration,

    /// `MetadataPoller`'s per-cycle describe/list deadline, spec default 30s.
    pub metadata_cycle_deadline: Duration,

    /// `MetadataPoller`'s between-cycle sleep, spec default 30s.
    pub metadata_cycle_sleep: Duration,

    /// Delay between `MetadataPoller` broker-client construction retries, spec default 30s.
    pub metadata_admin_retry_delay: Duration,

    /// `LogEndPoller`'s success-path between-cycle sleep, spec default 10s.
    pub log_end_cycle_sleep: Duration,

    /// `LogEndPoller`'s error-path between-cycle sleep, spec default 30s. `CommitListener`
    /// has no equivalent field: spec §4.2 calls for no backoff between reconnects beyond
    /// the natural cost of consumer construction.
    pub error_sleep: Duration,

    /// TTL of the reverse-DNS result cache (spec §9 design note, made concrete in
    /// SPEC_FULL §4.6), default 60s.
    pub dns_cache_ttl: Duration,
}

impl TrackerConfig {
    /// Build a config with spec-mandated default timings from just the two values spec §6
    /// calls out as externally injected.
    pub fn new(kafka_brokers: impl Into<String>, kafka_security_protocol: impl Into<String>) -> Result<Self, TrackerError> {
        let kafka_security_protocol = kafka_security_protocol.into();
        if !KAFKA_RECOGNISED_SECURITY_PROTOCOLS.contains(&kafka_security_protocol.as_str()) {
            return Err(TrackerError::InvalidSecurityProtocol(kafka_security_protocol));
        }

        Ok(TrackerConfig {
            kafka_brokers: kafka_brokers.into(),
            kafka_security_protocol,
            commit_poll_timeout: Duration::from_millis(500),
            metadata_cycle_deadline: Duration::from_secs(30),
            metadata_cycle_sleep: Duration::from_secs(30),
            metadata_admin_retry_delay: Duration::from_secs(30),
            log_end_cycle_sleep: Duration::from_secs(10),
            error_sleep: Duration::from_secs(30),
            dns_cache_ttl: Duration::from_secs(60),
        })
    }

    /// Read `KAFKA_BROKERS` / `KAFKA_SECURITY_PROTOCOL` from the environment.
    ///
    /// The out-of-scope entry point (spec §1) is expected to call this, or build a
    /// [`TrackerConfig`] some other way (e.g. from a parsed CLI flag); this crate doesn't
    /// care which, as long as it ends up with one.
    pub fn from_env() -> Result<Self, TrackerError> {
        let brokers = std::env::var("KAFKA_BROKERS").map_err(|_| TrackerError::MissingConfig("KAFKA_BROKERS"))?;
        let security_protocol =
            std::env::var("KAFKA_SECURITY_PROTOCOL").map_err(|_| TrackerError::MissingConfig("KAFKA_SECURITY_PROTOCOL"))?;
        Self::new(brokers, security_protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognised_security_protocol() {
        let err = TrackerConfig::new("localhost:9092", "TOTALLY_NOT_A_PROTOCOL").unwrap_err();
        assert!(matches!(err, TrackerError::InvalidSecurityProtocol(_)));
    }

    #[test]
    fn accepts_recognised_security_protocols() {
        for protocol in KAFKA_RECOGNISED_SECURITY_PROTOCOLS {
            assert!(TrackerConfig::new("localhost:9092", *protocol).is_ok());
        }
    }
}
