use bytes_parser::BytesParserError;
use thiserror::Error;

/// Errors that can occur while decoding a record from `__consumer_offsets`.
///
/// A `DecodeError` never escapes [`crate::decoder::decode`]: callers only ever see
/// [`crate::decoder::Decoded::Ignored`] when decoding fails. The variants exist so the
/// decoder can log a meaningful message before discarding the record (spec §4.1 step 5).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failure while parsing bytes: {0}")]
    ByteParsing(#[source] BytesParserError),

    #[error("unsupported offset-commit schema version: {0}")]
    UnsupportedOffsetCommitSchema(i16),

    #[error("unsupported group-metadata schema version: {0}")]
    UnsupportedGroupMetadataSchema(i16),

    #[error("unsupported consumer-protocol-subscription version: {0}")]
    UnsupportedSubscriptionVersion(i16),

    #[error("unsupported consumer-protocol-assignment version: {0}")]
    UnsupportedAssignmentVersion(i16),
}

/// Errors surfaced to a caller constructing or configuring the tracker.
///
/// Nothing in the three poller loops ever returns a `TrackerError`: per spec §7, every
/// failure a loop can encounter is caught, logged, and retried internally. This type only
/// covers failures that happen before a poller is even started.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("missing required configuration value: {0}")]
    MissingConfig(&'static str),

    #[error("'{0}' is not a Kafka-recognised security protocol")]
    InvalidSecurityProtocol(String),
}
