//! `OffsetMessageDecoder` (spec §4.1): a pure, side-effect-free (apart from logging) decoder
//! for records consumed from `__consumer_offsets`.

mod group_metadata;
mod offset_commit;
mod utils;

use bytes_parser::BytesParser;
use tracing::{debug, error};

use crate::types::{GroupTopicPartition, OffsetRecord};
use group_metadata::{ConsumerProtocolAssignment, GroupMetadata};
use offset_commit::OffsetCommit;

const MSG_V0_OFFSET_COMMIT: i16 = 0;
const MSG_V1_OFFSET_COMMIT: i16 = 1;
const MSG_V2_GROUP_METADATA: i16 = 2;

/// Outcome of decoding one `__consumer_offsets` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// An offset-commit record. `None` when the record was a tombstone (no payload): the
    /// key identifies what was removed, but there is no offset to report.
    OffsetCommit(GroupTopicPartition, Option<OffsetRecord>),

    /// A group-metadata record, decoded but not used by any poller in this crate (see
    /// spec §4.1/§9: `metadata_poller` sources membership from the admin client instead).
    GroupMetadata,

    /// Anything this decoder should not hand to a caller: a missing key, a missing value
    /// on a variant that requires one, an unrecognised variant, or a parse failure.
    Ignored,
}

/// Decode a single record from `__consumer_offsets`.
///
/// Implements spec §4.1 steps 1-5: an absent key or absent payload is an ignore signal
/// (step 1); the key's leading `i16` selects the message variant (step 2); an offset-commit
/// variant's payload is parsed into an [`OffsetRecord`] (step 3); any other recognised
/// variant is ignored (step 4); and any parse failure anywhere is logged and turned into
/// [`Decoded::Ignored`] rather than propagated (step 5) — a single malformed record must
/// never stop the caller's poll loop.
pub fn decode(key: Option<&[u8]>, payload: Option<&[u8]>) -> Decoded {
    let Some(key_bytes) = key else {
        debug!("ignoring __consumer_offsets record with no key");
        return Decoded::Ignored;
    };

    let mut key_parser = BytesParser::from(key_bytes);
    let message_version = match key_parser.parse_i16() {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "failed to parse __consumer_offsets message version");
            return Decoded::Ignored;
        },
    };

    match message_version {
        MSG_V0_OFFSET_COMMIT..=MSG_V1_OFFSET_COMMIT => decode_offset_commit(&mut key_parser, message_version, payload),
        MSG_V2_GROUP_METADATA => decode_group_metadata(&mut key_parser, message_version, payload),
        other => {
            debug!(message_version = other, "ignoring unrecognised __consumer_offsets message variant");
            Decoded::Ignored
        },
    }
}

fn decode_offset_commit(key_parser: &mut BytesParser, message_version: i16, payload: Option<&[u8]>) -> Decoded {
    let mut offset_commit = match OffsetCommit::try_from(key_parser, message_version) {
        Ok(oc) => oc,
        Err(e) => {
            error!(error = %e, "failed to parse offset-commit key");
            return Decoded::Ignored;
        },
    };

    if let Some(payload_bytes) = payload {
        let mut payload_parser = BytesParser::from(payload_bytes);
        if let Err(e) = offset_commit.parse_payload(&mut payload_parser) {
            error!(error = %e, group = %offset_commit.group, "failed to parse offset-commit payload");
            return Decoded::Ignored;
        }
    }

    let (key, record) = offset_commit.into_key_and_record();
    Decoded::OffsetCommit(key, record)
}

fn decode_group_metadata(key_parser: &mut BytesParser, message_version: i16, payload: Option<&[u8]>) -> Decoded {
    let mut group_metadata = match GroupMetadata::try_from(key_parser, message_version) {
        Ok(gm) => gm,
        Err(e) => {
            error!(error = %e, "failed to parse group-metadata key");
            return Decoded::Ignored;
        },
    };

    if let Some(payload_bytes) = payload {
        let mut payload_parser = BytesParser::from(payload_bytes);
        if let Err(e) = group_metadata.parse_payload(&mut payload_parser) {
            error!(error = %e, group = %group_metadata.group, "failed to parse group-metadata payload");
            return Decoded::Ignored;
        }
    }

    Decoded::GroupMetadata
}

/// Parse a member's raw `ConsumerProtocolAssignment` bytes, as reported by the admin
/// client's describe-group call, into `(topic, partitions)` pairs.
///
/// `metadata_poller` is the only caller: unlike the key/payload pair `decode` above
/// handles, these bytes never flow through `__consumer_offsets` — they arrive inline on a
/// `DescribeGroups` response — but they use the same `ConsumerProtocolAssignment` wire
/// format as the payload embedded in a `GroupMetadata` commit record, so the parser is
/// shared.
pub(crate) fn parse_member_assignment(bytes: &[u8]) -> Vec<(String, Vec<i32>)> {
    let mut parser = BytesParser::from(bytes);
    match ConsumerProtocolAssignment::try_from(&mut parser) {
        Ok(assignment) => assignment
            .assigned_topic_partitions
            .into_iter()
            .map(|tp| (tp.topic, tp.partitions))
            .collect(),
        Err(e) => {
            error!(error = %e, "failed to parse member assignment");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_str(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as i16).to_be_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    fn offset_commit_key(group: &str, topic: &str, partition: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i16.to_be_bytes()); // message_version = 1
        encode_str(&mut buf, group);
        encode_str(&mut buf, topic);
        buf.extend_from_slice(&partition.to_be_bytes());
        buf
    }

    fn offset_commit_payload(offset: i64, metadata: &str, commit_ts: i64, expire_ts: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i16.to_be_bytes()); // schema_version = 1 (carries expire_timestamp)
        buf.extend_from_slice(&offset.to_be_bytes());
        encode_str(&mut buf, metadata);
        buf.extend_from_slice(&commit_ts.to_be_bytes());
        buf.extend_from_slice(&expire_ts.to_be_bytes());
        buf
    }

    #[test]
    fn decodes_well_formed_offset_commit() {
        let key = offset_commit_key("g1", "t1", 3);
        let payload = offset_commit_payload(100, "", 1000, 2000);

        match decode(Some(&key), Some(&payload)) {
            Decoded::OffsetCommit(gtp, Some(record)) => {
                assert_eq!(gtp.group, "g1");
                assert_eq!(gtp.topic, "t1");
                assert_eq!(gtp.partition, 3);
                assert_eq!(record.offset, 100);
                assert_eq!(record.commit_timestamp_ms, 1000);
                assert_eq!(record.expire_timestamp_ms, 2000);
            },
            other => panic!("expected OffsetCommit with a record, got {other:?}"),
        }
    }

    #[test]
    fn tombstone_offset_commit_has_no_record() {
        let key = offset_commit_key("g1", "t1", 0);

        match decode(Some(&key), None) {
            Decoded::OffsetCommit(gtp, None) => {
                assert_eq!(gtp.group, "g1");
            },
            other => panic!("expected a tombstone OffsetCommit, got {other:?}"),
        }
    }

    #[test]
    fn group_metadata_variant_is_decoded_but_distinct() {
        let mut key = Vec::new();
        key.extend_from_slice(&2i16.to_be_bytes());
        encode_str(&mut key, "g1");

        assert_eq!(decode(Some(&key), None), Decoded::GroupMetadata);
    }

    #[test]
    fn unknown_variant_is_ignored() {
        let mut key = Vec::new();
        key.extend_from_slice(&99i16.to_be_bytes());

        assert_eq!(decode(Some(&key), None), Decoded::Ignored);
    }

    #[test]
    fn missing_key_is_ignored() {
        assert_eq!(decode(None, Some(&[1, 2, 3])), Decoded::Ignored);
    }

    #[test]
    fn truncated_bytes_never_panic_and_are_ignored() {
        crate::init_test_tracing();
        for len in 0..8 {
            let garbage = vec![0xFFu8; len];
            assert_eq!(decode(Some(&garbage), Some(&garbage)), Decoded::Ignored);
        }
    }

    #[test]
    fn decoder_is_idempotent() {
        let key = offset_commit_key("g1", "t1", 3);
        let payload = offset_commit_payload(100, "", 1000, 2000);

        assert_eq!(decode(Some(&key), Some(&payload)), decode(Some(&key), Some(&payload)));
    }

    #[test]
    fn random_bytes_never_panic() {
        // A small deterministic pseudo-random sweep: the decoder must always return
        // Ignored or a valid decode, and must never panic, for arbitrary input.
        let mut state: u64 = 0x5EED;
        for _ in 0..256 {
            let mut buf = Vec::with_capacity(16);
            for _ in 0..16 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                buf.push((state >> 56) as u8);
            }
            let _ = decode(Some(&buf), Some(&buf));
        }
    }
}
