use bytes_parser::BytesParser;

use crate::errors::DecodeError;
use crate::decoder::utils::{parse_i16, parse_i32, parse_i64, parse_str};
use crate::types::{GroupTopicPartition, OffsetRecord};

/// Offset that a Kafka consumer of a group has reached when consuming a partition of a topic.
///
/// This is produced by the Group Coordinator when handling an `OffsetCommitRequest`: it's
/// the Coordinator informing itself that "this group consumed this partition up to this
/// offset". If a partition gets reassigned to another consumer in the same group, the new
/// assignee reads this back to know where to resume from.
///
/// Kafka materialises this message type from two generated schemas: `OffsetCommitKey` and
/// `OffsetCommitValue`. Fields below are marked `(KEY)` or `(PAYLOAD)` depending on which
/// half of the message they come from.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct OffsetCommit {
    /// **(KEY)** First 2 bytes of the key, identifying this message's variant.
    pub message_version: i16,

    /// **(KEY)** Group the consumer belongs to.
    pub group: String,

    /// **(KEY)** Topic the consumer subscribes to.
    pub topic: String,

    /// **(KEY)** Partition the consumer is assignee of.
    pub partition: i32,

    /// **(PAYLOAD)** `true` when there was no payload: a tombstone, marking this key removed.
    pub is_tombstone: bool,

    /// **(PAYLOAD)** Controls how the rest of the payload is parsed.
    pub schema_version: i16,

    /// **(PAYLOAD)** Offset the group has reached consuming `partition` of `topic`.
    pub offset: i64,

    /// **(PAYLOAD)** Leader epoch of the previously consumed record, or `-1` if unknown.
    pub leader_epoch: i32,

    /// **(PAYLOAD)** Consumer-set optional metadata string; empty by default consumer behaviour.
    pub metadata: String,

    /// **(PAYLOAD)** When the offset was committed, in epoch milliseconds.
    pub commit_timestamp_ms: i64,

    /// **(PAYLOAD)** When the offset falls out of retention, in epoch milliseconds. No longer
    /// supported by modern Kafka brokers, which always set this to `-1`.
    pub expire_timestamp_ms: i64,
}

impl OffsetCommit {
    /// Parse the key-half fields. Based on `kafka.internals.generated.OffsetCommitKey#read`.
    pub(crate) fn try_from(parser: &mut BytesParser, message_version: i16) -> Result<Self, DecodeError> {
        Ok(OffsetCommit {
            message_version,
            group: parse_str(parser)?,
            topic: parse_str(parser)?,
            partition: parse_i32(parser)?,
            is_tombstone: true,
            ..Default::default()
        })
    }

    /// Parse the payload-half fields. Based on `kafka.internals.generated.OffsetCommitValue#read`.
    pub(crate) fn parse_payload(&mut self, parser: &mut BytesParser) -> Result<(), DecodeError> {
        self.is_tombstone = false;

        self.schema_version = parse_i16(parser)?;
        if !(0..=3).contains(&self.schema_version) {
            return Err(DecodeError::UnsupportedOffsetCommitSchema(self.schema_version));
        }

        self.offset = parse_i64(parser)?;

        self.leader_epoch = if self.schema_version >= 3 { parse_i32(parser)? } else { -1 };

        self.metadata = parse_str(parser)?;

        self.commit_timestamp_ms = parse_i64(parser)?;

        self.expire_timestamp_ms = if self.schema_version == 1 { parse_i64(parser)? } else { -1 };

        Ok(())
    }

    /// Split into the projection key and, unless this was a tombstone, the decoded record.
    pub(crate) fn into_key_and_record(self) -> (GroupTopicPartition, Option<OffsetRecord>) {
        let key = GroupTopicPartition {
            group: self.group,
            topic: self.topic,
            partition: self.partition,
        };

        if self.is_tombstone {
            return (key, None);
        }

        let record = OffsetRecord {
            offset: self.offset,
            metadata: self.metadata,
            commit_timestamp_ms: self.commit_timestamp_ms,
            expire_timestamp_ms: self.expire_timestamp_ms,
        };

        (key, Some(record))
    }
}

#[cfg(test)]
mod tests {
    use crate::decoder::utils::is_thread_safe;
    use crate::decoder::offset_commit::OffsetCommit;

    #[test]
    fn test_types_thread_safety() {
        is_thread_safe::<OffsetCommit>();
    }
}
