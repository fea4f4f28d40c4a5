use bytes_parser::BytesParser;

use crate::errors::DecodeError;
use crate::decoder::utils::{parse_i16, parse_i32, parse_i64, parse_str, parse_vec_bytes};

/// Current state of a consumer group, as tracked by the Group Coordinator: which consumers
/// are subscribed to what, and which partitions each is assigned.
///
/// This message type appears far less often in `__consumer_offsets` than `OffsetCommit`,
/// since it's only produced when consumers join or leave a group.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct GroupMetadata {
    /// **(KEY)** First 2 bytes of the key, identifying this message's variant.
    pub message_version: i16,

    /// **(KEY)** Group this struct describes.
    pub group: String,

    /// **(PAYLOAD)** `true` when there was no payload: a tombstone, marking this group removed.
    pub is_tombstone: bool,

    /// **(PAYLOAD)** Controls how the rest of the payload is parsed.
    pub schema_version: i16,

    /// **(PAYLOAD)** `consumer` or `connect`, depending on which assignor protocol is in use.
    pub protocol_type: String,

    /// **(PAYLOAD)** Monotonically increasing; changes whenever group membership changes.
    pub generation: i32,

    /// **(PAYLOAD)** Identifier of the partition-assignor implementation used by this group.
    pub protocol: String,

    /// **(PAYLOAD)** Member ID of this group's leader.
    pub leader: String,

    /// **(PAYLOAD)** When this group state snapshot was captured, in epoch milliseconds.
    pub current_state_timestamp_ms: i64,

    /// **(PAYLOAD)** Members currently part of `group`.
    pub members: Vec<MemberMetadata>,
}

impl GroupMetadata {
    /// Parse the key-half fields. Based on `kafka.internals.generated.GroupMetadataKey#read`.
    pub(crate) fn try_from(parser: &mut BytesParser, message_version: i16) -> Result<Self, DecodeError> {
        Ok(GroupMetadata {
            message_version,
            group: parse_str(parser)?,
            is_tombstone: true,
            ..Default::default()
        })
    }

    /// Parse the payload-half fields. Based on `kafka.internals.generated.GroupMetadataValue#read`.
    pub(crate) fn parse_payload(&mut self, parser: &mut BytesParser) -> Result<(), DecodeError> {
        self.is_tombstone = false;

        self.schema_version = parse_i16(parser)?;
        if !(0..=3).contains(&self.schema_version) {
            return Err(DecodeError::UnsupportedGroupMetadataSchema(self.schema_version));
        }

        self.protocol_type = parse_str(parser)?;
        self.generation = parse_i32(parser)?;
        self.protocol = parse_str(parser)?;
        self.leader = parse_str(parser)?;

        self.current_state_timestamp_ms = if self.schema_version >= 2 { parse_i64(parser)? } else { -1 };

        let members_len = parse_i32(parser)?;
        self.members = Vec::with_capacity(members_len.max(0) as usize);
        for _ in 0..members_len {
            self.members.push(MemberMetadata::try_from(parser, self.schema_version)?);
        }

        Ok(())
    }
}

/// A single consumer instance as reported by a `GroupMetadata` payload.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct MemberMetadata {
    pub id: String,
    pub group_instance_id: String,
    pub client_id: String,
    pub client_host: String,
    pub rebalance_timeout: i32,
    pub session_timeout: i32,
    pub subscription: ConsumerProtocolSubscription,
    pub assignment: ConsumerProtocolAssignment,
}

impl MemberMetadata {
    /// Based on `kafka.internals.generated.GroupMetadataValue.MemberMetadata#read`.
    fn try_from(parser: &mut BytesParser, schema_version: i16) -> Result<Self, DecodeError> {
        let mut member = Self {
            id: parse_str(parser)?,
            ..Default::default()
        };

        if schema_version >= 3 {
            member.group_instance_id = parse_str(parser)?;
        }

        member.client_id = parse_str(parser)?;
        member.client_host = parse_str(parser)?;

        member.rebalance_timeout = if schema_version >= 1 { parse_i32(parser)? } else { 0 };
        member.session_timeout = parse_i32(parser)?;

        let subscription_bytes_len = parse_i32(parser)?;
        let mut subscription_parser =
            parser.from_slice(subscription_bytes_len as usize).map_err(DecodeError::ByteParsing)?;
        member.subscription = ConsumerProtocolSubscription::try_from(&mut subscription_parser)?;

        let assignment_bytes_len = parse_i32(parser)?;
        let mut assignment_parser =
            parser.from_slice(assignment_bytes_len as usize).map_err(DecodeError::ByteParsing)?;
        member.assignment = ConsumerProtocolAssignment::try_from(&mut assignment_parser)?;

        Ok(member)
    }
}

/// The topics (and, depending on version, the partitions already owned) a member subscribes to.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct ConsumerProtocolSubscription {
    version: i16,
    subscribed_topics: Vec<String>,
    user_data: Vec<u8>,
    owned_topic_partitions: Vec<TopicPartitions>,
    generation_id: i32,
    rack_id: String,
}

impl<'a> TryFrom<&mut BytesParser<'a>> for ConsumerProtocolSubscription {
    type Error = DecodeError;

    /// Based on `org.apache.kafka.common.message.ConsumerProtocolSubscription#read`.
    fn try_from(parser: &mut BytesParser) -> Result<Self, Self::Error> {
        let mut subscription = Self {
            version: parse_i16(parser)?,
            ..Default::default()
        };

        if !(0..=3).contains(&subscription.version) {
            return Err(DecodeError::UnsupportedSubscriptionVersion(subscription.version));
        }

        let subscribed_topics_len = parse_i32(parser)?;
        if subscribed_topics_len > 0 {
            subscription.subscribed_topics = Vec::with_capacity(subscribed_topics_len as usize);
            for _ in 0..subscribed_topics_len {
                subscription.subscribed_topics.push(parse_str(parser)?);
            }
        }

        subscription.user_data = parse_vec_bytes(parser)?;

        if subscription.version >= 1 {
            let owned_topic_partitions_len = parse_i32(parser)?;
            if owned_topic_partitions_len > 0 {
                subscription.owned_topic_partitions = Vec::with_capacity(owned_topic_partitions_len as usize);
                for _ in 0..owned_topic_partitions_len {
                    subscription.owned_topic_partitions.push(TopicPartitions::try_from(parser, subscription.version)?);
                }
            }
        }

        subscription.generation_id = if subscription.version >= 2 { parse_i32(parser)? } else { -1 };

        if subscription.version >= 3 {
            subscription.rack_id = parse_str(parser)?;
        }

        Ok(subscription)
    }
}

/// A collection of partitions belonging to a specific topic — either the full set, or a
/// sub-set such as an assignment, depending on the context it's parsed in.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct TopicPartitions {
    pub topic: String,
    pub partitions: Vec<i32>,
}

impl TopicPartitions {
    /// Based on `org.apache.kafka.common.message.ConsumerProtocolSubscription.TopicPartition#read`.
    fn try_from(parser: &mut BytesParser, version: i16) -> Result<Self, DecodeError> {
        if version > 3 {
            return Err(DecodeError::UnsupportedSubscriptionVersion(version));
        }

        let mut topic_partitions = Self {
            topic: parse_str(parser)?,
            ..Default::default()
        };

        let partitions_len = parse_i32(parser)?;
        if partitions_len > 0 {
            topic_partitions.partitions = Vec::with_capacity(partitions_len as usize);
            for _ in 0..partitions_len {
                topic_partitions.partitions.push(parse_i32(parser)?);
            }
        }

        Ok(topic_partitions)
    }
}

/// Partitions a member is actually assigned to consume, as decided by the Group Coordinator.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct ConsumerProtocolAssignment {
    version: i16,
    pub assigned_topic_partitions: Vec<TopicPartitions>,
    user_data: Vec<u8>,
}

impl<'a> TryFrom<&mut BytesParser<'a>> for ConsumerProtocolAssignment {
    type Error = DecodeError;

    /// Based on `org.apache.kafka.common.message.ConsumerProtocolAssignment#read`.
    fn try_from(parser: &mut BytesParser) -> Result<Self, Self::Error> {
        let mut assignment = Self {
            version: parse_i16(parser)?,
            ..Default::default()
        };

        if !(0..=3).contains(&assignment.version) {
            return Err(DecodeError::UnsupportedAssignmentVersion(assignment.version));
        }

        let assigned_topic_partitions_len = parse_i32(parser)?;
        if assigned_topic_partitions_len > 0 {
            assignment.assigned_topic_partitions = Vec::with_capacity(assigned_topic_partitions_len as usize);
            for _ in 0..assigned_topic_partitions_len {
                assignment.assigned_topic_partitions.push(TopicPartitions::try_from(parser, assignment.version)?);
            }
        }

        assignment.user_data = parse_vec_bytes(parser)?;

        Ok(assignment)
    }
}
