//! KRaft metadata log parsing.
//!
//! A `__cluster_metadata` segment is a sequence of v2 record batches. Each
//! record value is a versioned metadata record; the broker only interprets
//! topic and partition registrations and skips everything else.
//!
//! ```text
//! RecordBatch => base_offset:int64 batch_length:int32 partition_leader_epoch:int32
//!                magic:int8 crc:uint32 attributes:int16 last_offset_delta:int32
//!                base_timestamp:int64 max_timestamp:int64 producer_id:int64
//!                producer_epoch:int16 base_sequence:int32 records_count:int32 [Record]
//!
//! Record => length:varint attributes:int8 timestamp_delta:varlong offset_delta:varint
//!           key_length:varint key value_length:varint value [headers]
//!
//! MetadataRecord value => frame_version:uint8 record_type:uint8 version:uint8 body
//! ```
//!
//! The CRC is not verified.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::protocol::kafka::{ByteCursor, KafkaCodecError};

/// Size of the batch header up to and including `records_count`.
pub const RECORD_BATCH_HEADER_LEN: usize = 61;
/// `base_offset` and `batch_length`, which are not counted in `batch_length`.
pub const BATCH_LENGTH_PREFIX_LEN: usize = 12;
pub const RECORD_BATCH_MAGIC: i8 = 2;

const COMPRESSION_CODEC_MASK: i16 = 0x07;
const CONTROL_BATCH_FLAG: i16 = 0x20;

pub const TOPIC_RECORD_TYPE: u8 = 2;
pub const PARTITION_RECORD_TYPE: u8 = 3;

#[derive(Debug, Error)]
pub enum MetadataLogError {
    #[error("Malformed metadata log: {0}")]
    Codec(#[from] KafkaCodecError),
    #[error("Unsupported record batch magic {magic} at byte {position}")]
    InvalidMagic { magic: i8, position: usize },
    #[error("Invalid batch length {length} at byte {position}")]
    InvalidBatchLength { length: i32, position: usize },
    #[error("Invalid record count {0}")]
    InvalidRecordCount(i32),
    #[error("Invalid record length {0}")]
    InvalidRecordLength(i32),
    #[error("Compressed record batches are not supported (attributes {0:#06x})")]
    UnsupportedCompression(i16),
    #[error("Partition {partition} references topic {topic_id} before its topic record")]
    OrphanPartition { topic_id: Uuid, partition: i32 },
    #[error("Failed to read metadata log: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetadataLogError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatchHeader {
    pub base_offset: i64,
    pub batch_length: i32,
    pub partition_leader_epoch: i32,
    pub magic: i8,
    pub crc: u32,
    pub attributes: i16,
    pub last_offset_delta: i32,
    pub base_timestamp: i64,
    pub max_timestamp: i64,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub records_count: i32,
}

impl RecordBatchHeader {
    /// Decodes the header fields following `base_offset` and `batch_length`.
    fn decode_body(base_offset: i64, batch_length: i32, cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            base_offset,
            batch_length,
            partition_leader_epoch: cursor.read_i32()?,
            magic: cursor.read_i8()?,
            crc: cursor.read_u32()?,
            attributes: cursor.read_i16()?,
            last_offset_delta: cursor.read_i32()?,
            base_timestamp: cursor.read_i64()?,
            max_timestamp: cursor.read_i64()?,
            producer_id: cursor.read_i64()?,
            producer_epoch: cursor.read_i16()?,
            base_sequence: cursor.read_i32()?,
            records_count: cursor.read_i32()?,
        })
    }

    pub fn compression(&self) -> i16 {
        self.attributes & COMPRESSION_CODEC_MASK
    }

    pub fn is_control(&self) -> bool {
        self.attributes & CONTROL_BATCH_FLAG != 0
    }
}

/// One record of a v2 batch. Headers are not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub attributes: i8,
    pub timestamp_delta: i64,
    pub offset_delta: i32,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl Record {
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let length = cursor.read_varint()?;
        if length < 0 {
            return Err(MetadataLogError::InvalidRecordLength(length));
        }
        let mut body = ByteCursor::new(cursor.read_slice(length as usize)?);

        let attributes = body.read_i8()?;
        let timestamp_delta = body.read_varlong()?;
        let offset_delta = body.read_varint()?;
        let key = Self::read_varint_bytes(&mut body)?;
        let value = Self::read_varint_bytes(&mut body)?;

        Ok(Self {
            attributes,
            timestamp_delta,
            offset_delta,
            key,
            value,
        })
    }

    fn read_varint_bytes(cursor: &mut ByteCursor<'_>) -> Result<Option<Bytes>> {
        match cursor.read_varint()? {
            -1 => Ok(None),
            n if n < -1 => Err(MetadataLogError::InvalidRecordLength(n)),
            n => Ok(Some(cursor.read_bytes(n as usize)?)),
        }
    }
}

/// Registration of a topic name under a topic id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    pub name: String,
    pub topic_id: Uuid,
}

/// Registration of one partition of a previously registered topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    pub partition_id: i32,
    pub topic_id: Uuid,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
    pub leader: i32,
    pub leader_epoch: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRecord {
    Topic(TopicRecord),
    Partition(PartitionRecord),
    /// Any record type the broker does not interpret.
    Other { record_type: u8 },
}

impl MetadataRecord {
    /// Decodes a record value.
    pub fn decode(value: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(value);
        let _frame_version = cursor.read_u8()?;
        let record_type = cursor.read_u8()?;
        let _version = cursor.read_u8()?;

        match record_type {
            TOPIC_RECORD_TYPE => {
                let name = cursor.read_compact_string()?;
                let topic_id = cursor.read_uuid()?;
                Ok(MetadataRecord::Topic(TopicRecord { name, topic_id }))
            }
            PARTITION_RECORD_TYPE => {
                let partition_id = cursor.read_i32()?;
                let topic_id = cursor.read_uuid()?;
                let replicas = read_i32_array(&mut cursor)?;
                let isr = read_i32_array(&mut cursor)?;
                // removing and adding replicas
                read_i32_array(&mut cursor)?;
                read_i32_array(&mut cursor)?;
                let leader = cursor.read_i32()?;
                let leader_epoch = cursor.read_i32()?;
                Ok(MetadataRecord::Partition(PartitionRecord {
                    partition_id,
                    topic_id,
                    replicas,
                    isr,
                    leader,
                    leader_epoch,
                }))
            }
            other => Ok(MetadataRecord::Other { record_type: other }),
        }
    }
}

fn read_i32_array(cursor: &mut ByteCursor<'_>) -> Result<Vec<i32>> {
    let len = cursor.read_compact_array_len()?.unwrap_or(0);
    let mut values = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        values.push(cursor.read_i32()?);
    }
    Ok(values)
}

/// Parses every record batch of a metadata log segment, returning the
/// metadata records in log order.
pub fn parse_metadata_log(data: &[u8]) -> Result<Vec<MetadataRecord>> {
    let mut cursor = ByteCursor::new(data);
    let mut records = Vec::new();

    while cursor.has_remaining() {
        let position = cursor.offset();
        let base_offset = cursor.read_i64()?;
        let batch_length = cursor.read_i32()?;
        if batch_length < (RECORD_BATCH_HEADER_LEN - BATCH_LENGTH_PREFIX_LEN) as i32 {
            return Err(MetadataLogError::InvalidBatchLength {
                length: batch_length,
                position,
            });
        }

        let mut batch = ByteCursor::new(cursor.read_slice(batch_length as usize)?);
        let header = RecordBatchHeader::decode_body(base_offset, batch_length, &mut batch)?;

        if header.magic != RECORD_BATCH_MAGIC {
            return Err(MetadataLogError::InvalidMagic {
                magic: header.magic,
                position,
            });
        }
        if header.is_control() {
            trace!("Skipping control batch at offset {}", header.base_offset);
            continue;
        }
        if header.compression() != 0 {
            return Err(MetadataLogError::UnsupportedCompression(header.attributes));
        }
        if header.records_count < 0 {
            return Err(MetadataLogError::InvalidRecordCount(header.records_count));
        }

        debug!(
            "Metadata batch at offset {} with {} records",
            header.base_offset, header.records_count
        );

        for _ in 0..header.records_count {
            let record = Record::decode(&mut batch)?;
            let Some(value) = record.value else {
                continue;
            };
            let metadata = MetadataRecord::decode(&value)?;
            trace!("Metadata record: {:?}", metadata);
            records.push(metadata);
        }
    }

    Ok(records)
}
