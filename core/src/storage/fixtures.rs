//! Builders for metadata log segments: KRaft record values, v2 record
//! batches and whole segments.
//!
//! Compiled into the crate's unit tests (through `storage/tests.rs`) and into
//! the integration tests (through `tests/common/mod.rs`). The including module
//! must have `KafkaBufMutExt` in scope.

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::KafkaBufMutExt;

pub fn topic_record_value(name: &str, topic_id: Uuid) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(1); // frame version
    buf.put_u8(2); // TopicRecord
    buf.put_u8(0);
    buf.put_compact_string(name);
    buf.put_uuid(&topic_id);
    buf.put_empty_tagged_fields();
    buf.freeze()
}

pub fn partition_record_value(
    partition_id: i32,
    topic_id: Uuid,
    replicas: &[i32],
    isr: &[i32],
    leader: i32,
    leader_epoch: i32,
) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(1);
    buf.put_u8(3); // PartitionRecord
    buf.put_u8(1);
    buf.put_i32(partition_id);
    buf.put_uuid(&topic_id);
    buf.put_compact_i32_array(replicas);
    buf.put_compact_i32_array(isr);
    buf.put_compact_i32_array(&[]); // removing replicas
    buf.put_compact_i32_array(&[]); // adding replicas
    buf.put_i32(leader);
    buf.put_i32(leader_epoch);
    buf.put_i32(0); // partition epoch
    buf.put_compact_array_len(1); // directories
    buf.put_uuid(&Uuid::from_bytes([0x10; 16]));
    buf.put_empty_tagged_fields();
    buf.freeze()
}

pub fn feature_level_record_value(name: &str, level: i16) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(1);
    buf.put_u8(12); // FeatureLevelRecord
    buf.put_u8(0);
    buf.put_compact_string(name);
    buf.put_i16(level);
    buf.put_empty_tagged_fields();
    buf.freeze()
}

/// Encodes one uncompressed v2 record batch holding `values`.
pub fn record_batch(base_offset: i64, values: &[Bytes]) -> Bytes {
    let mut records = BytesMut::new();
    for (i, value) in values.iter().enumerate() {
        let mut record = BytesMut::new();
        record.put_i8(0); // attributes
        record.put_varlong(0); // timestamp delta
        record.put_varint(i as i32); // offset delta
        record.put_varint(-1); // null key
        record.put_varint(value.len() as i32);
        record.put_slice(value);
        record.put_varint(0); // headers

        records.put_varint(record.len() as i32);
        records.put_slice(&record);
    }

    let mut batch = BytesMut::new();
    batch.put_i64(base_offset);
    batch.put_i32(49 + records.len() as i32);
    batch.put_i32(1); // partition leader epoch
    batch.put_i8(2); // magic
    batch.put_u32(0); // crc, not verified
    batch.put_i16(0); // attributes
    batch.put_i32(values.len().saturating_sub(1) as i32);
    batch.put_i64(1_726_045_943_832);
    batch.put_i64(1_726_045_943_832);
    batch.put_i64(-1); // producer id
    batch.put_i16(-1); // producer epoch
    batch.put_i32(-1); // base sequence
    batch.put_i32(values.len() as i32);
    batch.put_slice(&records);
    batch.freeze()
}

/// Concatenates batches into a metadata log segment.
pub fn metadata_log(batches: &[Vec<Bytes>]) -> Bytes {
    let mut log = BytesMut::new();
    let mut offset = 0i64;
    for values in batches {
        log.put_slice(&record_batch(offset, values));
        offset += values.len() as i64;
    }
    log.freeze()
}
