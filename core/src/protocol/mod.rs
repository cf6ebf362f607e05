//! # Protocol Module
//!
//! Kafka wire protocol support for the broker. See [`kafka`] for the framing,
//! header and per-API codecs.

pub mod kafka;

pub use kafka::{
    KafkaCodec, KafkaCodecError, KafkaErrorCode, KafkaFrameCodec, KafkaRequest,
    KafkaRequestHeader, KafkaResponse, KafkaResponseHeader,
};
