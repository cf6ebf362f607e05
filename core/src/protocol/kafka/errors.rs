//! Error codes written into response bodies.
//!
//! Only the codes kestrel can actually produce are modelled.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum KafkaErrorCode {
    #[default]
    NoError = 0,
    UnknownTopicOrPartition = 3,
    UnsupportedVersion = 35,
    KafkaStorageError = 56,
    UnknownTopicId = 100,
}

impl KafkaErrorCode {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Upper-case name used by Kafka clients, e.g. `UNKNOWN_TOPIC_ID`.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "NONE",
            Self::UnknownTopicOrPartition => "UNKNOWN_TOPIC_OR_PARTITION",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::KafkaStorageError => "KAFKA_STORAGE_ERROR",
            Self::UnknownTopicId => "UNKNOWN_TOPIC_ID",
        }
    }
}

impl std::fmt::Display for KafkaErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i16())
    }
}
