//! In-memory topic index rebuilt from the metadata log.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::metadata_log::{
    parse_metadata_log, MetadataLogError, MetadataRecord, PartitionRecord, Result, TopicRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_ids: Vec<i32>,
    pub isr_ids: Vec<i32>,
    pub eligible_leader_replica_ids: Vec<i32>,
    pub last_known_elr_ids: Vec<i32>,
    pub offline_replica_ids: Vec<i32>,
}

impl From<PartitionRecord> for Partition {
    fn from(record: PartitionRecord) -> Self {
        Self {
            index: record.partition_id,
            leader_id: record.leader,
            leader_epoch: record.leader_epoch,
            replica_ids: record.replicas,
            isr_ids: record.isr,
            eligible_leader_replica_ids: Vec::new(),
            last_known_elr_ids: Vec::new(),
            offline_replica_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub id: Uuid,
    /// Partitions in the order they were registered.
    pub partitions: Vec<Partition>,
}

impl Topic {
    pub fn partition(&self, index: i32) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.index == index)
    }
}

/// Topics keyed by name, with a secondary id lookup.
///
/// Built once and never mutated afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataIndex {
    topics: HashMap<String, Topic>,
    names_by_id: HashMap<Uuid, String>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays metadata records in log order.
    ///
    /// A partition whose topic has not been registered yet is rejected.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = MetadataRecord>,
    {
        let mut by_id: HashMap<Uuid, Topic> = HashMap::new();
        let mut registration_order: Vec<Uuid> = Vec::new();

        for record in records {
            match record {
                MetadataRecord::Topic(TopicRecord { name, topic_id }) => {
                    match by_id.get_mut(&topic_id) {
                        Some(existing) => {
                            warn!(
                                "Topic id {} registered again as '{}' (was '{}')",
                                topic_id, name, existing.name
                            );
                            existing.name = name;
                        }
                        None => {
                            registration_order.push(topic_id);
                            by_id.insert(
                                topic_id,
                                Topic {
                                    name,
                                    id: topic_id,
                                    partitions: Vec::new(),
                                },
                            );
                        }
                    }
                }
                MetadataRecord::Partition(partition) => {
                    let topic = by_id.get_mut(&partition.topic_id).ok_or(
                        MetadataLogError::OrphanPartition {
                            topic_id: partition.topic_id,
                            partition: partition.partition_id,
                        },
                    )?;
                    let partition = Partition::from(partition);
                    match topic.partitions.iter_mut().find(|p| p.index == partition.index) {
                        Some(existing) => *existing = partition,
                        None => topic.partitions.push(partition),
                    }
                }
                MetadataRecord::Other { .. } => {}
            }
        }

        let mut index = Self::new();
        for topic_id in registration_order {
            let Some(topic) = by_id.remove(&topic_id) else {
                continue;
            };
            if let Some(previous) = index.topics.remove(&topic.name) {
                warn!(
                    "Topic '{}' re-registered with id {} (was {})",
                    topic.name, topic.id, previous.id
                );
                index.names_by_id.remove(&previous.id);
            }
            index.names_by_id.insert(topic.id, topic.name.clone());
            index.topics.insert(topic.name.clone(), topic);
        }
        Ok(index)
    }

    /// Builds the index from the bytes of a metadata log segment.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_records(parse_metadata_log(data)?)
    }

    /// Loads the index from a metadata log file. A missing file yields an
    /// empty index.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Metadata log {} not found, starting with no topics",
                    path.display()
                );
                return Ok(Self::new());
            }
            Err(e) => return Err(MetadataLogError::Io(e)),
        };

        let index = Self::parse(&data)?;
        info!(
            "Loaded {} topics with {} partitions from {}",
            index.topic_count(),
            index.partition_count(),
            path.display()
        );
        Ok(index)
    }

    pub fn topic_by_name(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn topic_by_id(&self, id: &Uuid) -> Option<&Topic> {
        self.names_by_id
            .get(id)
            .and_then(|name| self.topics.get(name))
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn partition_count(&self) -> usize {
        self.topics.values().map(|t| t.partitions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
