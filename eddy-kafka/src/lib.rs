//! Read events for an [eddy] pipeline from a Kafka topic.
mod record;
mod source;

pub use record::{KafkaRecord, RecordDecoder};
pub use source::{KafkaConsumerSource, KafkaSource, KafkaSourceError};
