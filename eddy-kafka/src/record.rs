use std::fmt::Display;

use bon::Builder;
use eddy::types::Event;
use rdkafka::{message::BorrowedMessage, Message};

/// A single record as received from Kafka
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct KafkaRecord {
    /// Topic the record was read from
    pub topic: String,
    /// Partition the record was read from
    pub partition: Option<i32>,
    /// Raw record value
    pub payload: Vec<u8>,
    /// Raw record key
    pub key: Option<Vec<u8>>,
    /// Record timestamp in milliseconds since the unix epoch, if the broker provided one
    pub timestamp: Option<i64>,
}

impl KafkaRecord {
    /// Returns `None` for records without a payload
    pub(crate) fn from_message(msg: &BorrowedMessage<'_>) -> Option<Self> {
        let payload = msg.payload().map(|x| x.to_vec())?;
        Some(Self {
            topic: msg.topic().to_owned(),
            partition: Some(msg.partition()),
            payload,
            key: msg.key().map(|x| x.to_vec()),
            timestamp: msg.timestamp().to_millis(),
        })
    }
}

/// Turns a raw Kafka record into an event.
///
/// Records which fail to decode are logged and skipped by the source, they never stop
/// the stream.
pub trait RecordDecoder<K, V> {
    /// Error returned for records which can not be decoded
    type Error: Display;

    /// Decode a single record
    fn decode(&mut self, record: &KafkaRecord) -> Result<Event<K, V>, Self::Error>;
}

impl<K, V, E, F> RecordDecoder<K, V> for F
where
    F: FnMut(&KafkaRecord) -> Result<Event<K, V>, E>,
    E: Display,
{
    type Error = E;

    fn decode(&mut self, record: &KafkaRecord) -> Result<Event<K, V>, Self::Error> {
        self(record)
    }
}
