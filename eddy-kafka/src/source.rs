use std::collections::HashMap;
use std::time::Duration;

use bon::Builder;
use eddy::errorhandling::EddyFatal;
use eddy::sources::Source;
use eddy::types::Message;
use kafka_source_builder::SetAtLeastOneBroker;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, DefaultConsumerContext};
use rdkafka::Message as _;
use thiserror::Error;
use tracing::{info, warn};

use crate::{KafkaRecord, RecordDecoder};

/// Connection settings for consuming a Kafka topic.
/// Call [KafkaSource::decode_with] to turn it into a [Source].
/// NOTE: Records with an empty payload are not emitted to the stream.
///
/// # Usage
///
/// The source can be instantiated using the builder.
/// Custom [rdkafka configuration](https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md)
/// can be provided by calling `.conf(key, value)`.
///
/// ```
/// use eddy_kafka::KafkaSource;
///
/// let kafka_source = KafkaSource::builder()
///     .broker("localhost:9092") // at least one broker must be provided
///     .topic("flink-demo")
///     .group_id("flink_consumer")
///     .auto_offset_reset("latest")
///     .conf("log_level", "3") // additional custom config
///     .build();
/// ```
#[derive(Builder, Debug)]
#[builder(on(String, into))]
pub struct KafkaSource {
    #[builder(field)]
    kafka_config: HashMap<String, String>,
    #[builder(field)]
    brokers: Vec<String>,
    /// this is a workaround to check if at least one broker was provided
    #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
    _at_least_one_broker: (),
    topic: String,
    group_id: String,
    #[builder(default = "earliest".to_owned())]
    auto_offset_reset: String,
    /// Maximum time a single poll blocks waiting for a record
    #[builder(default = Duration::from_millis(100))]
    poll_timeout: Duration,
}

impl<S: kafka_source_builder::State> KafkaSourceBuilder<S> {
    /// Provide an additional config for the Kafka consumer.
    /// Note that `bootstrap.servers`, `group.id` and `auto.offset.reset` configs are
    /// ignored. Use the respective builder methods to supply these
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to consume from
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSourceBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl KafkaSource {
    /// Connect to the brokers and subscribe to the topic. Every record is turned into an
    /// event using `decoder`.
    pub fn decode_with<D>(self, decoder: D) -> Result<KafkaConsumerSource<D>, KafkaSourceError> {
        let consumer = create_consumer(
            &self.group_id,
            &self.brokers,
            &self.auto_offset_reset,
            &self.kafka_config,
        )?;
        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(KafkaSourceError::Subscribe)?;
        info!(
            "Subscribed to topic {} on {}",
            self.topic,
            self.brokers.join(",")
        );
        Ok(KafkaConsumerSource {
            consumer,
            decoder,
            poll_timeout: self.poll_timeout,
        })
    }
}

fn create_consumer(
    group_id: &str,
    brokers: &[String],
    auto_offset_reset: &str,
    extra_conf: &HashMap<String, String>,
) -> Result<BaseConsumer, KafkaSourceError> {
    let mut kafka_conf = ClientConfig::new();
    for (k, v) in extra_conf.iter() {
        kafka_conf.set(k, v);
    }
    kafka_conf
        .set("group.id", group_id)
        .set("bootstrap.servers", brokers.join(","))
        .set("auto.offset.reset", auto_offset_reset);
    kafka_conf
        .create()
        .map_err(KafkaSourceError::CreateConsumer)
}

/// A subscribed Kafka consumer decoding records into events.
/// This type can not be constructed directly, use [KafkaSource] instead.
pub struct KafkaConsumerSource<D> {
    consumer: BaseConsumer<DefaultConsumerContext>,
    decoder: D,
    poll_timeout: Duration,
}

impl<K, V, D> Source<K, V> for KafkaConsumerSource<D>
where
    D: RecordDecoder<K, V>,
{
    fn poll(&mut self) -> Option<Message<K, V>> {
        let msg = self
            .consumer
            .poll(self.poll_timeout)?
            .map_err(KafkaSourceError::Poll)
            .eddy_fatal();
        let record = KafkaRecord::from_message(&msg)?;
        match self.decoder.decode(&record) {
            Ok(event) => Some(Message::Data(event)),
            Err(e) => {
                warn!(
                    "Skipping undecodable record at {}/{}: {e}",
                    msg.topic(),
                    msg.partition()
                );
                None
            }
        }
    }

    #[inline(always)]
    fn is_finished(&mut self) -> bool {
        false // kafka is unbounded
    }

    fn suspend(&mut self) {
        self.consumer.unsubscribe();
        info!("Unsubscribed Kafka consumer");
    }
}

/// Possible errors which can occur in the Kafka consumer
#[derive(Debug, Error)]
pub enum KafkaSourceError {
    /// Polling the consumer failed
    #[error("Error polling Kafka consumer")]
    Poll(#[source] rdkafka::error::KafkaError),
    /// The consumer configuration was rejected
    #[error("Failed to create Kafka consumer")]
    CreateConsumer(#[source] rdkafka::error::KafkaError),
    /// Subscribing to the topic failed
    #[error("Could not subscribe consumer to topic")]
    Subscribe(#[source] rdkafka::error::KafkaError),
}

/// Doctests to assert some bad builders do not compile
/// see: https://stackoverflow.com/a/55327334
/// this should not compile because the broker is missing
/// ```compile_fail
/// use eddy_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .group_id("groupid")
/// .build();
/// ```
/// missing topic
/// ```compile_fail
/// use eddy_kafka::KafkaSource;
/// KafkaSource::builder()
/// .group_id("groupid")
/// .broker("broker.com")
/// .build();
/// ```
/// missing group id
/// ```compile_fail
/// use eddy_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("foobar")
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;
