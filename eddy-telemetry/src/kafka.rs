//! Reading telemetry from Kafka, enabled with the `kafka` feature.
use eddy::types::Event;
use eddy_kafka::{KafkaRecord, KafkaSource, KafkaSourceError, RecordDecoder};

use crate::{
    app::TelemetrySource,
    config::KafkaConfig,
    parser::{TelemetryError, TelemetryParser},
};

impl RecordDecoder<String, f64> for TelemetryParser {
    type Error = TelemetryError;

    fn decode(&mut self, record: &KafkaRecord) -> Result<Event<String, f64>, Self::Error> {
        let json = std::str::from_utf8(&record.payload)
            .map_err(|e| TelemetryError::MalformedEvent(e.to_string()))?;
        self.parse(json)
    }
}

/// Subscribe to the configured topic, decoding every record with `parser`
pub fn kafka_source(
    config: &KafkaConfig,
    parser: TelemetryParser,
) -> Result<TelemetrySource, KafkaSourceError> {
    // librdkafka takes a comma separated list as a single broker string
    let brokers = config.broker_list().collect::<Vec<_>>().join(",");
    let source = KafkaSource::builder()
        .broker(brokers)
        .topic(config.topic.as_str())
        .group_id(config.group_id.as_str())
        .auto_offset_reset(config.auto_offset_reset.as_str())
        .build()
        .decode_with(parser)?;
    Ok(Box::new(source))
}
