//! Testing utilities and mock implementations.
//!
//! Mocks for every collaborator of a [`LogReceiver`](crate::receiver::LogReceiver),
//! so the whole pipeline can run in tests without a real parser, consumer or
//! storage extension.
//!
//! # Example
//!
//! ```rust,ignore
//! use logpipe_core::testing::{fixtures, MockConsumer, MockPipeline, MockStorageHost};
//!
//! let pipeline = Arc::new(MockPipeline::new());
//! let consumer = Arc::new(MockConsumer::new());
//! let host = Arc::new(MockStorageHost::new());
//!
//! let receiver = LogReceiver::new(&config, pipeline.clone(), consumer.clone(), host)?;
//! receiver.start().await?;
//! pipeline.emit(fixtures::record("a", "hello")).await?;
//! ```

mod mock_consumer;
mod mock_pipeline;
mod mock_storage_host;

pub use mock_consumer::MockConsumer;
pub use mock_pipeline::MockPipeline;
pub use mock_storage_host::MockStorageHost;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::config::Config;
    use crate::converter::ConverterConfig;
    use crate::emitter::EmitterConfig;
    use crate::record::{AttributeValue, Record, Severity};

    /// Create a record from host `host` with a string body.
    pub fn record(host: &str, body: &str) -> Record {
        Record::new(body)
            .with_resource("host", host)
            .with_severity(Severity::Info)
    }

    /// Create a record with an arbitrary resource.
    pub fn record_with_resource(resource: &[(&str, AttributeValue)], body: &str) -> Record {
        resource
            .iter()
            .fold(Record::new(body), |record, (key, value)| {
                record.with_resource(*key, value.clone())
            })
    }

    /// `count` records from one host, with bodies `"<prefix>-0"`, `"<prefix>-1"`...
    pub fn records(host: &str, prefix: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| record(host, &format!("{}-{}", prefix, i)))
            .collect()
    }

    /// A record that fails validation.
    pub fn malformed_record(host: &str) -> Record {
        record(host, "malformed").with_attribute("latency", f64::NAN)
    }

    /// String bodies of records, for order assertions.
    pub fn bodies(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.body().as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Config with the given emitter triggers and a small worker pool.
    pub fn config(max_batch_size: usize, flush_interval: Duration) -> Config {
        let mut config = Config::default();
        config.emitter = EmitterConfig::default()
            .with_max_batch_size(max_batch_size)
            .with_flush_interval(flush_interval);
        config.converter = ConverterConfig::default().with_worker_count(2);
        config
    }
}
