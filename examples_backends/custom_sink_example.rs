use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing_context_log::format::Rendered;
use tracing_context_log::init::init_tracing;
use tracing_context_log::sink::LogSink;
use tracing_context_log::transport::SinkTransport;
use tracing_context_log::{ContextLogger, Options};

/// Example of shipping records to a custom backend by implementing the
/// `LogSink` trait directly.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, record: &Rendered) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target DB.
        println!("[my-custom-db] {}", record.line);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let (transport, handle) =
        SinkTransport::new(Arc::new(MyCustomDbSink), 1024, 64, Duration::from_millis(100));
    let logger = ContextLogger::with_transports(
        Options::from_env().log_level("info").use_structured_format(true),
        vec![Arc::new(transport)],
    )
    .expect("valid options");

    init_tracing(logger.clone()).expect("no other subscriber installed");

    tracing::info!(target: "custom_sink", "custom sink example started");
    logger
        .in_request(async {
            tracing::error!(target: "custom_sink", db = "my-custom-db", "simulated error inside a request");
        })
        .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.abort();
}
