use std::sync::Arc;
use std::time::Instant;

use tracing_context_log::transport::SinkTransport;
use tracing_context_log::noop_sink::NoopSink;
use tracing_context_log::{ContextLogger, Options};
use tokio::time::Duration;

/// Many concurrent requests, each logging through the façade into a
/// no-op sink. Measures the cost of context resolution plus formatting.
#[tokio::main]
async fn main() {
    let (transport, handle) = SinkTransport::new(
        Arc::new(NoopSink::default()),
        50_000,
        1_000,
        Duration::from_millis(200),
    );
    let dropped = Arc::clone(&transport.dropped_records);
    let logger = ContextLogger::with_transports(
        Options::new().log_level("info").use_structured_format(true),
        vec![Arc::new(transport)],
    )
    .expect("valid options");

    let requests: u64 = 1_000;
    let per_request: u64 = 100;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for r in 0..requests {
        let logger = logger.clone();
        tasks.push(tokio::spawn(async move {
            let inner = logger.clone();
            logger
                .in_request(async move {
                    for i in 0..per_request {
                        inner.info(format!("request {} step {}", r, i), None);
                        if i % 10 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
                .await
        }));
    }
    for task in tasks {
        let _ = task.await;
    }

    let n = requests * per_request;
    let elapsed = start.elapsed();
    println!(
        "default load: logged {} records from {} requests in {:?} (~{:.0} rec/s, {} dropped)",
        n,
        requests,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        dropped.load(std::sync::atomic::Ordering::Relaxed)
    );

    // Closing the last sender lets the forwarding task drain and exit.
    drop(logger);
    let _ = handle.await;
}
