use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tracing_context_log::middleware::{access_log, attach_request_context, AccessLog, AccessLogOptions};
use tracing_context_log::{ContextLogger, Options};

async fn checkout(logger: ContextLogger) -> &'static str {
    logger.info("charging card", Some("Checkout"));
    tokio::task::yield_now().await;
    logger.info("order placed", Some("Checkout"));
    "ok"
}

#[tokio::main]
async fn main() {
    let logger = ContextLogger::new(
        Options::from_env().log_level("info").attach_request_id(true),
    )
    .expect("valid logger options");

    let access = AccessLog::new(logger.clone(), AccessLogOptions::default());
    let handler_logger = logger.clone();
    let app = Router::new()
        .route("/checkout", get(move || checkout(handler_logger.clone())))
        .layer(from_fn_with_state(access, access_log))
        .layer(from_fn_with_state(logger.clone(), attach_request_context));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("bind 127.0.0.1:3000");
    logger.info("listening on 127.0.0.1:3000", None);
    axum::serve(listener, app).await.expect("server error");
}
