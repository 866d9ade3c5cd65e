use crate::facade::ContextLogger;
use crate::layer::ContextLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Error returned by [`init_tracing`].
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber that routes every event through
/// `logger`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`ContextLayer`] as the
/// global default subscriber, so `tracing` macros anywhere in the process
/// are rendered by the logger's pipeline and attributed to the request
/// context they run in.
pub fn init_tracing(logger: ContextLogger) -> Result<(), InitError> {
    let subscriber = Registry::default().with(ContextLayer::new(logger));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
