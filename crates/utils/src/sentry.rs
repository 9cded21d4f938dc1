use sentry::ClientInitGuard;
use tracing_subscriber::{Layer, registry::LookupSpan};

/// Initialise error reporting when a DSN is configured. The returned guard
/// must live as long as the process so buffered events get flushed.
pub fn init_once(dsn: Option<&str>) -> Option<ClientInitGuard> {
    let dsn = dsn.filter(|d| !d.is_empty())?;
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    tracing::info!("Sentry error reporting enabled");
    Some(guard)
}

/// Tracing layer forwarding error events to Sentry. Harmless when Sentry was
/// never initialised.
pub fn sentry_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer()
}
