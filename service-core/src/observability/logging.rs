use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging for a service binary.
///
/// `RUST_LOG` wins when set; otherwise the configured default level applies.
/// Output is flattened JSON so log aggregation can index the event fields
/// (company_id, quote_id, request_id, ...) directly.
pub fn init_tracing(service_name: &str, log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "{},{}={}",
                log_level,
                service_name.replace('-', "_"),
                "debug"
            ))
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .init();
}
