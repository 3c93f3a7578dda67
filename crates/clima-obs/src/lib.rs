use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,clima=debug";

/// Initialize structured logging.
/// - JSON lines on stdout
/// - RUST_LOG respected; default to "info,clima=debug"
pub fn init(service_name: &str) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();

    match installed {
        Ok(()) => tracing::info!(service = %service_name, "Observability initialized"),
        Err(_) => tracing::debug!(service = %service_name, "Subscriber already installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init("clima-test");
        init("clima-test");
    }
}
