use crate::errors::ErrorRecord;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// JSON logs on stderr; stdout belongs to the stdio transport.
pub fn init() {
    let fmt_layer = fmt::layer().json().with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Where the dispatcher reports failures. Injected so tests can record or mute it.
pub trait ErrorSink: Send + Sync {
    fn report(&self, scope: &str, err: &ErrorRecord);
}

pub struct TracingSink {
    server: String,
}

impl TracingSink {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into() }
    }
}

impl ErrorSink for TracingSink {
    fn report(&self, scope: &str, err: &ErrorRecord) {
        let details = err.details.as_ref().map(|d| serde_json::Value::Object(d.clone()).to_string());
        tracing::error!(
            server = %self.server,
            scope = scope,
            code = %err.code,
            details = details.as_deref(),
            "{}",
            err.message
        );
    }
}

#[cfg(test)]
pub struct NullSink;

#[cfg(test)]
impl ErrorSink for NullSink {
    fn report(&self, _scope: &str, _err: &ErrorRecord) {}
}

/// One line per handled request, whatever the transport.
pub fn audit(
    request_id: &str,
    transport: &str,
    method: &str,
    target: &str,
    decision: &str,
    code: &str,
    duration_ms: u64,
) {
    tracing::info!(
        request_id = request_id,
        transport = transport,
        method = method,
        subject = target,
        decision = decision,
        code = code,
        duration_ms = duration_ms,
        "audit"
    );
}
