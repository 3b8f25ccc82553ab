//! Tracing initialization for the predictor binaries.
//!
//! [`init_tracing`] installs a global subscriber in one of two modes:
//! - **JSON mode**: one JSON object per event with nanosecond RFC 3339
//!   timestamps, for log shipping.
//! - **Pretty mode**: human-readable output for local runs.
//!
//! Both honour `RUST_LOG` (e.g. `RUST_LOG=hdb_ml=debug`) and default to `info`.
//!
//! [`TokenLeakGuard`] warns when an event or span carries a field that looks
//! like a credential, such as the inference server's bearer token.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the global tracing subscriber.
///
/// # Panics
///
/// Panics if the global subscriber has already been set.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(TokenLeakGuard);

    if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(NanosecondTimer)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        registry.with(json_layer).init();
    } else {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false);

        registry.with(pretty_layer).init();
    }
}

#[derive(Debug, Clone)]
struct NanosecondTimer;

impl tracing_subscriber::fmt::time::FormatTime for NanosecondTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.9fZ"))
    }
}

/// Layer that flags credential-looking fields before they reach any output.
#[derive(Debug, Clone)]
pub struct TokenLeakGuard;

impl<S> Layer<S> for TokenLeakGuard
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &span::Attributes<'_>,
        _id: &span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = CredentialVisitor::default();
        attrs.record(&mut visitor);
        if visitor.found {
            tracing::warn!("credential-like value recorded on a span; do not log tokens");
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = CredentialVisitor::default();
        event.record(&mut visitor);
        if visitor.found {
            tracing::warn!("credential-like value recorded on an event; do not log tokens");
        }
    }
}

/// Field names that are always treated as credentials.
const CREDENTIAL_FIELDS: &[&str] = &["auth_token", "token", "authorization", "bearer", "password"];

#[derive(Default)]
struct CredentialVisitor {
    found: bool,
}

impl CredentialVisitor {
    /// `Bearer <token>` strings are credentials wherever they appear.
    fn looks_like_credential(value: &str) -> bool {
        value
            .trim_start()
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
    }
}

impl Visit for CredentialVisitor {
    fn record_debug(&mut self, field: &Field, _value: &dyn fmt::Debug) {
        if CREDENTIAL_FIELDS.contains(&field.name()) {
            self.found = true;
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if CREDENTIAL_FIELDS.contains(&field.name()) || Self::looks_like_credential(value) {
            self.found = true;
        }
    }
}
