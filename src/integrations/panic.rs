//! The panic handler integration.
//!
//! The `PanicIntegration`, which is added by [`vigil::init`](crate::init)
//! unless `default_integrations` is turned off, installs a panic hook that
//! captures every panic as a fatal event through the current hub.
//! Panics are forwarded to the previously registered panic hook afterwards.
//!
//! # Configuration
//!
//! The panic integration can be configured with additional extractors, which
//! might optionally create an `Event` out of a `PanicInfo`.
//!
//! ```
//! let integration = vigil::integrations::panic::PanicIntegration::new()
//!     .add_extractor(|_info| None);
//! ```

#[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
use std::panic::{self, PanicInfo};

use crate::backtrace_support::current_stacktrace;
use crate::integrations::Integration;
use crate::protocol::{Event, Exception, Level, Mechanism};
use crate::utils::message_from_panic_payload;
use crate::{ClientOptions, Hub};

/// A panic handler that captures through the current hub.
///
/// Nothing happens unless the current hub has a client that lists the
/// [`PanicIntegration`].  The hub is only touched when it is not locked by
/// this very thread, which keeps a panic inside a scope callback from
/// dead-locking the hook.
#[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
pub fn panic_handler(info: &PanicInfo<'_>) {
    vigil_debug!(
        "[PanicIntegration] Panic detected: {}",
        message_from_panic_info(info)
    );
    Hub::with_active(|hub| {
        let event = hub.with_integration(|integration: &PanicIntegration| {
            Some(integration.event_from_panic_info(info))
        });
        if let Some(event) = event {
            vigil_debug!("[PanicIntegration] Created event {} for panic", event.event_id);
            hub.capture_event(event);
            if let Some(client) = hub.client() {
                client.flush(None);
            }
        }
    });
}

#[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
type PanicExtractor = dyn Fn(&PanicInfo<'_>) -> Option<Event> + Send + Sync;

/// The panic handler integration.
#[derive(Default)]
pub struct PanicIntegration {
    extractors: Vec<Box<PanicExtractor>>,
}

impl std::fmt::Debug for PanicIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicIntegration")
            .field("extractors", &self.extractors.len())
            .finish()
    }
}

impl Integration for PanicIntegration {
    fn identifier(&self) -> &'static str {
        "panic"
    }

    fn install(&self, _options: &ClientOptions) -> anyhow::Result<()> {
        vigil_debug!("[PanicIntegration] Installing panic hook");
        let next = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            panic_handler(info);
            next(info);
        }));
        Ok(())
    }
}

/// Extract the message of a panic.
#[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
pub fn message_from_panic_info<'a>(info: &'a PanicInfo<'_>) -> &'a str {
    message_from_panic_payload(info.payload())
}

impl PanicIntegration {
    /// Creates a new Panic Integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new extractor.
    ///
    /// Extractors are tried in registration order, the first event returned
    /// wins over the default panic event.
    #[must_use]
    #[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
    pub fn add_extractor<F>(mut self, f: F) -> Self
    where
        F: Fn(&PanicInfo<'_>) -> Option<Event> + Send + Sync + 'static,
    {
        self.extractors.push(Box::new(f));
        self
    }

    /// Creates an event from the given panic info.
    ///
    /// The stacktrace is calculated from the current frame.
    #[allow(deprecated)] // `PanicHookInfo` is only available in Rust 1.81+.
    pub fn event_from_panic_info(&self, info: &PanicInfo<'_>) -> Event {
        for extractor in &self.extractors {
            if let Some(event) = extractor(info) {
                return event;
            }
        }

        let msg = message_from_panic_info(info);
        let mut event = Event::new();
        event.level = Level::Fatal;
        event.exception = vec![Exception {
            ty: "panic".into(),
            mechanism: Some(Mechanism {
                ty: "panic".into(),
                handled: Some(false),
                ..Default::default()
            }),
            value: Some(msg.to_string()),
            stacktrace: current_stacktrace(),
            ..Default::default()
        }];
        if let Some(location) = info.location() {
            event.extra.insert(
                "panic.location".into(),
                format!("{}:{}:{}", location.file(), location.line(), location.column()).into(),
            );
        }
        event
    }
}
