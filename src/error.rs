use std::error::Error;
use std::thread;

use thiserror::Error;
use uuid::Uuid;

use crate::backtrace_support::current_stacktrace;
use crate::protocol::{Event, Exception, Level, Mechanism};
use crate::utils::parse_type_from_debug;
use crate::Hub;

/// Misuse of the scope stack.
///
/// None of these are fatal: the stack keeps its base scope no matter what
/// and the offending operation is skipped or clamped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A pop was attempted while only the base scope was left.
    #[error("cannot pop the base scope")]
    PopBaseScope,
    /// A guard was dropped while scopes pushed after it were still alive.
    #[error("scope guard for depth {expected} dropped out of order at depth {actual}")]
    OutOfOrderPop {
        /// The depth the guard was created for.
        expected: usize,
        /// The depth of the stack when the guard was dropped.
        actual: usize,
    },
    /// A guard was dropped after its scope had already been popped.
    #[error("scope guard for depth {expected} is stale, stack depth is {actual}")]
    StaleGuard {
        /// The depth the guard was created for.
        expected: usize,
        /// The depth of the stack when the guard was dropped.
        actual: usize,
    },
    /// A `configure_scope` callback pushed or popped scopes itself.
    #[error("scope stack changed while configuring the scope, dropping the changes")]
    ChangedDuringConfigure,
}

/// A failure inside the capture machinery itself.
///
/// These never reach the host application.  They are reported through
/// [`ClientOptions::internal_error_handler`](crate::ClientOptions) and the
/// debug output, and whatever was being done continues with partial data.
#[derive(Debug, Error)]
pub enum InternalError {
    /// An event processor returned an error.
    #[error("event processor `{processor}` failed: {error:#}")]
    ProcessorFailed {
        /// The processor's name.
        processor: String,
        /// The error it returned.
        error: anyhow::Error,
    },
    /// An event processor panicked.
    #[error("event processor `{processor}` panicked: {message}")]
    ProcessorPanicked {
        /// The processor's name.
        processor: String,
        /// The panic message.
        message: String,
    },
    /// An integration failed to install.
    #[error("integration `{identifier}` failed to install: {error:#}")]
    IntegrationInstall {
        /// The integration identifier.
        identifier: &'static str,
        /// The error returned by the install hook.
        error: anyhow::Error,
    },
    /// An integration with the same identifier was installed before.
    #[error("integration `{identifier}` is already installed")]
    DuplicateIntegration {
        /// The integration identifier.
        identifier: &'static str,
    },
    /// An event was captured while another capture was running on the same
    /// thread.
    #[error("event captured from within event processing, dropping it")]
    RecursiveCapture,
    /// A field could not be extracted from a host data source.
    #[error("could not extract `{field}`: {error:#}")]
    Extraction {
        /// The field that was being extracted.
        field: &'static str,
        /// The underlying failure.
        error: anyhow::Error,
    },
    /// The scope stack was misused.
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

impl Hub {
    /// Captures a [`std::error::Error`].
    ///
    /// Creates an event from the given error and sends it to the current hub.
    /// A chain of errors will be resolved as well, and sorted oldest to
    /// newest, so the innermost cause comes first.  The stack of the
    /// capturing call is attached to the outermost error.
    pub fn capture_error<E: Error + ?Sized>(&self, error: &E) -> Uuid {
        if self.client().is_none() {
            return Uuid::nil();
        }
        let mut event = event_from_error(error);
        if let Some(exception) = event.exception.last_mut() {
            exception.stacktrace = current_stacktrace();
        }
        self.capture_event(event)
    }

    /// Captures the given error, or the currently propagating panic.
    ///
    /// With `Some(error)` this is [`Hub::capture_error`].  With `None` an
    /// event is only created while the current thread is unwinding (for
    /// instance from a `Drop` implementation), otherwise nothing happens and
    /// the nil id is returned.
    pub fn capture_exception(&self, error: Option<&(dyn Error + 'static)>) -> Uuid {
        match error {
            Some(error) => self.capture_error(error),
            None if thread::panicking() => {
                if self.client().is_none() {
                    return Uuid::nil();
                }
                self.capture_event(event_from_unwinding())
            }
            None => Uuid::nil(),
        }
    }
}

/// Create a vigil `Event` from a `std::error::Error`.
///
/// A chain of errors will be resolved as well, and sorted oldest to newest.
///
/// # Examples
///
/// ```
/// #[derive(Debug, thiserror::Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = vigil::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, vigil::Level::Error);
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error<E: Error + ?Sized>(err: &E) -> Event {
    let mut exceptions = vec![exception_from_error(err)];

    let mut source = err.source();
    while let Some(err) = source {
        exceptions.push(exception_from_error(err));
        source = err.source();
    }

    exceptions.reverse();
    Event {
        exception: exceptions,
        level: Level::Error,
        ..Default::default()
    }
}

fn exception_from_error<E: Error + ?Sized>(err: &E) -> Exception {
    let dbg = format!("{err:?}");
    let value = err.to_string();

    // Message-only errors debug-print as their quoted message.
    let ty = if dbg == format!("{value:?}") {
        String::from("Error")
    } else {
        parse_type_from_debug(err)
    };
    Exception {
        ty,
        value: Some(value),
        ..Default::default()
    }
}

fn event_from_unwinding() -> Event {
    let exception = Exception {
        ty: "panic".into(),
        value: Some(format!(
            "thread '{}' is unwinding",
            thread::current().name().unwrap_or("<unnamed>")
        )),
        stacktrace: current_stacktrace(),
        mechanism: Some(Mechanism {
            ty: "unwind".into(),
            handled: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };
    Event {
        exception: vec![exception],
        level: Level::Fatal,
        ..Default::default()
    }
}
