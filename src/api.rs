use std::error::Error;

use uuid::Uuid;

use crate::processor::IntoProcessorOutcome;
use crate::protocol::{Event, Level};
use crate::{Hub, Integration, IntoBreadcrumbs, Scope, ScopeGuard};

/// Captures an event on the currently active client if any.
///
/// The event must already be assembled.  Typically code would instead use
/// the utility methods like [`capture_error`].  The return value is the
/// event ID.  In case no client is bound the return value will be the nil
/// UUID (`Uuid::nil`).
///
/// # Example
///
/// ```
/// use vigil::protocol::{Event, Level};
///
/// let mut event = Event::new();
/// event.message = Some("Hello World!".into());
/// event.level = Level::Info;
/// vigil::capture_event(event);
/// ```
pub fn capture_event(event: Event) -> Uuid {
    Hub::with_active(|hub| hub.capture_event(event))
}

/// Captures an arbitrary message.
///
/// This creates an event from the given message and sends it to the current hub.
pub fn capture_message(msg: &str, level: Level) -> Uuid {
    Hub::with_active(|hub| hub.capture_message(msg, level))
}

/// Captures a [`std::error::Error`] and its chain of sources.
///
/// See [`Hub::capture_error`].
pub fn capture_error<E: Error + ?Sized>(error: &E) -> Uuid {
    Hub::with_active(|hub| hub.capture_error(error))
}

/// Captures an error, or with `None` the panic the thread is unwinding from.
///
/// See [`Hub::capture_exception`].
pub fn capture_exception(error: Option<&(dyn Error + 'static)>) -> Uuid {
    Hub::with_active(|hub| hub.capture_exception(error))
}

/// Records a breadcrumb by calling a function.
///
/// The total number of breadcrumbs that can be recorded are limited by the
/// configuration on the client.  This function accepts any object that
/// implements `IntoBreadcrumbs` which is implemented for a varienty of
/// common types.  For efficiency reasons you can also pass a closure returning
/// a breadcrumb in which case the closure is only called if the client is
/// enabled.
///
/// The most common implementations that can be passed:
///
/// * `Breadcrumb`: to record a breadcrumb
/// * `Vec<Breadcrumb>`: to record more than one breadcrumb in one go.
/// * `Option<Breadcrumb>`: to record a breadcrumb or not
/// * additionally all of these can also be returned from an `FnOnce()`
///
/// # Example
///
/// ```
/// use vigil::protocol::{Breadcrumb, Map};
///
/// vigil::add_breadcrumb(|| Breadcrumb {
///     ty: "http".into(),
///     category: Some("request".into()),
///     data: {
///         let mut map = Map::new();
///         map.insert("method".into(), "GET".into());
///         map.insert("url".into(), "https://example.com/".into());
///         map
///     },
///     ..Default::default()
/// });
/// ```
pub fn add_breadcrumb<B: IntoBreadcrumbs>(breadcrumb: B) {
    Hub::with_active(|hub| hub.add_breadcrumb(breadcrumb))
}

/// Invokes a function that can modify the current scope.
///
/// The function is passed a mutable reference to the `Scope` so that
/// modifications can be performed.  Because there might currently not be a
/// client active it's possible that the callback might not be called at all.
/// As a result of this the return value of this closure must have a default
/// that is returned in such cases.
///
/// # Example
///
/// ```
/// vigil::configure_scope(|scope| {
///     scope.set_user(Some(vigil::protocol::User {
///         username: Some("john_doe".into()),
///         ..Default::default()
///     }));
/// });
/// ```
pub fn configure_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::with_active(|hub| hub.configure_scope(f))
}

/// Pushes a new scope on the current hub.
///
/// See [`Hub::push_scope`].
pub fn push_scope() -> ScopeGuard {
    Hub::with(|hub| hub.push_scope())
}

/// Temporarily pushes a scope for a single call optionally reconfiguring it.
///
/// This function takes two arguments: the first is a callback that is passed
/// a scope and can reconfigure it.  The second is callback that then executes
/// in the context of that scope.
///
/// This is useful when extra data should be send with a single capture call
/// for instance a different level or tags:
///
/// ```
/// use vigil::{capture_message, with_scope, Level};
///
/// with_scope(
///     |scope| scope.set_level(Some(Level::Warning)),
///     || capture_message("some error", Level::Info),
/// );
/// ```
pub fn with_scope<C, F, R>(scope_config: C, callback: F) -> R
where
    C: FnOnce(&mut Scope),
    F: FnOnce() -> R,
{
    Hub::with(|hub| {
        if hub.is_active_and_usage_safe() {
            hub.with_scope(scope_config, callback)
        } else {
            callback()
        }
    })
}

/// Registers an event processor on the current scope.
///
/// See [`Hub::add_event_processor`].
pub fn add_event_processor<F, R>(f: F)
where
    F: Fn(&mut Event) -> R + Send + Sync + 'static,
    R: IntoProcessorOutcome,
{
    Hub::with_active(|hub| hub.add_event_processor(f))
}

/// Looks up an integration on the current hub.
///
/// See [`Hub::with_integration`].
pub fn with_integration<I, F, R>(f: F) -> R
where
    I: Integration,
    F: FnOnce(&I) -> R,
    R: Default,
{
    Hub::with_active(|hub| hub.with_integration(f))
}

/// Returns the last event ID captured.
///
/// This uses the current thread local hub.
pub fn last_event_id() -> Option<Uuid> {
    Hub::with(|hub| hub.last_event_id())
}
