use std::cell::Cell;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::error::{InternalError, ScopeError};
use crate::hub_impl::HubImpl;
use crate::processor::IntoProcessorOutcome;
use crate::protocol::{Event, Level, LogEntry};
use crate::{Integration, IntoBreadcrumbs, Scope, ScopeGuard};

thread_local! {
    static IN_CAPTURE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as capturing for as long as it lives.
struct CaptureGuard;

impl CaptureGuard {
    fn enter() -> Option<CaptureGuard> {
        let busy = IN_CAPTURE.try_with(|flag| flag.replace(true)).unwrap_or(true);
        if busy {
            None
        } else {
            Some(CaptureGuard)
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let _ = IN_CAPTURE.try_with(|flag| flag.set(false));
    }
}

/// The central object that manages scopes and clients.
///
/// This can be used to capture events and manage the scope.  This object is
/// internally synchronized so it can be used from multiple threads if needed.
///
/// Each thread has its own thread-local ([`Hub::current()`]) hub, which is
/// automatically derived from the main hub ([`Hub::main()`]).  An async task
/// gets its own hub by binding one with
/// [`bind_hub`](crate::HubFutureExt::bind_hub).
///
/// In most situations developers do not need to interface with the hub
/// directly.  Instead toplevel convenience functions are exposed that will
/// automatically dispatch to the thread-local ([`Hub::current()`]) hub.
/// In some situations this might not be possible in which case it might
/// become necessary to manually work with the hub.  This is for instance
/// the case when working with async code.
///
/// Hubs that are wrapped in [`Arc`]s can be bound to the current thread with
/// the `run` static method.
///
/// Most common operations:
///
/// * [`Hub::new`]: creates a brand new hub
/// * [`Hub::current`]: returns the thread local hub
/// * [`Hub::with`]: invoke a callback with the thread local hub
/// * [`Hub::with_active`]: like `Hub::with` but does not invoke the callback if
///   the client is not in a supported state or not bound
/// * [`Hub::new_from_top`]: creates a new hub with just the top scope of another hub.
#[derive(Debug)]
pub struct Hub {
    pub(crate) inner: HubImpl,
    pub(crate) last_event_id: RwLock<Option<Uuid>>,
}

impl Hub {
    /// Sends the event to the current client with the current scope.
    ///
    /// The event runs through the client processors and the processors of
    /// the current scope, gets the scope data merged in and is handed to the
    /// transport.  No hub lock is held while that happens.
    ///
    /// Returns the event id, or the nil id if there is no client or the
    /// event was dropped.  An event captured while another capture is
    /// running on the same thread is dropped.
    pub fn capture_event(&self, event: Event) -> Uuid {
        let (client, scope) = self.client_and_scope();
        let Some(client) = client else {
            return Uuid::nil();
        };
        let Some(_guard) = CaptureGuard::enter() else {
            client.report_internal_error(InternalError::RecursiveCapture);
            return Uuid::nil();
        };

        let event_id = client.capture_event(event, Some(&scope));
        if !event_id.is_nil() {
            self.set_last_event_id(event_id);
        }
        event_id
    }

    /// Captures an arbitrary message.
    ///
    /// The message ends up in `logentry.message` of the event.
    pub fn capture_message(&self, msg: &str, level: Level) -> Uuid {
        let mut event = Event::new();
        event.level = level;
        event.logentry = Some(LogEntry {
            message: msg.to_owned(),
            params: vec![],
        });
        self.capture_event(event)
    }

    /// Pushes a new scope.
    ///
    /// The new scope starts out as a copy of the current one.  This returns
    /// a guard that when dropped will pop the scope again.
    pub fn push_scope(&self) -> ScopeGuard {
        self.inner.with_mut(|stack| {
            let depth = stack.push();
            ScopeGuard(Some((self.inner.stack.clone(), depth)))
        })
    }

    /// Pops the current scope without a guard.
    ///
    /// The base scope is never popped, trying to do so returns
    /// [`ScopeError::PopBaseScope`] and leaves the stack alone.
    pub fn pop_scope(&self) -> Result<(), ScopeError> {
        self.inner.with_mut(|stack| stack.pop())
    }

    /// Temporarily pushes a scope for a single call optionally reconfiguring it.
    ///
    /// This function takes two arguments: the first is a callback that is
    /// passed a scope and can reconfigure it.  The second is callback that
    /// then executes in the context of that scope.
    ///
    /// This is useful when extra data should be send with a single capture
    /// call for instance a different level or tags:
    ///
    /// ```
    /// use vigil::protocol::Level;
    ///
    /// let events = vigil::test::with_captured_events(|| {
    ///     vigil::Hub::current().with_scope(
    ///         |scope| scope.set_level(Some(Level::Warning)),
    ///         || vigil::capture_message("some message", Level::Error),
    ///     );
    /// });
    /// assert_eq!(events[0].level, Level::Warning);
    /// ```
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.configure_scope(scope_config);
        callback()
    }

    /// Invokes a function that can modify the current scope.
    ///
    /// The function is passed a copy of the current scope which replaces it
    /// once the function returns.  The hub is not locked while the function
    /// runs.  If the function pushed or popped scopes on this hub, its
    /// changes are dropped and the misuse is reported.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        let (mut scope, depth) = self
            .inner
            .with(|stack| (Scope::clone(&stack.top().scope), stack.depth()));

        let rv = f(&mut scope);

        let (applied, client) = self.inner.with_mut(|stack| {
            let applied = stack.depth() == depth;
            if applied {
                stack.top_mut().scope = Arc::new(scope);
            }
            (applied, stack.top().client.clone())
        });
        if !applied {
            let err = ScopeError::ChangedDuringConfigure;
            match client {
                Some(client) => client.report_internal_error(err.into()),
                None => vigil_debug!("[Hub] {}", err),
            }
        }
        rv
    }

    /// Adds a new breadcrumb to the current scope.
    ///
    /// The client's `before_breadcrumb` callback can rewrite or drop each
    /// breadcrumb.  Once the scope holds more than `max_breadcrumbs`, the
    /// oldest ones are evicted.  Nothing happens without a bound client.
    pub fn add_breadcrumb<B: IntoBreadcrumbs>(&self, breadcrumb: B) {
        let Some(client) = self.client() else {
            return;
        };
        let options = client.options();
        let breadcrumbs: Vec<_> = breadcrumb
            .into_breadcrumbs()
            .filter_map(|breadcrumb| match options.before_breadcrumb {
                Some(ref callback) => callback(breadcrumb),
                None => Some(breadcrumb),
            })
            .collect();
        if breadcrumbs.is_empty() {
            return;
        }

        let max_breadcrumbs = options.max_breadcrumbs;
        self.with_current_scope_mut(|scope| {
            for breadcrumb in breadcrumbs {
                scope.add_breadcrumb(breadcrumb, max_breadcrumbs);
            }
        })
    }

    /// Registers an event processor on the current scope.
    ///
    /// It runs after the client level processors and after the processors
    /// the scope already holds.  It is dropped together with the scope.
    pub fn add_event_processor<F, R>(&self, f: F)
    where
        F: Fn(&mut Event) -> R + Send + Sync + 'static,
        R: IntoProcessorOutcome,
    {
        self.with_current_scope_mut(|scope| scope.add_event_processor(f))
    }

    /// Returns a snapshot of the current scope.
    ///
    /// The snapshot is an independent copy, changing the hub afterwards does
    /// not affect it.
    pub fn current_view(&self) -> Scope {
        self.inner.with(|stack| Scope::clone(&stack.top().scope))
    }

    /// Looks up an integration on the hub.
    ///
    /// Calls the given function with the requested integration instance when
    /// it is active on the currently bound client.
    pub fn with_integration<I, F, R>(&self, f: F) -> R
    where
        I: Integration,
        F: FnOnce(&I) -> R,
        R: Default,
    {
        match self.client() {
            Some(client) => match client.get_integration::<I>() {
                Some(integration) => f(integration),
                None => Default::default(),
            },
            None => Default::default(),
        }
    }
}
