use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::{Arc, MutexGuard, PoisonError, RwLock, TryLockError};
use std::thread;

use lazy_static::lazy_static;
use uuid::Uuid;

use crate::stack::Stack;
use crate::{Client, Hub, Scope};

lazy_static! {
    static ref PROCESS_HUB: (Arc<Hub>, thread::ThreadId) = (
        Arc::new(Hub::new(None, Arc::new(Default::default()))),
        thread::current().id()
    );
}

thread_local! {
    static THREAD_HUB: (RefCell<Arc<Hub>>, Cell<bool>) = (
        RefCell::new(Arc::new(Hub::new_from_top(&PROCESS_HUB.0))),
        Cell::new(PROCESS_HUB.1 == thread::current().id())
    );
}

/// A guard that temporarily swaps the active hub in thread-local storage.
///
/// This type is `!Send` because it manages thread-local state and must be
/// dropped on the same thread where it was created.
pub struct SwitchGuard {
    inner: Option<(Arc<Hub>, bool)>,
    /// Makes this type `!Send` while keeping it `Sync`.
    _not_send: PhantomData<MutexGuard<'static, ()>>,
}

impl SwitchGuard {
    /// Swaps the current thread's Hub by the one provided
    /// and returns a guard that, when dropped, replaces it
    /// to the previous one.
    pub fn new(hub: Arc<Hub>) -> Self {
        let inner = THREAD_HUB.with(|(thread_hub, is_process_hub)| {
            let mut thread_hub = thread_hub.borrow_mut();
            if Arc::ptr_eq(&thread_hub, &hub) {
                return None;
            }
            let previous = std::mem::replace(&mut *thread_hub, hub);
            let was_process_hub = is_process_hub.replace(false);
            Some((previous, was_process_hub))
        });
        SwitchGuard {
            inner,
            _not_send: PhantomData,
        }
    }

    fn swap(&mut self) -> Option<Arc<Hub>> {
        let (hub, was_process_hub) = self.inner.take()?;
        // The thread local may already be gone while the thread shuts down.
        THREAD_HUB
            .try_with(|(thread_hub, is_process_hub)| {
                let replaced = std::mem::replace(&mut *thread_hub.borrow_mut(), hub);
                if was_process_hub {
                    is_process_hub.set(true);
                }
                replaced
            })
            .ok()
    }
}

impl Drop for SwitchGuard {
    fn drop(&mut self) {
        let _ = self.swap();
    }
}

#[derive(Debug)]
pub(crate) struct HubImpl {
    pub(crate) stack: Arc<RwLock<Stack>>,
}

impl HubImpl {
    pub(crate) fn with<F: FnOnce(&Stack) -> R, R>(&self, f: F) -> R {
        let guard = self.stack.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub(crate) fn with_mut<F: FnOnce(&mut Stack) -> R, R>(&self, f: F) -> R {
        let mut guard = self.stack.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn is_active_and_usage_safe(&self) -> bool {
        let guard = match self.stack.try_read() {
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
            Ok(guard) => guard,
        };

        guard.top().client.as_ref().is_some_and(|c| c.is_enabled())
    }

    pub(crate) fn is_debug_and_usage_safe(&self) -> bool {
        match self.stack.try_read() {
            Ok(guard) => guard.top().client.as_ref().is_some_and(|c| c.options().debug),
            Err(_) => false,
        }
    }
}

impl Hub {
    /// Creates a new hub from the given client and scope.
    pub fn new(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Hub {
        Hub {
            inner: HubImpl {
                stack: Arc::new(RwLock::new(Stack::from_client_and_scope(client, scope))),
            },
            last_event_id: RwLock::new(None),
        }
    }

    /// Creates a new hub based on the top scope of the given hub.
    ///
    /// The new hub shares the client and starts from a copy of the other
    /// hub's current scope.  Nothing done on either hub afterwards is
    /// visible on the other one.
    pub fn new_from_top<H: AsRef<Hub>>(other: H) -> Hub {
        let hub = other.as_ref();
        hub.inner.with(|stack| {
            let top = stack.top();
            Hub::new(top.client.clone(), top.scope.clone())
        })
    }

    /// Returns the current, thread-local hub.
    ///
    /// Invoking this will return the current thread-local hub.  The first
    /// time it is called on a thread, a new thread-local hub will be
    /// created based on the topmost scope of the hub on the main thread as
    /// returned by [`Hub::main`].  If the main thread did not yet have a
    /// hub it will be created when invoking this function.
    ///
    /// To have control over which hub is installed as the current
    /// thread-local hub, use [`Hub::run`].
    pub fn current() -> Arc<Hub> {
        Hub::with(Arc::clone)
    }

    /// Returns the main thread's hub.
    ///
    /// This is similar to [`Hub::current`] but instead of picking the
    /// current thread's hub it returns the main thread's hub instead.
    pub fn main() -> Arc<Hub> {
        PROCESS_HUB.0.clone()
    }

    /// Invokes the callback with the default hub.
    ///
    /// The thread-local slot is not borrowed while `f` runs, so `f` may bind
    /// other hubs with [`Hub::run`].
    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&Arc<Hub>) -> R,
    {
        let hub = THREAD_HUB
            .try_with(|(hub, is_process_hub)| {
                if is_process_hub.get() {
                    PROCESS_HUB.0.clone()
                } else {
                    hub.borrow().clone()
                }
            })
            .unwrap_or_else(|_| PROCESS_HUB.0.clone());
        f(&hub)
    }

    /// Like [`Hub::with`] but only calls the function if a client is bound.
    ///
    /// This is useful for integrations that want to do efficiently nothing if
    /// there is no client bound.  Additionally this internally ensures that
    /// the client can be safely synchronized.  This prevents accidental
    /// recursive calls into the client.
    pub fn with_active<F, R>(f: F) -> R
    where
        F: FnOnce(&Arc<Hub>) -> R,
        R: Default,
    {
        Hub::with(|hub| {
            if hub.is_active_and_usage_safe() {
                f(hub)
            } else {
                Default::default()
            }
        })
    }

    /// Binds a hub to the current thread for the duration of the call.
    ///
    /// During the execution of `f` the given hub will be installed as the
    /// thread-local hub.  So any call to [`Hub::current`] during this time
    /// will return the provided hub.
    ///
    /// Once the function is finished executing, including after it
    /// panicked, the original hub is re-installed if one was present.
    pub fn run<F: FnOnce() -> R, R>(hub: Arc<Hub>, f: F) -> R {
        let _guard = SwitchGuard::new(hub);
        f()
    }

    /// Returns the currently bound client.
    pub fn client(&self) -> Option<Arc<Client>> {
        self.inner.with(|stack| stack.top().client.clone())
    }

    /// Binds a new client to the hub.
    ///
    /// Only the current scope level is affected.  The client bound before is
    /// back once the current scope is popped.
    pub fn bind_client(&self, client: Option<Arc<Client>>) {
        self.inner.with_mut(|stack| {
            stack.top_mut().client = client;
        })
    }

    /// Returns the last event id.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_last_event_id(&self, event_id: Uuid) {
        *self
            .last_event_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(event_id);
    }

    pub(crate) fn is_active_and_usage_safe(&self) -> bool {
        self.inner.is_active_and_usage_safe()
    }

    pub(crate) fn is_debug_and_usage_safe(&self) -> bool {
        self.inner.is_debug_and_usage_safe()
    }

    /// Snapshots the client and top scope, then releases the lock.
    pub(crate) fn client_and_scope(&self) -> (Option<Arc<Client>>, Arc<Scope>) {
        self.inner.with(|stack| {
            let top = stack.top();
            (top.client.clone(), top.scope.clone())
        })
    }

    pub(crate) fn with_current_scope_mut<F: FnOnce(&mut Scope) -> R, R>(&self, f: F) -> R {
        self.inner
            .with_mut(|stack| f(Arc::make_mut(&mut stack.top_mut().scope)))
    }
}

impl AsRef<Hub> for Hub {
    fn as_ref(&self) -> &Hub {
        self
    }
}
