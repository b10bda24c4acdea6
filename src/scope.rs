use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::breadcrumbs::BreadcrumbTrail;
use crate::error::InternalError;
use crate::processor::{EventProcessor, IntoProcessorOutcome};
use crate::protocol::{Breadcrumb, Event, Level, User, Value};
use crate::stack::Stack;

/// Holds contextual data for the current scope.
///
/// The scope is an object that can be cloned efficiently and stores data that
/// is locally relevant to an event.  For instance the scope will hold recorded
/// breadcrumbs and similar information.
///
/// All collections are persistent (`im`), so a clone is cheap and shares
/// structure with the original, yet mutating one never shows in the other.
/// This is what gives pushed scopes their copy-on-fork value semantics.
///
/// The scope can be interacted with in two ways:
///
/// 1. the scope is routinely updated with information by functions such as
///    [`add_breadcrumb`] which will modify the currently top-most scope.
/// 2. the topmost scope can also be configured through the [`configure_scope`]
///    method.
///
/// [`add_breadcrumb`]: crate::add_breadcrumb
/// [`configure_scope`]: crate::configure_scope
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<[String]>>,
    pub(crate) transaction: Option<Arc<str>>,
    pub(crate) breadcrumbs: BreadcrumbTrail,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) extra: im::HashMap<String, Value>,
    pub(crate) tags: im::HashMap<String, String>,
    pub(crate) event_processors: im::Vector<Arc<dyn EventProcessor>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("transaction", &self.transaction)
            .field("breadcrumbs", &self.breadcrumbs.len())
            .field("user", &self.user)
            .field("extra", &self.extra)
            .field("tags", &self.tags)
            .field("event_processors", &self.event_processors.len())
            .finish()
    }
}

/// A scope guard.
///
/// This is returned from [`Hub::push_scope`] and will automatically pop the
/// scope on drop, including when the guarded code panics.
///
/// Dropping guards out of order never corrupts the stack: the scopes pushed
/// after the guard are released together with it and the mistake is
/// reported as an internal error.
///
/// [`Hub::push_scope`]: crate::Hub::push_scope
#[derive(Default)]
#[must_use = "the scope is popped as soon as the guard is dropped"]
pub struct ScopeGuard(pub(crate) Option<(Arc<RwLock<Stack>>, usize)>);

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeGuard")
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some((stack, depth)) = self.0.take() {
            // The lock is released before anything gets reported, reporting
            // may call back into user code.
            let (result, client) = {
                let mut stack = stack.write().unwrap_or_else(PoisonError::into_inner);
                let client = stack.top().client.clone();
                (stack.pop_guarded(depth), client)
            };
            if let Err(err) = result {
                match client {
                    Some(client) => client.report_internal_error(InternalError::Scope(err)),
                    None => vigil_debug!("[ScopeGuard] {}", err),
                }
            }
        }
    }
}

impl Scope {
    /// Clear the scope.
    ///
    /// By default a scope will inherit all values from the higher scope.
    /// In some situations this might not be what a user wants.  Calling
    /// this method will wipe all data contained within.
    pub fn clear(&mut self) {
        vigil_debug!("[Scope] Clearing all scope data");
        *self = Default::default();
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        self.breadcrumbs.clear();
    }

    /// Sets a level override.
    pub fn set_level(&mut self, level: Option<Level>) {
        self.level = level;
    }

    /// Returns the level override.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    /// Sets the fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Option<&[&str]>) {
        self.fingerprint = fingerprint.map(|fp| fp.iter().map(|s| (*s).to_owned()).collect());
    }

    /// Returns the fingerprint override.
    pub fn fingerprint(&self) -> Option<&[String]> {
        self.fingerprint.as_deref()
    }

    /// Sets the transaction.
    pub fn set_transaction(&mut self, transaction: Option<&str>) {
        match transaction {
            Some(name) => vigil_debug!("[Scope] Setting transaction: {}", name),
            None if self.transaction.is_some() => vigil_debug!("[Scope] Removing transaction"),
            None => {}
        }
        self.transaction = transaction.map(Arc::from);
    }

    /// Returns the transaction name.
    pub fn transaction(&self) -> Option<&str> {
        self.transaction.as_deref()
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user.map(Arc::new);
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        let value = value.to_string();
        vigil_debug!("[Scope] Setting tag: {} = {}", key, value);
        self.tags.insert(key.to_string(), value);
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        self.tags.remove(key);
    }

    /// Returns the value of a tag.
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Iterates over all tags.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        self.extra.remove(key);
    }

    /// Returns the value of an extra.
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Iterates over all extras.
    pub fn extras(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.extra.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The breadcrumbs recorded in this scope, oldest first.
    pub fn breadcrumbs(&self) -> &BreadcrumbTrail {
        &self.breadcrumbs
    }

    /// Records a breadcrumb, evicting the oldest once more than `capacity`
    /// are held.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, capacity: usize) {
        let evicted = self.breadcrumbs.push(breadcrumb, capacity);
        if evicted > 0 {
            vigil_debug!("[Scope] Evicted {} breadcrumbs", evicted);
        }
    }

    /// Add an event processor to the scope.
    ///
    /// ```
    /// # use vigil::protocol::Event;
    /// let mut scope = vigil::Scope::default();
    /// scope.add_event_processor(|event: &mut Event| {
    ///     event.tags.insert("processed".into(), "yes".into());
    /// });
    /// assert_eq!(scope.event_processor_count(), 1);
    /// ```
    pub fn add_event_processor<F, R>(&mut self, f: F)
    where
        F: Fn(&mut Event) -> R + Send + Sync + 'static,
        R: IntoProcessorOutcome,
    {
        self.add_processor(f);
    }

    /// Add a processor implementing [`EventProcessor`] to the scope.
    pub fn add_processor<P: EventProcessor + 'static>(&mut self, processor: P) {
        self.event_processors.push_back(Arc::new(processor));
        vigil_debug!(
            "[Scope] Added event processor (total: {})",
            self.event_processors.len()
        );
    }

    /// The number of event processors registered on this scope.
    pub fn event_processor_count(&self) -> usize {
        self.event_processors.len()
    }

    /// The registered event processors, in registration order.
    pub fn event_processors(&self) -> impl Iterator<Item = &dyn EventProcessor> + '_ {
        self.event_processors.iter().map(|p| p.as_ref())
    }

    /// Applies the contained scoped data to fill an event.
    ///
    /// Data already on the event wins: the user and the transaction are only
    /// filled when missing, and tags and extras set on the event are not
    /// overwritten.  The level override always applies, and the fingerprint
    /// replaces the default fingerprint only.  The scope's breadcrumbs are
    /// placed before the ones recorded on the event itself.
    ///
    /// Event processors are not run here, see
    /// [`EventProcessorChain`](crate::EventProcessorChain).
    pub fn apply_to_event(&self, event: &mut Event) {
        if let Some(level) = self.level {
            event.level = level;
        }

        if event.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                event.user = Some(user.clone());
            }
        }

        if !self.breadcrumbs.is_empty() {
            let own = std::mem::take(&mut event.breadcrumbs);
            event.breadcrumbs = self.breadcrumbs.iter().cloned().chain(own).collect();
        }

        for (key, value) in self.extra.iter() {
            event
                .extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        for (key, value) in self.tags.iter() {
            event
                .tags
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if event.transaction.is_none() {
            if let Some(txn) = self.transaction.as_deref() {
                event.transaction = Some(txn.to_owned());
            }
        }

        if event.has_default_fingerprint() {
            if let Some(fp) = self.fingerprint.as_deref() {
                event.fingerprint = fp.to_vec();
            }
        }
    }
}
