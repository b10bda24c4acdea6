use std::any::TypeId;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::random;
use uuid::Uuid;

use crate::backtrace_support::process_stacktrace;
use crate::error::InternalError;
use crate::integrations::{InstallState, IntegrationRegistry};
use crate::macros::debug_emit;
use crate::processor::EventProcessorChain;
use crate::protocol::Event;
use crate::{ClientOptions, Integration, Scope, Transport};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

/// The vigil client.
///
/// The client is responsible for event processing and for handing finished
/// events to the configured [`Transport`].  It is created from
/// [`ClientOptions`] and bound to a hub with [`Hub::bind_client`].
///
/// # Examples
///
/// ```
/// let client = vigil::Client::from(vigil::ClientOptions::default());
/// assert!(!client.is_enabled());
/// ```
///
/// [`Hub::bind_client`]: crate::Hub::bind_client
pub struct Client {
    options: ClientOptions,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    integrations: Vec<(TypeId, Arc<dyn Integration>)>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("enabled", &self.is_enabled())
            .field("options", &self.options)
            .finish()
    }
}

impl Client {
    /// Creates a new client for the given options.
    ///
    /// Integrations are set up in the order they are listed, a second
    /// integration with an identifier already seen is skipped.  Their hooks
    /// are installed through the global [`IntegrationRegistry`], so a hook
    /// is only ever installed once per process.
    ///
    /// If no transport factory is set the client will be disabled.
    pub fn with_options(mut options: ClientOptions) -> Client {
        // not bound to a hub yet, so `vigil_debug!` cannot see these options
        let debug = options.debug;
        if debug {
            debug_emit(format_args!(
                "[Client] Creating new client with options: debug={}, integrations={}",
                options.debug,
                options.integrations.len()
            ));
        }

        let mut duplicates = Vec::new();
        let mut integrations: Vec<(TypeId, Arc<dyn Integration>)> = Vec::new();
        for integration in options.integrations.iter() {
            let identifier = integration.identifier();
            if integrations
                .iter()
                .any(|(_, seen)| seen.identifier() == identifier)
            {
                duplicates.push(identifier);
                continue;
            }
            integrations.push((integration.as_ref().type_id(), integration.clone()));
        }

        for (_, integration) in integrations.iter() {
            if debug {
                debug_emit(format_args!(
                    "[Client] Setting up integration: {}",
                    integration.identifier()
                ));
            }
            integration.setup(&mut options);
        }

        let transport = options
            .transport
            .as_ref()
            .map(|factory| factory.create_transport(&options));
        if transport.is_none() && debug {
            debug_emit(format_args!(
                "[Client] No transport available (client will be disabled)"
            ));
        }

        let client = Client {
            options,
            transport: RwLock::new(transport),
            integrations,
        };

        for identifier in duplicates {
            client.report_internal_error(InternalError::DuplicateIntegration { identifier });
        }
        client.install_integrations(IntegrationRegistry::global());

        client
    }

    fn install_integrations(&self, registry: &IntegrationRegistry) {
        for (_, integration) in self.integrations.iter() {
            match registry.install(integration.as_ref(), &self.options) {
                Ok(InstallState::Installed) => {}
                Ok(InstallState::AlreadyInstalled) => {
                    self.report_internal_error(InternalError::DuplicateIntegration {
                        identifier: integration.identifier(),
                    })
                }
                Err(err) => self.report_internal_error(err),
            }
        }
    }

    /// Looks up an integration of the given type.
    pub fn get_integration<I>(&self) -> Option<&I>
    where
        I: Integration,
    {
        let id = TypeId::of::<I>();
        let integration = &self.integrations.iter().find(|(iid, _)| *iid == id)?.1;
        integration.as_ref().as_any().downcast_ref()
    }

    /// Routes an internal failure to the diagnostic channels.
    ///
    /// The error is printed in debug mode and handed to the
    /// `internal_error_handler`.  It never reaches the host application.
    pub fn report_internal_error(&self, err: InternalError) {
        vigil_debug!("[Client] Internal error: {}", err);
        if let Some(ref handler) = self.options.internal_error_handler {
            handler(&err);
        }
    }

    /// Prepares an event for transmission.
    ///
    /// The event runs through the client level processors and the processors
    /// of `scope`, then the scope data is merged into it.  The client
    /// defaults are filled last, followed by `before_send` and sampling.
    /// Returns `None` if the event was dropped on the way.
    pub fn prepare_event(&self, mut event: Event, scope: Option<&Scope>) -> Option<Event> {
        // event_id is set before the processors run so that the processors
        // can poke around in that data.
        if event.event_id.is_nil() {
            event.event_id = Uuid::new_v4();
        }

        let mut chain = EventProcessorChain::new();
        for (_, integration) in self.integrations.iter() {
            chain.push_integration(integration.as_ref(), &self.options);
        }
        chain.extend(self.options.event_processors.iter().map(|p| p.as_ref()));
        if let Some(scope) = scope {
            chain.extend(scope.event_processors());
        }

        let mut event = chain.apply(event, |err| self.report_internal_error(err))?;

        if let Some(scope) = scope {
            scope.apply_to_event(&mut event);
        }

        let max_breadcrumbs = self.options.max_breadcrumbs;
        if event.breadcrumbs.len() > max_breadcrumbs {
            let excess = event.breadcrumbs.len() - max_breadcrumbs;
            event.breadcrumbs.drain(..excess);
        }

        if event.release.is_none() {
            event.release = self.options.release.as_ref().map(|s| s.to_string());
        }
        if event.environment.is_none() {
            event.environment = self.options.environment.as_ref().map(|s| s.to_string());
        }
        if event.server_name.is_none() {
            event.server_name = self.options.server_name.as_ref().map(|s| s.to_string());
        }
        if &event.platform == "other" {
            event.platform = "native".into();
        }

        for exception in event.exception.iter_mut() {
            if let Some(ref mut stacktrace) = exception.stacktrace {
                process_stacktrace(stacktrace, &self.options);
            }
        }

        if let Some(ref func) = self.options.before_send {
            let id = event.event_id;
            event = match func(event) {
                Some(event) => event,
                None => {
                    vigil_debug!("[Client] before_send dropped event {}", id);
                    return None;
                }
            };
        }

        if !self.sample_should_send() {
            vigil_debug!("[Client] Event {} dropped due to sampling", event.event_id);
            None
        } else {
            Some(event)
        }
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The client is enabled as long as it holds a transport.
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// let transport = vigil::test::TestTransport::new();
    /// let client = vigil::Client::with_options(vigil::ClientOptions {
    ///     transport: Some(Arc::new(transport)),
    ///     ..Default::default()
    /// });
    /// assert!(client.is_enabled());
    /// ```
    pub fn is_enabled(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Captures an event and hands it to the transport.
    ///
    /// Returns the id of the sent event, or the nil id if it was dropped.
    pub fn capture_event(&self, event: Event, scope: Option<&Scope>) -> Uuid {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(transport) = transport else {
            return Uuid::nil();
        };
        match self.prepare_event(event, scope) {
            Some(event) => {
                let event_id = event.event_id;
                transport.send_event(event);
                event_id
            }
            None => Uuid::nil(),
        }
    }

    /// Drains all pending events without shutting down.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match transport {
            Some(transport) => transport.flush(timeout.unwrap_or(self.options.shutdown_timeout)),
            None => true,
        }
    }

    /// Drains all pending events and shuts down the transport behind the
    /// client.  After shutting down the transport is removed.
    ///
    /// This returns `true` if the queue was successfully drained in the
    /// given time or `false` if not (for instance because of a timeout).
    /// If no timeout is provided the client will wait for as long a
    /// `shutdown_timeout` in the client options.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let transport_opt = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match transport_opt {
            Some(transport) => {
                vigil_debug!("[Client] Shutting down transport");
                transport.shutdown(timeout.unwrap_or(self.options.shutdown_timeout))
            }
            None => true,
        }
    }

    fn sample_should_send(&self) -> bool {
        let rate = self.options.sample_rate;
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }
}

// Make this unwind safe. It's not out of the box because of the
// `BeforeCallback`s inside `ClientOptions`, and the contained Integrations
impl RefUnwindSafe for Client {}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::{Breadcrumb, Level};
    use crate::test::TestTransport;
    use crate::ProcessorOutcome;

    fn client_with(options: ClientOptions) -> (Client, Arc<TestTransport>) {
        let transport = TestTransport::new();
        let client = Client::with_options(ClientOptions {
            transport: Some(Arc::new(transport.clone())),
            ..options
        });
        (client, transport)
    }

    #[test]
    fn test_disabled_client_returns_nil() {
        let client = Client::with_options(ClientOptions::default());
        assert!(!client.is_enabled());
        assert!(client.capture_event(Event::new(), None).is_nil());
    }

    #[test]
    fn test_fills_defaults() {
        let (client, transport) = client_with(ClientOptions {
            release: Some("app@1.0".into()),
            environment: Some("staging".into()),
            ..Default::default()
        });
        let mut event = Event::new();
        event.environment = Some("explicit".into());
        let id = client.capture_event(event, None);

        let events = transport.fetch_and_clear_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, id);
        assert_eq!(events[0].release.as_deref(), Some("app@1.0"));
        assert_eq!(events[0].environment.as_deref(), Some("explicit"));
        assert_eq!(events[0].platform, "native");
    }

    #[test]
    fn test_processors_run_before_scope_merge() {
        let (client, transport) = client_with(ClientOptions::default());
        let mut scope = Scope::default();
        scope.set_tag("source", "scope");
        scope.add_event_processor(|event: &mut Event| {
            assert!(!event.tags.contains_key("source"));
            event.tags.insert("source".into(), "processor".into());
        });

        client.capture_event(Event::new(), Some(&scope));
        let events = transport.fetch_and_clear_events();
        assert_eq!(events[0].tags["source"], "processor");
    }

    #[test]
    fn test_before_send_and_sampling_drop() {
        let (client, transport) = client_with(ClientOptions {
            before_send: Some(Arc::new(|event: Event| {
                if event.level == Level::Debug {
                    None
                } else {
                    Some(event)
                }
            })),
            ..Default::default()
        });
        let mut event = Event::new();
        event.level = Level::Debug;
        assert!(client.capture_event(event, None).is_nil());
        assert!(!client.capture_event(Event::new(), None).is_nil());
        assert_eq!(transport.fetch_and_clear_events().len(), 1);

        let (client, transport) = client_with(ClientOptions {
            sample_rate: 0.0,
            ..Default::default()
        });
        assert!(client.capture_event(Event::new(), None).is_nil());
        assert!(transport.fetch_and_clear_events().is_empty());
    }

    #[test]
    fn test_event_breadcrumbs_are_capped() {
        let (client, transport) = client_with(ClientOptions {
            max_breadcrumbs: 2,
            ..Default::default()
        });
        let mut scope = Scope::default();
        for idx in 0..2 {
            scope.add_breadcrumb(
                Breadcrumb {
                    message: Some(format!("scope {idx}")),
                    ..Default::default()
                },
                2,
            );
        }
        let mut event = Event::new();
        event.breadcrumbs.push(Breadcrumb {
            message: Some("event".into()),
            ..Default::default()
        });
        client.capture_event(event, Some(&scope));

        let events = transport.fetch_and_clear_events();
        let messages: Vec<_> = events[0]
            .breadcrumbs
            .iter()
            .filter_map(|b| b.message.as_deref())
            .collect();
        assert_eq!(messages, vec!["scope 1", "event"]);
    }

    #[test]
    fn test_duplicate_integrations_are_skipped_and_reported() {
        struct Tagging;
        impl Integration for Tagging {
            fn identifier(&self) -> &'static str {
                "client-test-tagging"
            }

            fn process_event(
                &self,
                event: &mut Event,
                _options: &ClientOptions,
            ) -> anyhow::Result<ProcessorOutcome> {
                let count = event.extra.entry("tagged".into()).or_insert(0.into());
                *count = (count.as_u64().unwrap_or(0) + 1).into();
                Ok(ProcessorOutcome::Keep)
            }
        }

        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let (client, transport) = client_with(
            ClientOptions {
                internal_error_handler: Some(Arc::new(move |err: &InternalError| {
                    sink.lock().unwrap().push(err.to_string());
                })),
                ..Default::default()
            }
            .add_integration(Tagging)
            .add_integration(Tagging),
        );

        assert!(client.get_integration::<Tagging>().is_some());
        client.capture_event(Event::new(), None);
        let events = transport.fetch_and_clear_events();
        assert_eq!(events[0].extra["tagged"], 1);
        assert!(reported
            .lock()
            .unwrap()
            .iter()
            .any(|msg| msg.contains("client-test-tagging")));
    }

    #[test]
    fn test_close_disables_client() {
        let (client, _transport) = client_with(ClientOptions::default());
        assert!(client.is_enabled());
        assert!(client.close(None));
        assert!(!client.is_enabled());
        assert!(client.capture_event(Event::new(), None).is_nil());
    }
}
