use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::breadcrumbs::DEFAULT_MAX_BREADCRUMBS;
use crate::error::InternalError;
use crate::processor::EventProcessor;
use crate::protocol::{Breadcrumb, Event};
use crate::{Integration, TransportFactory};

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Receives every internal error of a client.
pub type InternalErrorHandler = Arc<dyn Fn(&InternalError) + Send + Sync>;

/// Configuration settings for the client.
///
/// Options are plain data.  Build them with struct update syntax:
///
/// ```
/// let _options = vigil::ClientOptions {
///     debug: true,
///     release: Some("my-app@1.0.0".into()),
///     ..Default::default()
/// };
/// ```
///
/// A client without a `transport` is disabled: capturing through it is a
/// no-op.
#[derive(Clone)]
pub struct ClientOptions {
    /// Enables debug mode.
    ///
    /// In debug mode debug information is printed to stderr to help you
    /// understand what vigil is doing.  With the `debug-logs` feature the
    /// output goes to the `vigil` logger instead, independently of this flag.
    pub debug: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    pub environment: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// Maximum number of breadcrumbs. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// If turned on some default PII information is attached, such as the
    /// remote address of a request.
    pub send_default_pii: bool,
    /// Module prefixes that are always considered "in_app".
    pub in_app_include: Vec<&'static str>,
    /// Module prefixes that are never "in_app".
    pub in_app_exclude: Vec<&'static str>,
    /// A list of integrations to enable.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add default integrations.
    ///
    /// Currently this adds the panic integration.
    pub default_integrations: bool,
    /// Client level event processors, run before the processors of any scope.
    pub event_processors: Vec<Arc<dyn EventProcessor>>,
    /// Callback that is executed before event sending.
    pub before_send: Option<BeforeCallback<Event>>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client options by
    /// reference and returning a `Transport`, or an `Arc<Transport>`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// The timeout on client drop for draining events on shutdown.
    pub shutdown_timeout: Duration,
    /// Called with every internal error, in addition to the debug output.
    pub internal_error_handler: Option<InternalErrorHandler>,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyIntegration;
    ///
    /// impl vigil::Integration for MyIntegration {
    ///     fn identifier(&self) -> &'static str {
    ///         "my-integration"
    ///     }
    /// }
    ///
    /// let options = vigil::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    #[must_use]
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }

    /// Adds a client level event processor.
    #[must_use]
    pub fn add_event_processor<P: EventProcessor + 'static>(mut self, processor: P) -> Self {
        self.event_processors.push(Arc::new(processor));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.identifier()).collect();
        let event_processors: Vec<_> = self.event_processors.iter().map(|p| p.name()).collect();

        f.debug_struct("ClientOptions")
            .field("debug", &self.debug)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("send_default_pii", &self.send_default_pii)
            .field("in_app_include", &self.in_app_include)
            .field("in_app_exclude", &self.in_app_exclude)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("event_processors", &event_processors)
            .field("before_send", &before_send)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("transport", &transport)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field(
                "internal_error_handler",
                &self.internal_error_handler.is_some(),
            )
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            debug: false,
            release: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            send_default_pii: false,
            in_app_include: vec![],
            in_app_exclude: vec![],
            integrations: vec![],
            default_integrations: true,
            event_processors: vec![],
            before_send: None,
            before_breadcrumb: None,
            transport: None,
            shutdown_timeout: Duration::from_secs(2),
            internal_error_handler: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.max_breadcrumbs, 100);
        assert_eq!(options.sample_rate, 1.0);
        assert!(options.default_integrations);
        assert!(options.transport.is_none());
    }

    #[test]
    fn test_debug_lists_integration_identifiers() {
        struct Named;
        impl Integration for Named {
            fn identifier(&self) -> &'static str {
                "named"
            }
        }
        let options = ClientOptions::new().add_integration(Named);
        let dbg = format!("{options:?}");
        assert!(dbg.contains("\"named\""));
    }
}
