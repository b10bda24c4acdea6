use std::error::Error;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use vigil::protocol::{Event, Request, User};
use vigil::{Hub, HubFutureExt, InternalError};

use crate::extractor::{MaxRequestBodySize, RequestExtractor};
use crate::integration::RequestIntegration;
use crate::source::RequestDataSource;

/// Wraps request handlers so that events carry the request they happened in.
///
/// Every handled request gets its own scope.  The scope's transaction is
/// the route name, and an event processor fills in `request` and `user`
/// on events that do not have them yet.  Errors returned by the handler
/// are captured and handed back unchanged.
#[derive(Debug, Clone)]
pub struct RequestMiddleware {
    max_request_body_size: Option<MaxRequestBodySize>,
    capture_errors: bool,
}

impl Default for RequestMiddleware {
    fn default() -> Self {
        RequestMiddleware {
            max_request_body_size: None,
            capture_errors: true,
        }
    }
}

impl RequestMiddleware {
    /// Creates a new middleware.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the body size limit of the [`RequestIntegration`].
    #[must_use]
    pub fn max_request_body_size(mut self, size: MaxRequestBodySize) -> Self {
        self.max_request_body_size = Some(size);
        self
    }

    /// Enables or disables capturing of handler errors.
    ///
    /// The default is to capture all errors.
    #[must_use]
    pub fn capture_errors(mut self, val: bool) -> Self {
        self.capture_errors = val;
        self
    }

    /// Runs a request handler on the current hub.
    ///
    /// A scope is pushed for the duration of the handler and popped on
    /// every exit path, including unwinding.
    pub fn handle<S, F, T, E>(&self, source: S, handler: F) -> Result<T, E>
    where
        S: RequestDataSource + 'static,
        F: FnOnce() -> Result<T, E>,
        E: Error,
    {
        let hub = Hub::current();
        let _guard = hub.push_scope();
        self.bind_request(&hub, source);

        let result = handler();
        if let Err(ref err) = result {
            if self.capture_errors {
                hub.capture_error(err);
            }
        }
        result
    }

    /// Runs an async request handler on a fresh hub.
    ///
    /// The hub is derived from the current one and bound to the returned
    /// future, so concurrent requests never see each other's scope.
    pub fn handle_async<S, Fut, T, E>(
        &self,
        source: S,
        handler: Fut,
    ) -> impl Future<Output = Result<T, E>>
    where
        S: RequestDataSource + 'static,
        Fut: Future<Output = Result<T, E>>,
        E: Error,
    {
        let hub = Arc::new(Hub::new_from_top(Hub::current()));
        self.bind_request(&hub, source);

        let capture_errors = self.capture_errors;
        async move {
            let result = handler.await;
            if let Err(ref err) = result {
                if capture_errors {
                    Hub::current().capture_error(err);
                }
            }
            result
        }
        .bind_hub(hub)
    }

    fn bind_request<S: RequestDataSource + 'static>(&self, hub: &Hub, source: S) {
        let client = hub.client();
        let max_request_body_size = self
            .max_request_body_size
            .or_else(|| {
                hub.with_integration(|integration: &RequestIntegration| {
                    Some(integration.max_request_body_size())
                })
            })
            .unwrap_or_default();
        let send_default_pii = client
            .as_ref()
            .map_or(false, |client| client.options().send_default_pii);

        let transaction = match source.route_name() {
            Ok(route) => route,
            Err(err) => {
                if let Some(ref client) = client {
                    client.report_internal_error(InternalError::Extraction {
                        field: "route_name",
                        error: err.into(),
                    });
                }
                None
            }
        };

        let cached_data: Mutex<Option<(Request, Option<User>)>> = Mutex::new(None);
        hub.configure_scope(move |scope| {
            if transaction.is_some() {
                scope.set_transaction(transaction.as_deref());
            }
            scope.add_event_processor(move |event: &mut Event| {
                let mut cached_data = cached_data.lock().unwrap_or_else(PoisonError::into_inner);
                let (request, user) = cached_data.get_or_insert_with(|| {
                    let mut extractor = RequestExtractor::new(&source, max_request_body_size);
                    let request = extractor.extract_request();
                    let user = extractor.extract_user(&request, send_default_pii);
                    if let Some(ref client) = client {
                        for err in extractor.into_errors() {
                            client.report_internal_error(err);
                        }
                    }
                    (request, user)
                });

                if event.request.is_none() {
                    event.request = Some(request.clone());
                }
                if event.user.is_none() {
                    event.user = user.clone();
                }
            });
        });
    }
}
