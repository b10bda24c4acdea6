use std::fmt;
use std::sync::{Arc, Mutex};

use url::Url;
use vigil::protocol::{Level, Map};
use vigil::test::{with_captured_events, with_captured_events_options};
use vigil::{ClientOptions, Hub, InternalError};
use vigil_request::{
    ExtractError, MaxRequestBodySize, Principal, PrincipalSource, RequestDataSource,
    RequestIntegration, RequestMiddleware,
};

struct StaticPrincipal(Principal);

impl PrincipalSource for StaticPrincipal {
    fn current_principal(&self) -> Option<Principal> {
        Some(self.0.clone())
    }
}

#[derive(Default)]
struct FakeRequest {
    method: &'static str,
    route: Option<&'static str>,
    cookies: Map<String, String>,
    env: Map<String, String>,
    body: Option<&'static str>,
    principal: Option<StaticPrincipal>,
    broken_env: bool,
}

impl RequestDataSource for FakeRequest {
    fn url(&self) -> Result<Url, ExtractError> {
        Ok("https://shop.example.com/cart?item=7".parse().unwrap())
    }

    fn method(&self) -> Result<String, ExtractError> {
        Ok(self.method.into())
    }

    fn env(&self) -> Result<Map<String, String>, ExtractError> {
        if self.broken_env {
            return Err(anyhow::anyhow!("environment unavailable").into());
        }
        Ok(self.env.clone())
    }

    fn cookies(&self) -> Result<Map<String, String>, ExtractError> {
        Ok(self.cookies.clone())
    }

    fn raw_body(&self) -> Result<Option<Vec<u8>>, ExtractError> {
        Ok(self.body.map(|body| body.as_bytes().to_vec()))
    }

    fn route_name(&self) -> Result<Option<String>, ExtractError> {
        Ok(self.route.map(Into::into))
    }

    fn principal_source(&self) -> Option<&dyn PrincipalSource> {
        self.principal.as_ref().map(|p| p as &dyn PrincipalSource)
    }
}

fn get() -> FakeRequest {
    FakeRequest {
        method: "GET",
        ..Default::default()
    }
}

#[derive(Debug)]
struct HandlerError;

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("checkout failed")
    }
}

impl std::error::Error for HandlerError {}

#[test]
fn test_get_with_empty_cookies() {
    let events = with_captured_events(|| {
        let middleware = RequestMiddleware::new();
        let result: Result<(), HandlerError> = middleware.handle(get(), || {
            vigil::capture_message("inside", Level::Info);
            Ok(())
        });
        assert!(result.is_ok());
    });

    assert_eq!(events.len(), 1);
    let request = events[0].request.as_ref().unwrap();
    assert_eq!(request.cookies, Some(Map::new()));
    assert_eq!(request.method.as_deref(), Some("GET"));
    assert_eq!(request.query_string.as_deref(), Some("item=7"));
    assert_eq!(request.data, None);
    assert!(events[0].user.is_none());
}

#[test]
fn test_handler_error_is_captured_and_returned() {
    let events = with_captured_events(|| {
        let middleware = RequestMiddleware::new();
        let request = FakeRequest {
            method: "POST",
            route: Some("checkout"),
            body: Some(r#"{"items": [7]}"#),
            ..Default::default()
        };
        let result: Result<(), HandlerError> = middleware.handle(request, || Err(HandlerError));
        assert_eq!(result.unwrap_err().to_string(), "checkout failed");
    });

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.exception[0].value.as_deref(), Some("checkout failed"));
    assert_eq!(event.transaction.as_deref(), Some("checkout"));
    let request = event.request.as_ref().unwrap();
    assert_eq!(request.method.as_deref(), Some("POST"));
    assert_eq!(request.data, Some(serde_json::json!({"items": [7]})));
}

#[test]
fn test_capture_errors_disabled() {
    let events = with_captured_events(|| {
        let middleware = RequestMiddleware::new().capture_errors(false);
        let result: Result<(), HandlerError> = middleware.handle(get(), || Err(HandlerError));
        assert!(result.is_err());
    });
    assert!(events.is_empty());
}

#[test]
fn test_scope_is_popped_after_request() {
    let events = with_captured_events(|| {
        let middleware = RequestMiddleware::new();
        let request = FakeRequest {
            route: Some("index"),
            ..get()
        };
        let _: Result<(), HandlerError> = middleware.handle(request, || Ok(()));
        vigil::capture_message("outside", Level::Info);
    });

    assert_eq!(events.len(), 1);
    assert!(events[0].request.is_none());
    assert!(events[0].transaction.is_none());
}

#[test]
fn test_user_from_principal_and_pii() {
    let mut env = Map::new();
    env.insert("REMOTE_ADDR".into(), "192.0.2.1".into());
    let request = || FakeRequest {
        env: env.clone(),
        principal: Some(StaticPrincipal(Principal {
            id: Some("7".into()),
            email: None,
            username: Some("jane".into()),
        })),
        ..get()
    };

    let events = with_captured_events(|| {
        let _: Result<(), HandlerError> = RequestMiddleware::new().handle(request(), || {
            vigil::capture_message("who", Level::Info);
            Ok(())
        });
    });
    let user = events[0].user.as_ref().unwrap();
    assert_eq!(user.id.as_deref(), Some("7"));
    assert_eq!(user.username.as_deref(), Some("jane"));
    assert_eq!(user.ip_address, None);

    let options = ClientOptions {
        send_default_pii: true,
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            let _: Result<(), HandlerError> = RequestMiddleware::new().handle(request(), || {
                vigil::capture_message("who", Level::Info);
                Ok(())
            });
        },
        options,
    );
    let user = events[0].user.as_ref().unwrap();
    assert_eq!(user.ip_address.as_deref(), Some("192.0.2.1"));
}

#[test]
fn test_existing_request_and_user_are_kept() {
    let events = with_captured_events(|| {
        let _: Result<(), HandlerError> = RequestMiddleware::new().handle(get(), || {
            vigil::capture_event(vigil::protocol::Event {
                request: Some(vigil::protocol::Request {
                    method: Some("PATCH".into()),
                    ..Default::default()
                }),
                ..Default::default()
            });
            Ok(())
        });
    });
    assert_eq!(
        events[0].request.as_ref().unwrap().method.as_deref(),
        Some("PATCH")
    );
}

#[test]
fn test_failing_field_is_reported() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    let options = ClientOptions {
        internal_error_handler: Some(Arc::new(move |err: &InternalError| {
            sink.lock().unwrap().push(err.to_string());
        })),
        ..Default::default()
    };

    let events = with_captured_events_options(
        || {
            let request = FakeRequest {
                broken_env: true,
                ..get()
            };
            let _: Result<(), HandlerError> = RequestMiddleware::new().handle(request, || {
                vigil::capture_message("first", Level::Info);
                vigil::capture_message("second", Level::Info);
                Ok(())
            });
        },
        options,
    );

    assert_eq!(events.len(), 2);
    for event in &events {
        let request = event.request.as_ref().unwrap();
        assert!(request.env.is_empty());
        assert_eq!(request.method.as_deref(), Some("GET"));
    }
    // the request is extracted once per unit of work
    assert_eq!(
        reported.lock().unwrap().as_slice(),
        ["could not extract `env`: environment unavailable".to_string()]
    );
}

#[test]
fn test_body_limit_from_integration() {
    let options = ClientOptions::new().add_integration(
        RequestIntegration::new().with_max_request_body_size(MaxRequestBodySize::None),
    );
    let events = with_captured_events_options(
        || {
            let request = FakeRequest {
                body: Some("short"),
                ..get()
            };
            let _: Result<(), HandlerError> = RequestMiddleware::new().handle(request, || {
                vigil::capture_message("no body", Level::Info);
                Ok(())
            });

            let request = FakeRequest {
                body: Some("short"),
                ..get()
            };
            let _: Result<(), HandlerError> = RequestMiddleware::new()
                .max_request_body_size(MaxRequestBodySize::Small)
                .handle(request, || {
                    vigil::capture_message("with body", Level::Info);
                    Ok(())
                });
        },
        options,
    );

    assert_eq!(events[0].request.as_ref().unwrap().data, None);
    assert_eq!(
        events[1].request.as_ref().unwrap().data,
        Some(serde_json::Value::String("short".into()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_async_requests() {
    let transport = vigil::test::TestTransport::new();
    let client = Arc::new(vigil::Client::with_options(ClientOptions {
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    }));
    let root = Arc::new(Hub::new(Some(client), Arc::new(Default::default())));

    let middleware = RequestMiddleware::new();
    let tasks: Vec<_> = ["alpha", "beta", "gamma", "delta"]
        .into_iter()
        .map(|route| {
            let request = FakeRequest {
                route: Some(route),
                ..get()
            };
            let future = Hub::run(root.clone(), || {
                middleware.handle_async(request, async move {
                    tokio::task::yield_now().await;
                    vigil::capture_message(route, Level::Info);
                    Ok::<_, HandlerError>(())
                })
            });
            tokio::spawn(future)
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 4);
    for event in events {
        let message = &event.logentry.as_ref().unwrap().message;
        assert_eq!(event.transaction.as_ref(), Some(message));
    }
    assert!(root.current_view().transaction().is_none());
}
