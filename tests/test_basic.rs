use std::sync::Arc;

use vigil::protocol::{Breadcrumb, Level};
use vigil::test::{with_captured_events, with_captured_events_options};
use vigil::{ClientOptions, Hub, Scope};

#[test]
fn test_basic_capture_message() {
    let events = with_captured_events(|| {
        vigil::configure_scope(|scope| {
            scope.set_tag("worker", "worker1");
        });
        vigil::capture_message("Hello World!", Level::Warning);
    });
    assert_eq!(events.len(), 1);
    let event = events.into_iter().next().unwrap();
    assert_eq!(event.logentry.unwrap().message, "Hello World!");
    assert_eq!(event.level, Level::Warning);
    assert_eq!(
        event.tags.into_iter().collect::<Vec<(String, String)>>(),
        vec![("worker".to_string(), "worker1".to_string())]
    );
}

#[test]
fn test_pushed_scope_tags_message() {
    let events = with_captured_events(|| {
        let hub = Hub::current();
        let _guard = hub.push_scope();
        hub.configure_scope(|scope| scope.set_tag("env", "test"));
        hub.capture_message("ok", Level::Info);
    });
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tags.len(), 1);
    assert_eq!(events[0].tags["env"], "test");
    assert_eq!(events[0].logentry.as_ref().unwrap().message, "ok");
}

#[test]
fn test_breadcrumbs() {
    let events = with_captured_events(|| {
        vigil::add_breadcrumb(|| Breadcrumb {
            ty: "log".into(),
            message: Some("First breadcrumb".into()),
            ..Default::default()
        });
        vigil::add_breadcrumb(Breadcrumb {
            ty: "log".into(),
            message: Some("Second breadcrumb".into()),
            ..Default::default()
        });
        vigil::add_breadcrumb(|| {
            vec![
                Breadcrumb {
                    ty: "log".into(),
                    message: Some("Third breadcrumb".into()),
                    ..Default::default()
                },
                Breadcrumb {
                    ty: "log".into(),
                    message: Some("Fourth breadcrumb".into()),
                    ..Default::default()
                },
            ]
        });
        vigil::add_breadcrumb(|| None);
        vigil::capture_message("Hello World!", Level::Warning);
    });
    assert_eq!(events.len(), 1);
    let event = events.into_iter().next().unwrap();

    let messages: Vec<_> = event
        .breadcrumbs
        .iter()
        .map(|x| (x.message.as_deref().unwrap(), x.ty.as_str()))
        .collect();
    assert_eq!(
        messages,
        vec![
            ("First breadcrumb", "log"),
            ("Second breadcrumb", "log"),
            ("Third breadcrumb", "log"),
            ("Fourth breadcrumb", "log"),
        ]
    );
}

#[test]
fn test_breadcrumb_trail_keeps_most_recent() {
    let options = ClientOptions {
        max_breadcrumbs: 3,
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            for idx in 0..10 {
                vigil::add_breadcrumb(Breadcrumb {
                    message: Some(format!("crumb {idx}")),
                    ..Default::default()
                });
                let len = Hub::current().current_view().breadcrumbs().len();
                assert!(len <= 3);
            }
            vigil::capture_message("done", Level::Info);
        },
        options,
    );
    let messages: Vec<_> = events[0]
        .breadcrumbs
        .iter()
        .filter_map(|b| b.message.as_deref())
        .collect();
    assert_eq!(messages, vec!["crumb 7", "crumb 8", "crumb 9"]);
}

#[test]
fn test_before_breadcrumb_can_rewrite_and_drop() {
    let options = ClientOptions {
        before_breadcrumb: Some(Arc::new(|mut breadcrumb: Breadcrumb| {
            if breadcrumb.category.as_deref() == Some("noise") {
                return None;
            }
            breadcrumb.message = breadcrumb.message.map(|m| m.to_uppercase());
            Some(breadcrumb)
        })),
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            vigil::add_breadcrumb(Breadcrumb {
                category: Some("noise".into()),
                ..Default::default()
            });
            vigil::add_breadcrumb(Breadcrumb {
                message: Some("kept".into()),
                ..Default::default()
            });
            vigil::capture_message("done", Level::Info);
        },
        options,
    );
    assert_eq!(events[0].breadcrumbs.len(), 1);
    assert_eq!(events[0].breadcrumbs[0].message.as_deref(), Some("KEPT"));
}

#[test]
fn test_without_client_everything_is_a_noop() {
    let hub = Arc::new(Hub::new(None, Arc::new(Scope::default())));
    Hub::run(hub.clone(), || {
        assert!(vigil::capture_message("nobody listens", Level::Error).is_nil());
        vigil::add_breadcrumb(Breadcrumb::default());
        let called = vigil::configure_scope(|_| true);
        assert!(!called);
        assert!(vigil::last_event_id().is_none());
    });
    assert!(hub.current_view().breadcrumbs().is_empty());
}

#[test]
fn test_capture_error_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct ConnectError;

    #[derive(Debug, thiserror::Error)]
    #[error("could not load profile")]
    struct LoadError(#[source] ConnectError);

    let events = with_captured_events(|| {
        vigil::capture_error(&LoadError(ConnectError));
    });
    assert_eq!(events.len(), 1);
    let exceptions = &events[0].exception;
    assert_eq!(exceptions.len(), 2);
    assert_eq!(exceptions[0].ty, "ConnectError");
    assert_eq!(exceptions[1].ty, "LoadError");
    assert!(exceptions[0].stacktrace.is_none());
    assert!(exceptions[1].stacktrace.is_some());
}

#[test]
fn test_capture_exception_has_frames() {
    let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    let events = with_captured_events(|| {
        vigil::capture_exception(Some(&err));
    });
    assert_eq!(events.len(), 1);
    let exception = events[0].exception.last().unwrap();
    assert_eq!(exception.value.as_deref(), Some("disk full"));
    let stacktrace = exception.stacktrace.as_ref().unwrap();
    assert!(!stacktrace.frames.is_empty());
}

#[test]
fn test_capture_exception_without_panic_is_noop() {
    let events = with_captured_events(|| {
        assert!(vigil::capture_exception(None).is_nil());
    });
    assert!(events.is_empty());
}

#[test]
fn test_capture_exception_while_unwinding() {
    struct CaptureOnDrop;

    impl Drop for CaptureOnDrop {
        fn drop(&mut self) {
            vigil::capture_exception(None);
        }
    }

    let events = with_captured_events(|| {
        let hub = Hub::current();
        let result = std::panic::catch_unwind(|| {
            Hub::run(hub, || -> () {
                let _capture = CaptureOnDrop;
                panic!("boom");
            })
        });
        assert!(result.is_err());
    });
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, Level::Fatal);
    let mechanism = events[0].exception[0].mechanism.as_ref().unwrap();
    assert_eq!(mechanism.ty, "unwind");
    assert_eq!(mechanism.handled, Some(false));
}
