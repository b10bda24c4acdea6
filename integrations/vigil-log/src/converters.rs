use vigil::protocol::{Breadcrumb, Event, Exception, Frame, Level, LogEntry, Stacktrace};

/// Converts a [`log::Level`] to a vigil [`Level`].
pub fn convert_log_level(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warning,
        log::Level::Info => Level::Info,
        log::Level::Debug | log::Level::Trace => Level::Debug,
    }
}

/// Creates a [`Breadcrumb`] from a given [`log::Record`].
pub fn breadcrumb_from_record(record: &log::Record<'_>) -> Breadcrumb {
    Breadcrumb {
        ty: "log".into(),
        level: convert_log_level(record.level()),
        category: Some(record.target().into()),
        message: Some(format!("{}", record.args())),
        ..Default::default()
    }
}

/// Creates a message [`Event`] from a given [`log::Record`].
///
/// The formatted record becomes `logentry.message` and the target the
/// logger name.
pub fn event_from_record(record: &log::Record<'_>) -> Event {
    Event {
        logger: Some(record.target().into()),
        level: convert_log_level(record.level()),
        logentry: Some(LogEntry {
            message: format!("{}", record.args()),
            params: vec![],
        }),
        ..Default::default()
    }
}

/// Creates an exception [`Event`] from a given [`log::Record`].
///
/// The exception carries a single frame pointing at the logging call site.
pub fn exception_from_record(record: &log::Record<'_>) -> Event {
    let mut event = event_from_record(record);
    let frame = Frame {
        module: record.module_path().map(ToOwned::to_owned),
        filename: record.file().map(ToOwned::to_owned),
        lineno: record.line().map(Into::into),
        in_app: Some(true),
        ..Default::default()
    };
    let exception = Exception {
        ty: record.target().into(),
        value: event.logentry.as_ref().map(|entry| entry.message.clone()),
        stacktrace: Some(Stacktrace {
            frames: vec![frame],
        }),
        ..Default::default()
    };
    event.exception = vec![exception];
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(convert_log_level(log::Level::Warn), Level::Warning);
        assert_eq!(convert_log_level(log::Level::Trace), Level::Debug);
        assert_eq!(convert_log_level(log::Level::Error), Level::Error);
    }

    #[test]
    fn test_exception_points_at_call_site() {
        let event = exception_from_record(
            &log::Record::builder()
                .args(format_args!("disk {} is full", "sda1"))
                .level(log::Level::Error)
                .target("storage")
                .module_path(Some("app::storage"))
                .file(Some("src/storage.rs"))
                .line(Some(42))
                .build(),
        );
        assert_eq!(event.logger.as_deref(), Some("storage"));
        assert_eq!(event.level, Level::Error);
        let exception = &event.exception[0];
        assert_eq!(exception.ty, "storage");
        assert_eq!(exception.value.as_deref(), Some("disk sda1 is full"));
        let frame = &exception.stacktrace.as_ref().unwrap().frames[0];
        assert_eq!(frame.filename.as_deref(), Some("src/storage.rs"));
        assert_eq!(frame.lineno, Some(42));
    }
}
