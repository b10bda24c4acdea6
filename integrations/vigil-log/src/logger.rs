use crate::integration::{LogFilter, LogIntegration, RecordMapping};

/// Provides a dispatching logger.
///
/// Records are mapped by the [`LogIntegration`] of the client bound to the
/// current hub, then forwarded to the destination logger.  Records from
/// vigil's own `vigil` targets are never captured.
#[derive(Default)]
pub struct Logger {
    dest_log: Option<Box<dyn log::Log>>,
}

impl Logger {
    pub(crate) fn new(dest_log: Option<Box<dyn log::Log>>) -> Self {
        Logger { dest_log }
    }
}

fn is_internal(target: &str) -> bool {
    target == "vigil" || target.starts_with("vigil::")
}

impl log::Log for Logger {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        let captured = !is_internal(md.target())
            && vigil::with_integration(|integration: &LogIntegration| {
                integration.classify(md) != LogFilter::Ignore
            });
        captured || self.dest_log.as_ref().map_or(false, |log| log.enabled(md))
    }

    fn log(&self, record: &log::Record<'_>) {
        if !is_internal(record.target()) {
            let mappings =
                vigil::with_integration(|integration: &LogIntegration| integration.map_record(record));
            for mapping in mappings {
                match mapping {
                    RecordMapping::Breadcrumb(breadcrumb) => vigil::add_breadcrumb(breadcrumb),
                    RecordMapping::Event(event) => {
                        vigil::capture_event(event);
                    }
                }
            }
        }
        if let Some(ref log) = self.dest_log {
            if log.enabled(record.metadata()) {
                log.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(ref log) = self.dest_log {
            log.flush();
        }
    }
}

#[test]
fn test_internal_targets() {
    assert!(is_internal("vigil"));
    assert!(is_internal("vigil::client"));
    assert!(!is_internal("vigilant"));
    assert!(!is_internal("app::vigil"));
}
