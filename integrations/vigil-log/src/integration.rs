use std::sync::{Mutex, PoisonError};

use log::{Metadata, Record};
use vigil::protocol::{Breadcrumb, Event};
use vigil::{ClientOptions, Integration};

use crate::converters::{breadcrumb_from_record, event_from_record, exception_from_record};
use crate::logger::Logger;

/// What should happen with a [`log::Record`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogFilter {
    /// Ignore the [`Record`].
    Ignore,
    /// Create a [`Breadcrumb`] from this [`Record`].
    Breadcrumb,
    /// Create a breadcrumb and a message [`Event`] from this [`Record`].
    Event,
    /// Create a breadcrumb and an exception [`Event`] from this [`Record`].
    Exception,
}

/// The data created for a [`log::Record`].
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum RecordMapping {
    /// Adds the [`Breadcrumb`] to the current scope.
    Breadcrumb(Breadcrumb),
    /// Captures the [`Event`].
    Event(Event),
}

type FilterFn = dyn Fn(&Metadata<'_>) -> LogFilter + Send + Sync;
type MapperFn = dyn Fn(&Record<'_>) -> Vec<RecordMapping> + Send + Sync;

/// Logger specific options.
///
/// The integration installs a single [`Logger`] for the process.  That
/// logger reads the thresholds of whatever `LogIntegration` is attached to
/// the client of the current hub, so different clients can use different
/// thresholds.
///
/// By default records at `Info` and above become breadcrumbs and records at
/// `Error` become events.
pub struct LogIntegration {
    breadcrumb_level: log::LevelFilter,
    event_level: log::LevelFilter,
    global_filter: Option<log::LevelFilter>,
    attach_location: bool,
    dest_log: Mutex<Option<Box<dyn log::Log>>>,
    filter: Option<Box<FilterFn>>,
    mapper: Option<Box<MapperFn>>,
}

impl Integration for LogIntegration {
    fn identifier(&self) -> &'static str {
        "log"
    }

    fn install(&self, _options: &ClientOptions) -> anyhow::Result<()> {
        let dest_log = self
            .dest_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        log::set_boxed_logger(Box::new(Logger::new(dest_log)))?;
        Ok(())
    }

    fn setup(&self, _options: &mut ClientOptions) {
        let filter = self.effective_global_filter();
        if filter > log::max_level() {
            log::set_max_level(filter);
        }
    }
}

impl Default for LogIntegration {
    fn default() -> Self {
        Self {
            breadcrumb_level: log::LevelFilter::Info,
            event_level: log::LevelFilter::Error,
            global_filter: None,
            attach_location: false,
            dest_log: Mutex::new(None),
            filter: None,
            mapper: None,
        }
    }
}

impl std::fmt::Debug for LogIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[derive(Debug)]
        struct DestLog;
        let dest_log = self
            .dest_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|_| DestLog);

        f.debug_struct("LogIntegration")
            .field("breadcrumb_level", &self.breadcrumb_level)
            .field("event_level", &self.event_level)
            .field("global_filter", &self.global_filter)
            .field("attach_location", &self.attach_location)
            .field("dest_log", &dest_log)
            .field("filter", &self.filter.is_some())
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

impl LogIntegration {
    /// Creates a new `log` Integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level from which records become breadcrumbs.
    #[must_use]
    pub fn with_breadcrumb_level(mut self, level: log::LevelFilter) -> Self {
        self.breadcrumb_level = level;
        self
    }

    /// Sets the level from which records become events.
    ///
    /// Records captured as events are recorded as breadcrumbs as well.
    #[must_use]
    pub fn with_event_level(mut self, level: log::LevelFilter) -> Self {
        self.event_level = level;
        self
    }

    /// Sets the global filter, which also applies before dispatching to the
    /// destination logger.
    #[must_use]
    pub fn with_global_filter(mut self, filter: log::LevelFilter) -> Self {
        self.global_filter = Some(filter);
        self
    }

    /// Captures events as exceptions pointing at the logging call site.
    #[must_use]
    pub fn with_location(mut self, attach_location: bool) -> Self {
        self.attach_location = attach_location;
        self
    }

    /// Sets a logger that receives every record after it was handled.
    ///
    /// The destination is moved into the process-wide logger on install, so
    /// only the destination of the first installed integration is used.
    #[must_use]
    pub fn with_dest_log<L: log::Log + 'static>(self, dest_log: L) -> Self {
        *self
            .dest_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(dest_log));
        self
    }

    /// Initializes an env logger as destination target.
    #[cfg(feature = "env_logger")]
    #[must_use]
    pub fn with_env_logger_dest(mut self, logger: Option<env_logger::Logger>) -> Self {
        let logger = logger
            .unwrap_or_else(|| env_logger::Builder::from_env(env_logger::Env::default()).build());
        let filter = logger.filter();
        if self.global_filter.is_none() {
            self.global_filter = Some(filter);
        }
        self.with_dest_log(logger)
    }

    /// Sets a custom filter function.
    ///
    /// The filter classifies how a [`Record`] is handled based on its
    /// [`log::Metadata`], replacing the level thresholds.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Metadata<'_>) -> LogFilter + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Sets a custom mapper function.
    ///
    /// The mapper is responsible for creating breadcrumbs and events from
    /// [`Record`]s that passed the filter.  They are applied in order.
    #[must_use]
    pub fn mapper<M>(mut self, mapper: M) -> Self
    where
        M: Fn(&Record<'_>) -> Vec<RecordMapping> + Send + Sync + 'static,
    {
        self.mapper = Some(Box::new(mapper));
        self
    }

    /// Returns the effective global filter.
    ///
    /// This is what is set for these logger options when the log level
    /// needs to be set globally.  This is the greater of `global_filter`
    /// and the two thresholds.
    pub(crate) fn effective_global_filter(&self) -> log::LevelFilter {
        let own = std::cmp::max(self.breadcrumb_level, self.event_level);
        match self.global_filter {
            Some(filter) => std::cmp::max(filter, own),
            None => own,
        }
    }

    /// Classifies a record.
    pub fn classify(&self, md: &Metadata<'_>) -> LogFilter {
        if let Some(ref filter) = self.filter {
            return filter(md);
        }
        if md.level() <= self.event_level {
            if self.attach_location {
                LogFilter::Exception
            } else {
                LogFilter::Event
            }
        } else if md.level() <= self.breadcrumb_level {
            LogFilter::Breadcrumb
        } else {
            LogFilter::Ignore
        }
    }

    /// Creates the breadcrumbs and events for a record, breadcrumb first.
    pub fn map_record(&self, record: &Record<'_>) -> Vec<RecordMapping> {
        let filter = self.classify(record.metadata());
        if filter == LogFilter::Ignore {
            return vec![];
        }
        if let Some(ref mapper) = self.mapper {
            return mapper(record);
        }
        let breadcrumb = RecordMapping::Breadcrumb(breadcrumb_from_record(record));
        match filter {
            LogFilter::Ignore => vec![],
            LogFilter::Breadcrumb => vec![breadcrumb],
            LogFilter::Event => vec![breadcrumb, RecordMapping::Event(event_from_record(record))],
            LogFilter::Exception => vec![
                breadcrumb,
                RecordMapping::Event(exception_from_record(record)),
            ],
        }
    }
}
