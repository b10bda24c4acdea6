//! The data model of captured events.
//!
//! Events, breadcrumbs and the records hanging off them are plain data.
//! Processors mutate them in place while an event is assembled.

mod event;
mod level;
mod utils;

pub use self::event::{
    Addr, Breadcrumb, Event, Exception, Frame, LogEntry, Map, Mechanism, Request, Stacktrace,
    User, Value, DEFAULT_FINGERPRINT,
};
pub use self::level::{Level, ParseLevelError};
