//! Adds support for automatic Breadcrumb and Event capturing from logs.
//!
//! The `log` crate is supported in two ways.  First, logs can be captured as
//! breadcrumbs for later.  Secondly, error logs can be captured as events.
//! By default anything at `Info` or above is recorded as breadcrumb and
//! anything at `Error` is captured as event.  A record that is captured as
//! event is always recorded as breadcrumb first.
//!
//! # Examples
//!
//! ```
//! let log_integration = vigil_log::LogIntegration::default();
//! let _vigil = vigil::init(vigil::ClientOptions::default().add_integration(log_integration));
//!
//! log::info!("Generates a breadcrumb");
//! ```
//!
//! Or optionally with env_logger support:
//!
//! ```
//! # #[cfg(feature = "env_logger")] {
//! let mut log_builder = pretty_env_logger::formatted_builder();
//! log_builder.parse_filters("info");
//! let log_integration =
//!     vigil_log::LogIntegration::default().with_env_logger_dest(Some(log_builder.build()));
//! let _vigil = vigil::init(vigil::ClientOptions::default().add_integration(log_integration));
//!
//! log::error!("Generates an event");
//! # }
//! ```

#![warn(missing_docs)]

mod converters;
mod integration;
mod logger;

pub use converters::{breadcrumb_from_record, convert_log_level, event_from_record, exception_from_record};
pub use integration::{LogFilter, LogIntegration, RecordMapping};
pub use logger::Logger;
