//! Vigil tracks what an application is currently doing and turns errors and
//! log records into enriched events before they leave the process.
//!
//! # Core Concepts
//!
//! The crate is centered around the concepts of [`Client`], [`Hub`] and
//! [`Scope`], as well as the extension points via the [`Integration`],
//! [`EventProcessor`], [`Transport`] and [`TransportFactory`] traits.
//!
//! A [`Hub`] owns a stack of scopes.  A scope holds contextual data (user,
//! tags, extra, transaction, breadcrumbs, event processors) and is pushed
//! for every unit of work, starting out as a copy of the scope below it.
//! When an event is captured it runs through the event processors, gets the
//! data of the current scope merged in and is handed to the transport.
//!
//! # Parallelism, Concurrency and Async
//!
//! Every thread has its own hub, derived from the main hub the first time it
//! is used.  Concurrent async tasks need their own hub too, bound to the
//! future with [`HubFutureExt::bind_hub`]:
//!
//! ```rust
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! use std::sync::Arc;
//! use vigil::{Hub, HubFutureExt};
//!
//! // Spawned thread with its own hub:
//! let outer_hub = Hub::current();
//! let result = std::thread::spawn(move || {
//!     Hub::run(Arc::new(Hub::new_from_top(&outer_hub)), || 2_u32 * 2)
//! })
//! .join();
//! assert_eq!(result.unwrap(), 4);
//!
//! // Spawned future with its own hub:
//! let hub = Arc::new(Hub::new_from_top(Hub::current()));
//! let result = tokio::spawn(async { 1_u32 }.bind_hub(hub)).await;
//! assert_eq!(result.unwrap(), 1);
//! # });
//! ```
//!
//! # Failure containment
//!
//! Nothing that goes wrong while an event is assembled reaches the host
//! application.  Failing or panicking processors, failing integration
//! installs and misuse of the scope stack are reported as [`InternalError`]s
//! through the debug output and `ClientOptions::internal_error_handler`.
//!
//! # Features
//!
//! - `feature = "debug-logs"`: Uses the `log` crate for debug output, instead
//!   of printing to `stderr`.

#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod api;
mod backtrace_support;
mod breadcrumbs;
mod client;
mod clientoptions;
mod error;
mod futures;
mod hub;
mod hub_impl;
mod init;
mod processor;
mod scope;
mod stack;
mod transport;
mod utils;

pub mod integrations;
pub mod protocol;

#[doc(hidden)]
pub mod __macro_support {
    pub use crate::macros::{debug_emit, debug_enabled};
}

pub use crate::api::*;
pub use crate::backtrace_support::{current_stacktrace, process_stacktrace};
pub use crate::breadcrumbs::{BreadcrumbTrail, IntoBreadcrumbs, DEFAULT_MAX_BREADCRUMBS};
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions, InternalErrorHandler};
pub use crate::error::{event_from_error, InternalError, ScopeError};
pub use crate::futures::{HubFuture, HubFutureExt};
pub use crate::hub::Hub;
pub use crate::hub_impl::SwitchGuard as HubSwitchGuard;
pub use crate::init::{apply_defaults, init, ClientInitGuard};
pub use crate::integrations::{Integration, IntegrationRegistry};
pub use crate::processor::{
    EventProcessor, EventProcessorChain, IntoProcessorOutcome, ProcessorOutcome,
};
pub use crate::protocol::{Breadcrumb, Event, Level, User};
pub use crate::scope::{Scope, ScopeGuard};
pub use crate::transport::{Transport, TransportFactory};
pub use crate::utils::parse_type_from_debug;

// Re-export external types and traits for convenience
pub use uuid::Uuid;
