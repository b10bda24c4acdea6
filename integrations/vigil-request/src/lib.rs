//! Enriches events with the request a web framework is handling.
//!
//! Frameworks expose their request object through [`RequestDataSource`] and
//! wrap their handler entry point in a [`RequestMiddleware`].  Each request
//! then runs in its own scope: events captured while handling it carry the
//! request data, the route as transaction and, when a [`PrincipalSource`]
//! is available, the authenticated user.
//!
//! # Example
//!
//! ```
//! use vigil::protocol::Map;
//! use vigil_request::{ExtractError, RequestDataSource, RequestMiddleware};
//!
//! struct IncomingRequest {
//!     path: String,
//! }
//!
//! impl RequestDataSource for IncomingRequest {
//!     fn url(&self) -> Result<url::Url, ExtractError> {
//!         let url = format!("http://localhost{}", self.path);
//!         url.parse().map_err(|err: url::ParseError| ExtractError::Malformed {
//!             field: "url",
//!             reason: err.to_string(),
//!         })
//!     }
//!
//!     fn method(&self) -> Result<String, ExtractError> {
//!         Ok("GET".into())
//!     }
//! }
//!
//! let _vigil = vigil::init(
//!     vigil::ClientOptions::new().add_integration(vigil_request::RequestIntegration::new()),
//! );
//!
//! let middleware = RequestMiddleware::new();
//! let request = IncomingRequest { path: "/users/42".into() };
//! let response: Result<&str, std::io::Error> = middleware.handle(request, || Ok("hello"));
//! assert_eq!(response.unwrap(), "hello");
//! ```

#![warn(missing_docs)]

mod extractor;
mod integration;
mod middleware;
mod source;

pub use extractor::{MaxRequestBodySize, RequestExtractor};
pub use integration::RequestIntegration;
pub use middleware::RequestMiddleware;
pub use source::{ExtractError, FileRef, Principal, PrincipalSource, RequestDataSource};
