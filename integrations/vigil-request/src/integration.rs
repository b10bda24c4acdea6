use vigil::Integration;

use crate::extractor::MaxRequestBodySize;

/// Per-client settings for request enrichment.
///
/// A [`RequestMiddleware`](crate::RequestMiddleware) without explicit
/// settings uses the ones of the integration attached to the current client.
#[derive(Debug, Default)]
pub struct RequestIntegration {
    max_request_body_size: MaxRequestBodySize,
}

impl RequestIntegration {
    /// Creates a new request integration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how much of a request body is attached to events.
    #[must_use]
    pub fn with_max_request_body_size(mut self, size: MaxRequestBodySize) -> Self {
        self.max_request_body_size = size;
        self
    }

    /// The configured body size limit.
    pub fn max_request_body_size(&self) -> MaxRequestBodySize {
        self.max_request_body_size
    }
}

impl Integration for RequestIntegration {
    fn identifier(&self) -> &'static str {
        "request"
    }
}
