use std::sync::Arc;

use crate::integrations::panic::PanicIntegration;
use crate::{Client, ClientOptions, Hub};

/// Helper struct that is returned from [`init`].
///
/// When this is dropped events are drained with the configured
/// `shutdown_timeout` and the transport is shut down.
#[must_use = "when the init guard is dropped the transport will be shut down and no further \
              events can be sent.  If you do want to ignore this use mem::forget on it."]
pub struct ClientInitGuard(Arc<Client>);

impl ClientInitGuard {
    /// Quick check if the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    /// The client that was bound.
    pub fn client(&self) -> &Arc<Client> {
        &self.0
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        vigil_debug!("[ClientInitGuard] Dropping client guard, closing client");
        self.0.close(None);
    }
}

/// Adds the default integrations to the options.
///
/// With `default_integrations` set this prepends the [`PanicIntegration`]
/// unless an integration with the same identifier is already listed.
pub fn apply_defaults(mut options: ClientOptions) -> ClientOptions {
    if options.default_integrations
        && !options
            .integrations
            .iter()
            .any(|integration| integration.identifier() == "panic")
    {
        options
            .integrations
            .insert(0, Arc::new(PanicIntegration::default()));
    }
    options
}

/// Creates a client with the default integrations and binds it to the
/// current hub.
///
/// Called on the main thread this binds the process hub, which every other
/// thread derives its hub from.  The returned guard closes the client when
/// dropped.
///
/// ```
/// let _vigil = vigil::init(vigil::ClientOptions {
///     release: Some("my-app@1.0.0".into()),
///     ..Default::default()
/// });
/// ```
pub fn init(options: ClientOptions) -> ClientInitGuard {
    let client = Arc::new(Client::with_options(apply_defaults(options)));
    Hub::with(|hub| hub.bind_client(Some(client.clone())));
    if client.is_enabled() {
        vigil_debug!("[init] Enabled vigil client");
    } else {
        vigil_debug!("[init] Initialized disabled vigil client (no transport)");
    }
    ClientInitGuard(client)
}
