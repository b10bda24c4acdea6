//! The integration contract and the process-wide integration registry.
//!
//! An integration is a named adapter that hooks a host lifecycle point (a
//! request handler, a logging dispatch function, the panic hook) into the
//! hub: it pushes a scope per unit of work, registers event processors and
//! captures host failures.
//!
//! Hooks must not be installed twice, so installation goes through the
//! [`IntegrationRegistry`], which remembers installed identifiers for the
//! lifetime of the process.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use lazy_static::lazy_static;

use crate::error::InternalError;
use crate::processor::ProcessorOutcome;
use crate::protocol::Event;
use crate::ClientOptions;

pub mod panic;

/// Integration abstraction.
///
/// An integration has two roles.  It can act as an *event source*: its
/// [`install`](Integration::install) hook wraps a host entry point so that
/// units of work get their own scope and host failures get captured.  And it
/// can act as a *client level event processor* through
/// [`process_event`](Integration::process_event).
// `Any` is needed so clients can hand out typed references to integrations.
pub trait Integration: Sync + Send + Any + AsAny {
    /// The unique identifier of this integration.
    fn identifier(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Installs the hooks of this integration.
    ///
    /// This runs at most once per process for every identifier, no matter
    /// how many clients list the integration.  Hooks therefore must not
    /// capture per-client configuration; they should look up the active
    /// client's integration through [`Hub::with_integration`] instead.
    ///
    /// [`Hub::with_integration`]: crate::Hub::with_integration
    fn install(&self, options: &ClientOptions) -> anyhow::Result<()> {
        let _options = options;
        Ok(())
    }

    /// Called whenever the integration is attached to a client.
    fn setup(&self, options: &mut ClientOptions) {
        let _options = options;
    }

    /// The client level event processor hook.
    fn process_event(
        &self,
        event: &mut Event,
        options: &ClientOptions,
    ) -> anyhow::Result<ProcessorOutcome> {
        let _ = (event, options);
        Ok(ProcessorOutcome::Keep)
    }
}

// This is needed as a workaround to be able to safely downcast integrations
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The result of asking the registry to install an integration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// The install hook ran and succeeded.
    Installed,
    /// An integration with the same identifier was installed before, the
    /// hook did not run.
    AlreadyInstalled,
}

/// Keeps track of installed integration identifiers.
///
/// The process uses a single [`global`](IntegrationRegistry::global)
/// registry.  Separate instances are only useful to test integrations.
pub struct IntegrationRegistry {
    installed: Mutex<Vec<&'static str>>,
}

impl fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("installed", &self.installed())
            .finish()
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        IntegrationRegistry::new()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: IntegrationRegistry = IntegrationRegistry::new();
}

impl IntegrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> IntegrationRegistry {
        IntegrationRegistry {
            installed: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide registry used by clients.
    pub fn global() -> &'static IntegrationRegistry {
        &GLOBAL_REGISTRY
    }

    /// Installs an integration unless its identifier is taken.
    ///
    /// The registry lock is held while the install hook runs, so concurrent
    /// installs of the same identifier run the hook once.  A failing hook
    /// leaves the identifier free for a later attempt.
    pub fn install(
        &self,
        integration: &dyn Integration,
        options: &ClientOptions,
    ) -> Result<InstallState, InternalError> {
        let identifier = integration.identifier();
        let mut installed = self
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if installed.contains(&identifier) {
            return Ok(InstallState::AlreadyInstalled);
        }
        integration
            .install(options)
            .map_err(|error| InternalError::IntegrationInstall { identifier, error })?;
        installed.push(identifier);
        vigil_debug!("[IntegrationRegistry] Installed integration: {}", identifier);
        Ok(InstallState::Installed)
    }

    /// Returns `true` if an integration with this identifier was installed.
    pub fn is_installed(&self, identifier: &str) -> bool {
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&identifier)
    }

    /// The installed identifiers in installation order.
    pub fn installed(&self) -> Vec<&'static str> {
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingIntegration {
        installs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Integration for CountingIntegration {
        fn identifier(&self) -> &'static str {
            "counting"
        }

        fn install(&self, _options: &ClientOptions) -> anyhow::Result<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("host entry point not found");
            }
            Ok(())
        }
    }

    #[test]
    fn test_install_runs_once_per_identifier() {
        let registry = IntegrationRegistry::new();
        let installs = Arc::new(AtomicUsize::new(0));
        let integration = CountingIntegration {
            installs: installs.clone(),
            fail: false,
        };
        let options = ClientOptions::default();

        assert_eq!(
            registry.install(&integration, &options).unwrap(),
            InstallState::Installed
        );
        assert_eq!(
            registry.install(&integration, &options).unwrap(),
            InstallState::AlreadyInstalled
        );
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert!(registry.is_installed("counting"));
        assert_eq!(registry.installed(), vec!["counting"]);
    }

    #[test]
    fn test_failed_install_can_be_retried() {
        let registry = IntegrationRegistry::new();
        let installs = Arc::new(AtomicUsize::new(0));
        let options = ClientOptions::default();

        let broken = CountingIntegration {
            installs: installs.clone(),
            fail: true,
        };
        let err = registry.install(&broken, &options).unwrap_err();
        assert!(err.to_string().contains("host entry point not found"));
        assert!(!registry.is_installed("counting"));

        let fixed = CountingIntegration {
            installs: installs.clone(),
            fail: false,
        };
        assert_eq!(
            registry.install(&fixed, &options).unwrap(),
            InstallState::Installed
        );
        assert_eq!(installs.load(Ordering::SeqCst), 2);
    }
}
