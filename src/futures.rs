use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project::pin_project;

use crate::hub_impl::SwitchGuard;
use crate::Hub;

/// A future that binds a `Hub` to its execution.
///
/// This switches the thread-local hub to the bound one for every poll, so
/// code running inside the future sees it as [`Hub::current`] no matter
/// which worker thread polls it.
#[pin_project]
#[derive(Debug)]
pub struct HubFuture<F> {
    hub: Arc<Hub>,
    #[pin]
    future: F,
}

impl<F> HubFuture<F> {
    /// Creates a new bound future with a `Hub`.
    pub fn new(hub: Arc<Hub>, future: F) -> Self {
        Self { hub, future }
    }
}

impl<F> Future for HubFuture<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = SwitchGuard::new(this.hub.clone());
        this.future.poll(cx)
    }
}

/// Future extensions for binding hubs.
pub trait HubFutureExt: Sized {
    /// Binds a hub to the execution of this future.
    ///
    /// This ensures that the future is polled within the given hub.
    fn bind_hub<H>(self, hub: H) -> HubFuture<Self>
    where
        H: Into<Arc<Hub>>,
    {
        HubFuture {
            future: self,
            hub: hub.into(),
        }
    }
}

impl<F> HubFutureExt for F where F: Future {}
