//! Event processors and the chain that runs them.
//!
//! Every captured event is threaded through the client-level processors
//! first and the processors of the active scope after that.  Processors
//! enrich the event in place or veto it.  A processor that fails or panics
//! is reported and skipped, it never takes the capture down with it.

use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::InternalError;
use crate::integrations::Integration;
use crate::protocol::{Event, User};
use crate::utils::message_from_panic_payload;
use crate::ClientOptions;

/// What should happen with an event after a processor looked at it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ProcessorOutcome {
    /// Continue processing and send the event.
    #[default]
    Keep,
    /// Drop the event.  No later processor sees it and nothing is sent.
    Discard,
}

/// Conversion of processor return values into a [`ProcessorOutcome`].
///
/// This lets plain closures be used as processors:
///
/// * `()` keeps the event,
/// * `bool` keeps it on `true` and discards it on `false`,
/// * `ProcessorOutcome` is used as is,
/// * `Result<T, E>` reports the error and otherwise converts `T`.
pub trait IntoProcessorOutcome {
    /// Performs the conversion.
    fn into_outcome(self) -> anyhow::Result<ProcessorOutcome>;
}

impl IntoProcessorOutcome for () {
    fn into_outcome(self) -> anyhow::Result<ProcessorOutcome> {
        Ok(ProcessorOutcome::Keep)
    }
}

impl IntoProcessorOutcome for bool {
    fn into_outcome(self) -> anyhow::Result<ProcessorOutcome> {
        Ok(if self {
            ProcessorOutcome::Keep
        } else {
            ProcessorOutcome::Discard
        })
    }
}

impl IntoProcessorOutcome for ProcessorOutcome {
    fn into_outcome(self) -> anyhow::Result<ProcessorOutcome> {
        Ok(self)
    }
}

impl<T, E> IntoProcessorOutcome for Result<T, E>
where
    T: IntoProcessorOutcome,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> anyhow::Result<ProcessorOutcome> {
        self.map_err(Into::into)?.into_outcome()
    }
}

/// A generic event processor.
///
/// A processor can add information to an event, modify existing
/// information, or decide to discard the event altogether, in which case
/// further processing and sending is skipped.
pub trait EventProcessor: Send + Sync {
    /// Processes an event in place.
    fn process_event(&self, event: &mut Event) -> anyhow::Result<ProcessorOutcome>;

    /// A name used in diagnostics about this processor.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

impl<F, R> EventProcessor for F
where
    F: Fn(&mut Event) -> R + Send + Sync,
    R: IntoProcessorOutcome,
{
    fn process_event(&self, event: &mut Event) -> anyhow::Result<ProcessorOutcome> {
        self(event).into_outcome()
    }
}

enum Link<'a> {
    Integration {
        integration: &'a dyn Integration,
        options: &'a ClientOptions,
    },
    Processor(&'a dyn EventProcessor),
}

impl Link<'_> {
    fn name(&self) -> Cow<'static, str> {
        match self {
            Link::Integration { integration, .. } => Cow::Borrowed(integration.identifier()),
            Link::Processor(processor) => processor.name(),
        }
    }

    fn run(&self, event: &mut Event) -> anyhow::Result<ProcessorOutcome> {
        match self {
            Link::Integration {
                integration,
                options,
            } => integration.process_event(event, options),
            Link::Processor(processor) => processor.process_event(event),
        }
    }
}

/// An ordered set of processors applied to one event.
///
/// Processors run in the order they were added.  Once `user` is set on the
/// event, by the capturing code or by any processor, later processors
/// cannot replace or remove it.
#[derive(Default)]
pub struct EventProcessorChain<'a> {
    links: Vec<Link<'a>>,
}

impl fmt::Debug for EventProcessorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.links.iter().map(Link::name).collect();
        f.debug_struct("EventProcessorChain")
            .field("links", &names)
            .finish()
    }
}

impl<'a> EventProcessorChain<'a> {
    /// Creates an empty chain.
    pub fn new() -> EventProcessorChain<'a> {
        Default::default()
    }

    /// Appends the event hook of an integration.
    pub fn push_integration(&mut self, integration: &'a dyn Integration, options: &'a ClientOptions) {
        self.links.push(Link::Integration {
            integration,
            options,
        });
    }

    /// Appends a processor.
    pub fn push(&mut self, processor: &'a dyn EventProcessor) {
        self.links.push(Link::Processor(processor));
    }

    /// Appends several processors in order.
    pub fn extend<I>(&mut self, processors: I)
    where
        I: IntoIterator<Item = &'a dyn EventProcessor>,
    {
        self.links
            .extend(processors.into_iter().map(Link::Processor));
    }

    /// The number of processors in the chain.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the chain has no processors.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Threads the event through all processors.
    ///
    /// Failing and panicking processors are handed to `on_error` and the
    /// chain continues with the next one.  Returns `None` if a processor
    /// discarded the event.
    pub fn apply<F>(&self, mut event: Event, mut on_error: F) -> Option<Event>
    where
        F: FnMut(InternalError),
    {
        let mut pinned_user: Option<User> = event.user.clone();

        for link in &self.links {
            let result = panic::catch_unwind(AssertUnwindSafe(|| link.run(&mut event)));
            match result {
                Ok(Ok(ProcessorOutcome::Keep)) => {}
                Ok(Ok(ProcessorOutcome::Discard)) => {
                    vigil_debug!(
                        "[EventProcessorChain] `{}` discarded event {}",
                        link.name(),
                        event.event_id
                    );
                    return None;
                }
                Ok(Err(error)) => on_error(InternalError::ProcessorFailed {
                    processor: link.name().into_owned(),
                    error,
                }),
                Err(payload) => on_error(InternalError::ProcessorPanicked {
                    processor: link.name().into_owned(),
                    message: message_from_panic_payload(&*payload).to_owned(),
                }),
            }

            match pinned_user {
                Some(ref user) => {
                    if event.user.as_ref() != Some(user) {
                        vigil_debug!(
                            "[EventProcessorChain] `{}` tried to replace the user, keeping the first one",
                            link.name()
                        );
                        event.user = Some(user.clone());
                    }
                }
                None => pinned_user = event.user.clone(),
            }
        }

        Some(event)
    }
}
