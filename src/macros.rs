use std::fmt;

use crate::Hub;

/// Checks whether the client bound to the current hub has `debug` set.
///
/// A hub whose stack is locked by this thread counts as not debugging.
#[doc(hidden)]
pub fn debug_enabled() -> bool {
    cfg!(feature = "debug-logs") || Hub::with(|hub| hub.is_debug_and_usage_safe())
}

#[doc(hidden)]
pub fn debug_emit(args: fmt::Arguments<'_>) {
    #[cfg(feature = "debug-logs")]
    {
        log::debug!(target: "vigil", "{}", args);
    }
    #[cfg(not(feature = "debug-logs"))]
    {
        eprintln!("[vigil] {}", args);
    }
}

/// Emits an internal diagnostic.
///
/// This prints to stderr when the client of the current hub has
/// `debug: true`.  With the `debug-logs` feature the message goes to the
/// `vigil` logger at debug level instead.  The hub is only peeked at, so
/// this is safe to use while a stack lock is held.
#[macro_export]
#[doc(hidden)]
macro_rules! vigil_debug {
    ($($arg:tt)*) => {
        if $crate::__macro_support::debug_enabled() {
            $crate::__macro_support::debug_emit(format_args!($($arg)*));
        }
    }
}
