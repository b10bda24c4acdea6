use std::borrow::Cow;

use backtrace::Backtrace;
use regex::Regex;

use crate::protocol::{Frame, Stacktrace};
use crate::ClientOptions;

lazy_static::lazy_static! {
    static ref HASH_FUNC_RE: Regex = Regex::new(r#"(?x)
        ^(.*)::h[a-f0-9]{16}$
    "#).unwrap();

    static ref CRATE_RE: Regex = Regex::new(r#"(?x)
        ^
        (?:_?<)?           # trait impl syntax
        (?:\w+\ as\ )?     # anonymous implementor
        ([a-zA-Z0-9_]+?)   # crate name
        (?:\.\.|::)        # crate delimiter
    "#).unwrap();
}

/// Frames from these modules are never considered application code.
const WELL_KNOWN_NOT_IN_APP: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "vigil::",
    "vigil_log::",
    "vigil_request::",
    "__rust_",
    "___rust_",
    "_rust_begin_unwind",
    "anyhow::",
    "log::",
    "tokio::",
    "futures_core::",
    "futures_util::",
];

/// Everything up to and including the innermost of these frames belongs to
/// the capture machinery and is cut from captured stacktraces.
const WELL_KNOWN_BORDER_FRAMES: &[&str] = &[
    "std::panicking::begin_panic",
    "core::panicking::panic",
    "vigil::backtrace_support::current_stacktrace",
    "<vigil_log::logger::Logger as log::Log>::log",
];

/// Returns the file name portion of a path.
pub fn filename(s: &str) -> &str {
    s.rsplit(&['/', '\\'][..]).next().unwrap_or(s)
}

/// Strips the trailing `::h<hash>` from a rust symbol.
pub fn sanitize_symbol(s: &str) -> &str {
    HASH_FUNC_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(s)
}

/// Tries to parse the rust crate from a function name.
pub fn parse_crate_name(func_name: &str) -> Option<String> {
    CRATE_RE
        .captures(func_name)
        .and_then(|caps| caps.get(1))
        .map(|cr| cr.as_str().into())
}

/// Checks whether the function name starts with the given pattern, looking
/// through the `<...>` wrapping of trait implementations.
pub fn function_starts_with(func_name: &str, pattern: &str) -> bool {
    let mut func_name = func_name;
    let mut pattern = pattern;
    if pattern.starts_with('<') {
        while let Some(rest) = pattern.strip_prefix('<') {
            pattern = rest;
            func_name = match func_name
                .strip_prefix('<')
                .or_else(|| func_name.strip_prefix("_<"))
            {
                Some(rest) => rest,
                None => return false,
            };
        }
    } else {
        func_name = func_name.trim_start_matches('<').trim_start_matches("_<");
    }
    func_name.starts_with(pattern)
}

fn is_well_known_not_in_app(func: &str) -> bool {
    WELL_KNOWN_NOT_IN_APP
        .iter()
        .any(|m| function_starts_with(func, m))
}

fn is_well_known_border_frame(func: &str) -> bool {
    WELL_KNOWN_BORDER_FRAMES
        .iter()
        .any(|m| function_starts_with(func, m))
}

/// Converts a `Backtrace` into a stacktrace, innermost frame last.
pub fn backtrace_to_stacktrace(bt: &Backtrace) -> Option<Stacktrace> {
    let frames = bt
        .frames()
        .iter()
        .flat_map(|frame| {
            // A single frame can have multiple symbols when functions got
            // inlined into it.
            let symbols = frame.symbols();
            symbols.iter().map(move |sym| {
                let abs_path = sym.filename().map(|m| m.to_string_lossy().to_string());
                let filename = abs_path.as_deref().map(|p| filename(p).to_owned());
                let real_symbol = sym
                    .name()
                    .map_or(Cow::Borrowed("<unknown>"), |n| Cow::Owned(n.to_string()));
                let function = sanitize_symbol(&real_symbol).to_owned();
                Frame {
                    symbol: if function != real_symbol {
                        Some(real_symbol.into_owned())
                    } else {
                        None
                    },
                    module: parse_crate_name(&function),
                    function: Some(function),
                    instruction_addr: Some(frame.ip().into()),
                    abs_path,
                    filename,
                    lineno: sym.lineno().map(u64::from),
                    colno: sym.colno().map(u64::from),
                    ..Default::default()
                }
            })
        })
        .collect();
    Stacktrace::from_frames_reversed(frames)
}

/// Cuts the frames that belong to the capture machinery off the end of a
/// stacktrace.
pub fn trim_stacktrace(stacktrace: &mut Stacktrace) {
    let known_cutoff = stacktrace
        .frames
        .iter()
        .rev()
        .position(|frame| {
            frame
                .function
                .as_deref()
                .is_some_and(is_well_known_border_frame)
        });

    if let Some(cutoff) = known_cutoff {
        let trunc = stacktrace.frames.len() - cutoff - 1;
        stacktrace.frames.truncate(trunc);
    }
}

/// Marks frames as in-app or not.
///
/// Frames that already carry a decision keep it.  The include list wins
/// over the exclude list, and well-known library modules are never in-app.
pub fn process_stacktrace(stacktrace: &mut Stacktrace, options: &ClientOptions) {
    for frame in &mut stacktrace.frames {
        if frame.in_app.is_some() {
            continue;
        }
        let func_name = match frame.function.as_deref() {
            Some(name) => name,
            None => continue,
        };

        if options
            .in_app_include
            .iter()
            .any(|m| function_starts_with(func_name, m))
        {
            frame.in_app = Some(true);
        } else if options
            .in_app_exclude
            .iter()
            .any(|m| function_starts_with(func_name, m))
            || is_well_known_not_in_app(func_name)
        {
            frame.in_app = Some(false);
        }
    }
}

/// Returns the stacktrace of the calling code, without the frames of the
/// capture machinery.
#[inline(never)]
pub fn current_stacktrace() -> Option<Stacktrace> {
    let bt = Backtrace::new();
    let mut stacktrace = backtrace_to_stacktrace(&bt)?;
    trim_stacktrace(&mut stacktrace);
    if stacktrace.frames.is_empty() {
        None
    } else {
        Some(stacktrace)
    }
}
