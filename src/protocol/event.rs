//! The structured event model.
//!
//! Everything a captured occurrence carries lives in these types.  They
//! derive `serde` traits so transports can pick any wire format, but no
//! particular format is implied by the model itself.

use std::fmt;
use std::str;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::level::Level;
use super::utils::ts_seconds_float;

pub use serde_json::Value;

/// An arbitrary (JSON) value map.
pub type Map<K, V> = std::collections::BTreeMap<K, V>;

/// The fingerprint an event carries unless something overrides it.
pub const DEFAULT_FINGERPRINT: &str = "{{ default }}";

fn default_fingerprint() -> Vec<String> {
    vec![DEFAULT_FINGERPRINT.to_owned()]
}

fn is_default_fingerprint(fp: &[String]) -> bool {
    fp.len() == 1 && (fp[0] == "{{ default }}" || fp[0] == "{{default}}")
}

fn default_platform() -> String {
    "other".to_owned()
}

/// Represents a log entry message.
///
/// A log message is similar to the `message` attribute on the event itself
/// but can additionally hold optional parameters.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LogEntry {
    /// The log message with parameters replaced by `%s`
    pub message: String,
    /// Positional parameters to be inserted into the log entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

/// An instruction address.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(pub u64);

impl Addr {
    /// Returns `true` if this address is the null pointer.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Addr {
    fn from(addr: u64) -> Addr {
        Addr(addr)
    }
}

impl<T> From<*const T> for Addr {
    fn from(addr: *const T) -> Addr {
        Addr(addr as usize as u64)
    }
}

impl<T> From<*mut T> for Addr {
    fn from(addr: *mut T) -> Addr {
        Addr(addr as usize as u64)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl str::FromStr for Addr {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Addr, Self::Err> {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16).map(Addr)
        } else {
            s.parse().map(Addr)
        }
    }
}

impl Serialize for Addr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Addr, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Holds information about a single stacktrace frame.
///
/// Each object should contain **at least** a `filename`, `function` or
/// `instruction_addr` attribute.  All values are optional, but recommended.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Frame {
    /// The name of the function is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The potentially mangled name of the symbol as it appears in an executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// The name of the module the frame is contained in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// The name of the package that contains the frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// The filename (basename only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// The absolute path to the source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    /// The line number if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u64>,
    /// The column number if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u64>,
    /// In-app indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,
    /// Snapshot of local variables, filled by adapters that can provide them.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub vars: Map<String, Value>,
    /// The instruction address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<Addr>,
}

/// Represents a stacktrace.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Stacktrace {
    /// The list of frames in the stacktrace, innermost frame last.
    #[serde(default)]
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    /// Optionally creates a stacktrace from a list of stack frames.
    ///
    /// The frames are expected innermost first (the order a backtrace
    /// walker produces them) and get reversed.
    pub fn from_frames_reversed(mut frames: Vec<Frame>) -> Option<Stacktrace> {
        if frames.is_empty() {
            None
        } else {
            frames.reverse();
            Some(Stacktrace { frames })
        }
    }
}

/// The mechanism by which an exception was generated and handled.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Mechanism {
    /// The mechanism type identifier.
    #[serde(rename = "type")]
    pub ty: String,
    /// Human readable detail description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Indicates if the exception was handled by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
    /// Arbitrary extra data.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// Represents a single exception.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Exception {
    /// The type of the exception.
    #[serde(rename = "type")]
    pub ty: String,
    /// The optional value of the exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// An optional module for this exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Optionally the stacktrace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    /// The mechanism of the exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
}

/// Represents a single breadcrumb.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Breadcrumb {
    /// The timestamp of the breadcrumb.  This is required.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The type of the breadcrumb.
    #[serde(rename = "type")]
    pub ty: String,
    /// The optional category of the breadcrumb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The non optional level of the breadcrumb.  It
    /// defaults to info.
    #[serde(skip_serializing_if = "Level::is_info")]
    pub level: Level,
    /// An optional human readable message for the breadcrumb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Arbitrary breadcrumb data that should be send along.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Default for Breadcrumb {
    fn default() -> Breadcrumb {
        Breadcrumb {
            timestamp: SystemTime::now(),
            ty: "default".into(),
            category: Default::default(),
            level: Default::default(),
            message: Default::default(),
            data: Default::default(),
        }
    }
}

/// Represents user info.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct User {
    /// The ID of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The email address of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The remote ip address of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// A human readable username of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Additional arbitrary fields for forwards compatibility.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Represents http request data.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Request {
    /// The current URL of the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// The HTTP request method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Optionally some associated request data (form fields or body).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Optionally the encoded query string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,
    /// The cookies of the request.  `Some` with an empty map means the
    /// request carried no cookies, `None` means they are unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Map<String, String>>,
    /// HTTP request headers.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, String>,
    /// Optionally a CGI/WSGI etc. environment dictionary.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub env: Map<String, String>,
}

/// Represents a full event.
///
/// An event is created empty when something is captured, gets enriched in
/// place by the event processors and the active scope, and is handed to
/// the transport exactly once.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Event {
    /// The ID of the event
    #[serde(serialize_with = "serialize_event_id")]
    pub event_id: Uuid,
    /// The level of the event (defaults to error)
    pub level: Level,
    /// An optional fingerprint configuration to override the default.
    #[serde(skip_serializing_if = "is_default_fingerprint")]
    pub fingerprint: Vec<String>,
    /// The culprit of the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// A message to be sent with the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Optionally a log entry that can be used instead of the message for
    /// more complex cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logentry: Option<LogEntry>,
    /// Optionally the name of the logger that created this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// The platform identifier of this event.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub platform: String,
    /// The timestamp of when the event was created.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// Optionally the server (or device) name of this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// A release identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// An optional environment identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Optionally user data to be sent along.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Optionally HTTP request data to be sent along.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    /// List of breadcrumbs to send along.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Exceptions to be attached (one or multiple if chained), outermost last.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exception: Vec<Exception>,
    /// A map of tags for this event.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, String>,
    /// A map of extra data.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

fn serialize_event_id<S: serde::Serializer>(uuid: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&uuid.as_simple())
}

impl Default for Event {
    fn default() -> Event {
        Event {
            event_id: Uuid::new_v4(),
            level: Level::Error,
            fingerprint: default_fingerprint(),
            transaction: None,
            message: None,
            logentry: None,
            logger: None,
            platform: default_platform(),
            timestamp: SystemTime::now(),
            server_name: None,
            release: None,
            environment: None,
            user: None,
            request: None,
            breadcrumbs: Vec::new(),
            exception: Vec::new(),
            tags: Map::new(),
            extra: Map::new(),
        }
    }
}

impl Event {
    /// Creates a new event with the current timestamp and random id.
    pub fn new() -> Event {
        Default::default()
    }

    /// Returns `true` if the fingerprint was not overridden.
    pub fn has_default_fingerprint(&self) -> bool {
        is_default_fingerprint(&self.fingerprint)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(id: {}, level: {})", self.event_id, self.level)
    }
}
