use url::Url;
use vigil::protocol::Map;

/// An error raised while reading a single field from a request.
///
/// A failing field is left out of the event, the other fields are still
/// extracted.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The host cannot provide this field.
    #[error("`{0}` is not supported by this request source")]
    Unsupported(&'static str),
    /// The field was present but could not be decoded.
    #[error("malformed {field}: {reason}")]
    Malformed {
        /// The field that failed to decode.
        field: &'static str,
        /// Why decoding failed.
        reason: String,
    },
    /// Any other failure of the host.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A file uploaded with a form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// The form field the file was uploaded under.
    pub field_name: String,
    /// The client supplied file name.
    pub file_name: Option<String>,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// A stable identifier of the user.
    pub id: Option<String>,
    /// The email address of the user.
    pub email: Option<String>,
    /// The login name of the user.
    pub username: Option<String>,
}

/// Resolves the user that is authenticated for a request.
pub trait PrincipalSource: Send + Sync {
    /// Returns the current principal, or `None` for anonymous requests.
    fn current_principal(&self) -> Option<Principal>;
}

impl<F> PrincipalSource for F
where
    F: Fn() -> Option<Principal> + Send + Sync,
{
    fn current_principal(&self) -> Option<Principal> {
        self()
    }
}

/// Read access to the request a framework is currently handling.
///
/// Only `url` and `method` are mandatory.  The defaults of the other
/// accessors describe a request without that piece of information.
pub trait RequestDataSource: Send + Sync {
    /// The absolute URL of the request.
    fn url(&self) -> Result<Url, ExtractError>;

    /// The HTTP method, e.g. `GET`.
    fn method(&self) -> Result<String, ExtractError>;

    /// The raw query string, without the leading `?`.
    ///
    /// Defaults to the query of [`url`](Self::url).
    fn query_string(&self) -> Result<Option<String>, ExtractError> {
        Ok(self.url()?.query().map(ToOwned::to_owned))
    }

    /// The request headers.
    fn headers(&self) -> Result<Map<String, String>, ExtractError> {
        Ok(Map::new())
    }

    /// The server environment, e.g. CGI style variables like `REMOTE_ADDR`.
    ///
    /// Only `REMOTE_ADDR`, `SERVER_NAME` and `SERVER_PORT` end up on events.
    fn env(&self) -> Result<Map<String, String>, ExtractError> {
        Ok(Map::new())
    }

    /// The cookies sent with the request.
    ///
    /// Defaults to parsing the `Cookie` header.
    fn cookies(&self) -> Result<Map<String, String>, ExtractError> {
        let headers = self.headers()?;
        let header = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
            .map(|(_, value)| value.as_str())
            .unwrap_or_default();
        Ok(parse_cookie_header(header))
    }

    /// The request body as received.
    fn raw_body(&self) -> Result<Option<Vec<u8>>, ExtractError> {
        Ok(None)
    }

    /// The declared length of the body, if known.
    ///
    /// Defaults to the length of [`raw_body`](Self::raw_body).
    fn content_length(&self) -> Result<Option<usize>, ExtractError> {
        Ok(self.raw_body()?.map(|body| body.len()))
    }

    /// The decoded form fields, `None` if this is not a form submission.
    fn form_fields(&self) -> Result<Option<Map<String, String>>, ExtractError> {
        Ok(None)
    }

    /// The files uploaded with a form submission.
    fn uploaded_files(&self) -> Result<Vec<FileRef>, ExtractError> {
        Ok(Vec::new())
    }

    /// The size of an uploaded file in bytes.
    fn file_size(&self, _file: &FileRef) -> Result<u64, ExtractError> {
        Err(ExtractError::Unsupported("file_size"))
    }

    /// The name of the route that matched the request.
    fn route_name(&self) -> Result<Option<String>, ExtractError> {
        Ok(None)
    }

    /// Resolves the authenticated user, if the host knows about users.
    fn principal_source(&self) -> Option<&dyn PrincipalSource> {
        None
    }
}

fn parse_cookie_header(header: &str) -> Map<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_owned(), value.trim().to_owned()))
        })
        .collect()
}
