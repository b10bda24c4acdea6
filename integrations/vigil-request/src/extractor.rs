use serde_json::Value;
use vigil::protocol::{Request, User};
use vigil::InternalError;

use crate::source::{ExtractError, RequestDataSource};

/// The server environment variables that are attached to events.
const ENV_KEYS: &[&str] = &["REMOTE_ADDR", "SERVER_NAME", "SERVER_PORT"];

/// How much of a request body ends up on events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MaxRequestBodySize {
    /// Never attach a body.
    None,
    /// Attach bodies up to 1000 bytes.
    Small,
    /// Attach bodies up to 10000 bytes.
    #[default]
    Medium,
    /// Always attach the body.
    Always,
}

impl MaxRequestBodySize {
    /// Checks whether a body of `size` bytes may be attached.
    pub fn is_within_size_limit(self, size: usize) -> bool {
        match self {
            MaxRequestBodySize::None => false,
            MaxRequestBodySize::Small => size <= 1_000,
            MaxRequestBodySize::Medium => size <= 10_000,
            MaxRequestBodySize::Always => true,
        }
    }
}

/// Reads a [`RequestDataSource`] into protocol types.
///
/// Fields that fail to extract are left out.  The failures are collected
/// and can be reported through [`Client::report_internal_error`] once
/// extraction is done.
///
/// [`Client::report_internal_error`]: vigil::Client::report_internal_error
pub struct RequestExtractor<'a> {
    source: &'a dyn RequestDataSource,
    max_request_body_size: MaxRequestBodySize,
    errors: Vec<InternalError>,
}

impl<'a> RequestExtractor<'a> {
    /// Creates an extractor for a request.
    pub fn new(source: &'a dyn RequestDataSource, max_request_body_size: MaxRequestBodySize) -> Self {
        RequestExtractor {
            source,
            max_request_body_size,
            errors: Vec::new(),
        }
    }

    fn field<T>(&mut self, field: &'static str, result: Result<T, ExtractError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(InternalError::Extraction {
                    field,
                    error: err.into(),
                });
                None
            }
        }
    }

    /// Builds the request interface.
    pub fn extract_request(&mut self) -> Request {
        let source = self.source;
        let url = self.field("url", source.url());
        let method = self.field("method", source.method());
        let query_string = self.field("query_string", source.query_string()).flatten();
        let headers = self.field("headers", source.headers()).unwrap_or_default();
        let env = self
            .field("env", source.env())
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
            .collect();
        let cookies = self.field("cookies", source.cookies());
        let data = self.extract_body();

        Request {
            url,
            method,
            data,
            query_string,
            cookies,
            headers,
            env,
        }
    }

    /// Resolves the user from the principal of the request.
    ///
    /// With `send_default_pii` the client address becomes `ip_address`: the
    /// first `X-Forwarded-For` entry if the header is present, else the
    /// remote address.  Without a principal or an address there is no user.
    pub fn extract_user(&mut self, request: &Request, send_default_pii: bool) -> Option<User> {
        let principal = self
            .source
            .principal_source()
            .and_then(|principals| principals.current_principal());
        let ip_address = if send_default_pii {
            client_ip(request)
        } else {
            None
        };
        if principal.is_none() && ip_address.is_none() {
            return None;
        }

        let principal = principal.unwrap_or_default();
        Some(User {
            id: principal.id,
            email: principal.email,
            username: principal.username,
            ip_address,
            ..Default::default()
        })
    }

    /// Consumes the extractor, returning the failures it ran into.
    pub fn into_errors(self) -> Vec<InternalError> {
        self.errors
    }

    fn extract_body(&mut self) -> Option<Value> {
        let limit = self.max_request_body_size;
        if limit == MaxRequestBodySize::None {
            return None;
        }
        let source = self.source;
        if let Some(length) = self.field("content_length", source.content_length()).flatten() {
            if !limit.is_within_size_limit(length) {
                return None;
            }
        }

        let form = self.field("form_fields", source.form_fields()).flatten();
        if let Some(form) = form {
            let mut data: serde_json::Map<String, Value> = form
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            let files = self.field("uploaded_files", source.uploaded_files());
            for file in files.unwrap_or_default() {
                let mut entry = serde_json::Map::new();
                if let Some(ref file_name) = file.file_name {
                    entry.insert("filename".into(), file_name.clone().into());
                }
                if let Some(size) = self.field("file_size", source.file_size(&file)) {
                    entry.insert("size".into(), size.into());
                }
                data.insert(file.field_name, Value::Object(entry));
            }
            return Some(Value::Object(data));
        }

        let body = self.field("raw_body", source.raw_body()).flatten()?;
        if body.is_empty() || !limit.is_within_size_limit(body.len()) {
            return None;
        }
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(_) => String::from_utf8(body).ok().map(Value::String),
        }
    }
}

fn client_ip(request: &Request) -> Option<String> {
    let forwarded = request
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("x-forwarded-for"))
        .and_then(|(_, value)| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    match forwarded {
        Some(ip) => Some(ip.to_owned()),
        None => request.env.get("REMOTE_ADDR").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FileRef, Principal, PrincipalSource};
    use url::Url;
    use vigil::protocol::Map;

    #[derive(Default)]
    struct FakeRequest {
        body: Option<Vec<u8>>,
        form: Option<Map<String, String>>,
        files: Vec<FileRef>,
        headers: Map<String, String>,
        env: Map<String, String>,
        broken_headers: bool,
        principal: Option<Box<dyn PrincipalSource>>,
    }

    impl RequestDataSource for FakeRequest {
        fn url(&self) -> Result<Url, ExtractError> {
            Ok("https://example.com/upload".parse().unwrap())
        }

        fn method(&self) -> Result<String, ExtractError> {
            Ok("POST".into())
        }

        fn headers(&self) -> Result<Map<String, String>, ExtractError> {
            if self.broken_headers {
                return Err(ExtractError::Malformed {
                    field: "headers",
                    reason: "invalid utf-8".into(),
                });
            }
            Ok(self.headers.clone())
        }

        fn env(&self) -> Result<Map<String, String>, ExtractError> {
            Ok(self.env.clone())
        }

        fn raw_body(&self) -> Result<Option<Vec<u8>>, ExtractError> {
            Ok(self.body.clone())
        }

        fn form_fields(&self) -> Result<Option<Map<String, String>>, ExtractError> {
            Ok(self.form.clone())
        }

        fn uploaded_files(&self) -> Result<Vec<FileRef>, ExtractError> {
            Ok(self.files.clone())
        }

        fn file_size(&self, file: &FileRef) -> Result<u64, ExtractError> {
            match file.field_name.as_str() {
                "avatar" => Ok(2048),
                _ => Err(ExtractError::Unsupported("file_size")),
            }
        }

        fn principal_source(&self) -> Option<&dyn PrincipalSource> {
            self.principal.as_deref()
        }
    }

    fn extract(source: &FakeRequest, limit: MaxRequestBodySize) -> (Request, Vec<InternalError>) {
        let mut extractor = RequestExtractor::new(source, limit);
        let request = extractor.extract_request();
        (request, extractor.into_errors())
    }

    #[test]
    fn test_size_limits() {
        assert!(!MaxRequestBodySize::None.is_within_size_limit(0));
        assert!(MaxRequestBodySize::Small.is_within_size_limit(1_000));
        assert!(!MaxRequestBodySize::Small.is_within_size_limit(1_001));
        assert!(MaxRequestBodySize::Medium.is_within_size_limit(10_000));
        assert!(MaxRequestBodySize::Always.is_within_size_limit(usize::MAX));
        assert_eq!(MaxRequestBodySize::default(), MaxRequestBodySize::Medium);
    }

    #[test]
    fn test_json_and_text_bodies() {
        let source = FakeRequest {
            body: Some(br#"{"amount": 42}"#.to_vec()),
            ..Default::default()
        };
        let (request, _) = extract(&source, MaxRequestBodySize::Medium);
        assert_eq!(request.data, Some(serde_json::json!({"amount": 42})));

        let source = FakeRequest {
            body: Some(b"plain words".to_vec()),
            ..Default::default()
        };
        let (request, _) = extract(&source, MaxRequestBodySize::Medium);
        assert_eq!(request.data, Some(Value::String("plain words".into())));

        let (request, _) = extract(&source, MaxRequestBodySize::None);
        assert_eq!(request.data, None);
    }

    #[test]
    fn test_large_body_is_omitted() {
        let source = FakeRequest {
            body: Some(vec![b'a'; 1_500]),
            ..Default::default()
        };
        let (request, errors) = extract(&source, MaxRequestBodySize::Small);
        assert_eq!(request.data, None);
        assert!(errors.is_empty());

        let (request, _) = extract(&source, MaxRequestBodySize::Medium);
        assert!(request.data.is_some());
    }

    #[test]
    fn test_form_with_files() {
        let mut form = Map::new();
        form.insert("name".into(), "Jane".into());
        let source = FakeRequest {
            form: Some(form),
            files: vec![
                FileRef {
                    field_name: "avatar".into(),
                    file_name: Some("me.png".into()),
                },
                FileRef {
                    field_name: "resume".into(),
                    file_name: None,
                },
            ],
            ..Default::default()
        };
        let (request, errors) = extract(&source, MaxRequestBodySize::Medium);
        assert_eq!(
            request.data,
            Some(serde_json::json!({
                "name": "Jane",
                "avatar": {"filename": "me.png", "size": 2048},
                "resume": {},
            }))
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            InternalError::Extraction {
                field: "file_size",
                ..
            }
        ));
    }

    #[test]
    fn test_failing_field_is_omitted() {
        let source = FakeRequest {
            broken_headers: true,
            ..Default::default()
        };
        let (request, errors) = extract(&source, MaxRequestBodySize::Medium);
        assert!(request.headers.is_empty());
        assert_eq!(request.method.as_deref(), Some("POST"));
        // cookies are parsed from the headers by default
        assert_eq!(request.cookies, None);
        let fields: Vec<_> = errors
            .iter()
            .map(|err| match err {
                InternalError::Extraction { field, .. } => *field,
                _ => "other",
            })
            .collect();
        assert_eq!(fields, ["headers", "cookies"]);
    }

    #[test]
    fn test_user_from_principal() {
        let mut env = Map::new();
        env.insert("REMOTE_ADDR".into(), "10.0.0.7".into());
        let source = FakeRequest {
            env,
            principal: Some(Box::new(|| {
                Some(Principal {
                    id: Some("42".into()),
                    email: Some("jane@example.com".into()),
                    username: None,
                })
            })),
            ..Default::default()
        };

        let mut extractor = RequestExtractor::new(&source, MaxRequestBodySize::Medium);
        let request = extractor.extract_request();
        let user = extractor.extract_user(&request, false).unwrap();
        assert_eq!(user.id.as_deref(), Some("42"));
        assert_eq!(user.email.as_deref(), Some("jane@example.com"));
        assert_eq!(user.ip_address, None);

        let user = extractor.extract_user(&request, true).unwrap();
        assert_eq!(user.ip_address.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_anonymous_request_has_no_user() {
        let source = FakeRequest::default();
        let mut extractor = RequestExtractor::new(&source, MaxRequestBodySize::Medium);
        let request = extractor.extract_request();
        assert_eq!(extractor.extract_user(&request, false), None);
        assert_eq!(extractor.extract_user(&request, true), None);
    }

    #[test]
    fn test_only_server_env_is_kept() {
        let mut env = Map::new();
        env.insert("REMOTE_ADDR".into(), "10.0.0.7".into());
        env.insert("SERVER_NAME".into(), "shop.internal".into());
        env.insert("SERVER_PORT".into(), "8080".into());
        env.insert("DATABASE_PASSWORD".into(), "hunter2".into());
        env.insert("HTTP_AUTHORIZATION".into(), "Bearer abc".into());
        let source = FakeRequest {
            env,
            ..Default::default()
        };

        let (request, errors) = extract(&source, MaxRequestBodySize::Medium);
        assert!(errors.is_empty());
        let keys: Vec<_> = request.env.keys().map(String::as_str).collect();
        assert_eq!(keys, ["REMOTE_ADDR", "SERVER_NAME", "SERVER_PORT"]);
    }

    #[test]
    fn test_forwarded_for_is_preferred() {
        let mut env = Map::new();
        env.insert("REMOTE_ADDR".into(), "10.0.0.1".into());
        let mut headers = Map::new();
        headers.insert("X-Forwarded-For".into(), " 203.0.113.9 , 10.0.0.1".into());
        let source = FakeRequest {
            env,
            headers,
            ..Default::default()
        };

        let mut extractor = RequestExtractor::new(&source, MaxRequestBodySize::Medium);
        let request = extractor.extract_request();
        let user = extractor.extract_user(&request, true).unwrap();
        assert_eq!(user.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(extractor.extract_user(&request, false), None);
    }
}
