use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::options::Service;
use crate::path::RepoPath;

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
            Method::HEAD => http::Method::HEAD,
        }
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Sent as-is.
    Text(String),
    /// Sent as-is.
    Bytes(Vec<u8>),
    /// Sent as `application/x-www-form-urlencoded`, `&`-joined and percent-encoded.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Content type implied by the body, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::Text(_) | Body::Bytes(_) => None,
        }
    }

    /// Serialize to the bytes put on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Body::Text(text) => text.as_bytes().to_vec(),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Form(pairs) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
                .into_bytes(),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One logical request against the repository.
///
/// Built with [`Request::builder`] and never modified by the client: derived
/// values (URL, default method, async mode) are computed at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    /// Target service. `None` means the file service.
    pub service: Option<Service>,

    pub path: Option<RepoPath>,

    /// Operation suffix, e.g. `children`.
    pub action: Option<String>,

    pub method: Method,

    /// Query parameters, in the order they are appended.
    pub params: Vec<(String, String)>,

    /// Request headers, passed through verbatim.
    pub headers: Vec<(String, String)>,

    pub body: Option<Body>,

    /// Overrides the client's async default.
    pub asynchronous: Option<bool>,

    pub credentials: Option<Credentials>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name, false)
    }

    /// Header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name, true)
    }

    /// Turn this request back into a builder for a modified copy.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            request: self.clone(),
        }
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str, fold_case: bool) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(n, _)| {
            if fold_case {
                n.eq_ignore_ascii_case(name)
            } else {
                n == name
            }
        })
        .map(|(_, v)| v.as_str())
}

fn upsert(pairs: &mut Vec<(String, String)>, name: String, value: String, fold_case: bool) {
    let existing = pairs.iter_mut().find(|(n, _)| {
        if fold_case {
            n.eq_ignore_ascii_case(&name)
        } else {
            *n == name
        }
    });
    match existing {
        Some(pair) => pair.1 = value,
        None => pairs.push((name, value)),
    }
}

/// Builder for [`Request`].
///
/// Setting a parameter or header that is already present replaces its value in
/// place, keeping its original position.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn service(mut self, service: Service) -> Self {
        self.request.service = Some(service);
        self
    }

    pub fn path(mut self, path: impl Into<RepoPath>) -> Self {
        self.request.path = Some(path.into());
        self
    }

    pub fn no_path(mut self) -> Self {
        self.request.path = None;
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.request.action = Some(action.into());
        self
    }

    pub fn no_action(mut self) -> Self {
        self.request.action = None;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        upsert(&mut self.request.params, name.into(), value.to_string(), false);
        self
    }

    /// Set a parameter only when the caller has not set it already.
    pub fn default_param(self, name: &str, value: impl ToString) -> Self {
        if self.request.param(name).is_some() {
            self
        } else {
            self.param(name, value)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.request.headers, name.into(), value.into(), true);
        self
    }

    /// Set a header only when the caller has not set it already.
    pub fn default_header(self, name: &str, value: impl Into<String>) -> Self {
        if self.request.header(name).is_some() {
            self
        } else {
            self.header(name, value)
        }
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.request.body = Some(Body::Form(pairs));
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.request.asynchronous = Some(asynchronous);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.request.credentials = Some(credentials);
        self
    }

    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials(Credentials::new(username, password))
    }

    pub fn build(self) -> Request {
        self.request
    }
}

/// A completed HTTP exchange as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub method: Method,

    /// Absolute URL the request was sent to.
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body bytes as received.
    pub body: Vec<u8>,

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub body_text: String,
}

impl Exchange {
    pub fn new(
        method: Method,
        url: String,
        status: u16,
        status_text: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        let body_text = String::from_utf8_lossy(&body).into_owned();
        Self {
            method,
            url,
            status,
            status_text,
            headers,
            body,
            body_text,
        }
    }

    /// Response header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let request = Request::builder().build();
        assert_eq!(request.method, Method::GET);
        assert!(request.service.is_none());
        assert!(request.path.is_none());
        assert!(request.action.is_none());
        assert!(request.params.is_empty());
        assert!(request.asynchronous.is_none());
    }

    #[test]
    fn params_keep_insertion_order_and_replace_in_place() {
        let request = Request::builder()
            .param("b", "1")
            .param("a", 2)
            .param("b", "3")
            .build();
        assert_eq!(
            request.params,
            vec![("b".to_string(), "3".to_string()), ("a".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn default_param_and_header_yield_to_caller() {
        let request = Request::builder()
            .param("depth", 3)
            .header("accept", "text/plain")
            .default_param("depth", 1)
            .default_header("Accept", "application/json")
            .build();
        assert_eq!(request.param("depth"), Some("3"));
        assert_eq!(request.header("Accept"), Some("text/plain"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn to_builder_leaves_original_untouched() {
        let original = Request::builder().path("/home").action("children").build();
        let derived = original.to_builder().action("tree").build();
        assert_eq!(original.action.as_deref(), Some("children"));
        assert_eq!(derived.action.as_deref(), Some("tree"));
        assert_eq!(derived.path, original.path);
    }

    #[test]
    fn form_body_is_joined_and_encoded() {
        let body = Body::Form(vec![
            ("name".into(), "Q1 sales".into()),
            ("path".into(), "/home/a&b".into()),
        ]);
        assert_eq!(
            String::from_utf8(body.encode()).unwrap(),
            "name=Q1+sales&path=%2Fhome%2Fa%26b"
        );
        assert_eq!(body.content_type(), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn text_body_is_sent_as_is() {
        let body = Body::from("a=b c");
        assert_eq!(body.encode(), b"a=b c".to_vec());
        assert_eq!(body.content_type(), None);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials::new("admin", "password");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("\"password\""));
    }

    #[test]
    fn method_conversion() {
        let method: http::Method = Method::PUT.into();
        assert_eq!(method, http::Method::PUT);
        assert_eq!(Method::PUT.to_string(), "PUT");
    }

    #[test]
    fn exchange_header_lookup_ignores_case() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let exchange = Exchange::new(
            Method::GET,
            "http://localhost:8080/pentaho/api/repo/files".to_string(),
            204,
            "No Content".to_string(),
            headers,
            Vec::new(),
        );
        assert_eq!(exchange.content_type(), Some("application/json"));
        assert_eq!(exchange.header("CONTENT-TYPE"), Some("application/json"));
        assert!(exchange.header("Accept").is_none());
    }

    #[test]
    fn exchange_keeps_raw_body() {
        let body = vec![0x50, 0x4b, 0x03, 0x04, 0xff, 0xfe];
        let exchange = Exchange::new(
            Method::GET,
            "http://localhost:8080/pentaho/api/repo/files/:a.zip".to_string(),
            200,
            "OK".to_string(),
            HashMap::new(),
            body.clone(),
        );
        assert_eq!(exchange.body, body);
        assert!(exchange.body_text.starts_with("PK"));
        assert!(exchange.body_text.contains('\u{FFFD}'));
    }
}
