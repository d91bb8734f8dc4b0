//! Response classification.
//!
//! A finished exchange ends up in exactly one [`Outcome`]. Status 200 responses
//! are decoded according to their `Content-Type`; every other status, and any
//! transport error, is a [`Failure`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::executor::TransportError;
use crate::types::Exchange;

/// How a 200 response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    /// `application/javascript` and `text/javascript`. Delivered as text; the
    /// client never evaluates response bodies as code.
    Script,
    Xml,
    Text,
}

/// Classify a `Content-Type` header value.
///
/// Parameters such as `;charset=utf-8` are stripped before matching, and the
/// match ignores case. A missing header is plain text.
pub fn content_kind(content_type: Option<&str>) -> ContentKind {
    let Some(value) = content_type else {
        return ContentKind::Text;
    };
    let base = value.split(';').next().unwrap_or_default().trim();
    match base.to_ascii_lowercase().as_str() {
        "application/json" => ContentKind::Json,
        "application/javascript" | "text/javascript" => ContentKind::Script,
        "application/xml" | "text/xml" => ContentKind::Xml,
        _ => ContentKind::Text,
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Xml(XmlElement),
    Text(String),
    /// A text-typed body that is not valid UTF-8, kept byte for byte.
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlElement> {
        match self {
            Payload::Xml(root) => Some(root),
            _ => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, crate::Error> {
        match self {
            Payload::Json(value) => Ok(T::deserialize(value)?),
            other => Err(crate::Error::UnexpectedPayload {
                message: format!("expected JSON, got {}", other.kind()),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Payload::Json(_) => "JSON",
            Payload::Xml(_) => "XML",
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "binary",
        }
    }
}

/// An owned XML element tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct XmlElement {
    /// Local name, without namespace prefix.
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    /// Parse a document and return its root element.
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let document = roxmltree::Document::parse(text)?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    Some(XmlNode::Element(Self::from_node(child)))
                } else if child.is_text() {
                    child
                        .text()
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| XmlNode::Text(t.to_string()))
                } else {
                    None
                }
            })
            .collect();
        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            children,
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

/// A 200 response whose body does not match its declared content type.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML body: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Decode the body of a 200 response.
///
/// Text bodies that are not valid UTF-8 come back as [`Payload::Bytes`].
pub fn decode(exchange: &Exchange) -> Result<Payload, DecodeError> {
    match content_kind(exchange.content_type()) {
        ContentKind::Json => Ok(Payload::Json(serde_json::from_slice(&exchange.body)?)),
        ContentKind::Xml => Ok(Payload::Xml(XmlElement::parse(&exchange.body_text)?)),
        ContentKind::Script => {
            log::debug!("Treating script response from {} as text", exchange.url);
            Ok(Payload::Text(exchange.body_text.clone()))
        }
        ContentKind::Text => match String::from_utf8(exchange.body.clone()) {
            Ok(text) => Ok(Payload::Text(text)),
            Err(error) => Ok(Payload::Bytes(error.into_bytes())),
        },
    }
}

/// A non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpFailure {
    pub status: u16,
    pub status_text: String,
    /// Raw response body.
    pub body: String,
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {} {}", self.status, self.status_text)
    }
}

/// Everything that is delivered on the failure channel.
#[derive(thiserror::Error, Debug)]
pub enum Failure {
    #[error("{0}")]
    Http(HttpFailure),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Failure {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Http(failure) => Some(failure.status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// The single terminal result of a request.
#[derive(Debug)]
pub enum Outcome {
    Success {
        exchange: Exchange,
        payload: Payload,
    },
    Failure {
        /// Absent when the transport never produced a response.
        exchange: Option<Exchange>,
        failure: Failure,
    },
    Aborted {
        /// Whether an exchange had been started when the cancel landed.
        in_flight: bool,
    },
}

impl Outcome {
    /// Classify what the transport returned.
    pub fn from_transport(result: Result<Exchange, TransportError>) -> Self {
        let exchange = match result {
            Ok(exchange) => exchange,
            Err(TransportError::Cancelled) => return Outcome::Aborted { in_flight: true },
            Err(error) => {
                return Outcome::Failure {
                    exchange: None,
                    failure: Failure::Transport(error),
                }
            }
        };

        if exchange.status != 200 {
            let failure = Failure::Http(HttpFailure {
                status: exchange.status,
                status_text: exchange.status_text.clone(),
                body: exchange.body_text.clone(),
            });
            return Outcome::Failure {
                exchange: Some(exchange),
                failure,
            };
        }

        match decode(&exchange) {
            Ok(payload) => Outcome::Success { exchange, payload },
            Err(error) => Outcome::Failure {
                exchange: Some(exchange),
                failure: Failure::Decode(error),
            },
        }
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        match self {
            Outcome::Success { exchange, .. } => Some(exchange),
            Outcome::Failure { exchange, .. } => exchange.as_ref(),
            Outcome::Aborted { .. } => None,
        }
    }

    /// Collapse into a `Result`, keeping only the payload.
    pub fn into_result(self) -> Result<Payload, crate::Error> {
        match self {
            Outcome::Success { payload, .. } => Ok(payload),
            Outcome::Failure { failure, .. } => Err(crate::Error::Failure(failure)),
            Outcome::Aborted { .. } => Err(crate::Error::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::Method;

    fn exchange(status: u16, content_type: Option<&str>, body: &str) -> Exchange {
        raw_exchange(status, content_type, body.as_bytes().to_vec())
    }

    fn raw_exchange(status: u16, content_type: Option<&str>, body: Vec<u8>) -> Exchange {
        let mut headers = HashMap::new();
        if let Some(content_type) = content_type {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        Exchange::new(
            Method::GET,
            "http://localhost:8080/pentaho/api/repo/files/:home/children".to_string(),
            status,
            match status {
                200 => "OK",
                204 => "No Content",
                _ => "Not Found",
            }
            .to_string(),
            headers,
            body,
        )
    }

    #[test]
    fn content_kind_strips_charset() {
        assert_eq!(
            content_kind(Some("application/json;charset=utf-8")),
            ContentKind::Json
        );
        assert_eq!(
            content_kind(Some("application/json; charset=UTF-8")),
            ContentKind::Json
        );
        assert_eq!(content_kind(Some("Text/XML")), ContentKind::Xml);
        assert_eq!(content_kind(Some("application/xml")), ContentKind::Xml);
        assert_eq!(content_kind(Some("text/javascript")), ContentKind::Script);
        assert_eq!(content_kind(Some("application/javascript")), ContentKind::Script);
        assert_eq!(content_kind(Some("text/html")), ContentKind::Text);
        assert_eq!(content_kind(None), ContentKind::Text);
    }

    #[test]
    fn json_with_charset_succeeds() {
        let outcome = Outcome::from_transport(Ok(exchange(
            200,
            Some("application/json;charset=utf-8"),
            r#"{"x":1}"#,
        )));
        match outcome {
            Outcome::Success { payload, .. } => {
                assert_eq!(payload, Payload::Json(serde_json::json!({"x": 1})));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn not_found_is_http_failure_with_body() {
        let outcome = Outcome::from_transport(Ok(exchange(
            404,
            Some("text/html"),
            "<html>missing</html>",
        )));
        match outcome {
            Outcome::Failure {
                exchange: Some(exchange),
                failure: Failure::Http(failure),
            } => {
                assert_eq!(failure.status, 404);
                assert_eq!(failure.status_text, "Not Found");
                assert_eq!(failure.body, "<html>missing</html>");
                assert_eq!(exchange.status, 404);
            }
            other => panic!("expected HTTP failure, got {:?}", other),
        }
    }

    #[test]
    fn non_200_success_codes_still_fail() {
        let outcome = Outcome::from_transport(Ok(exchange(204, None, "")));
        assert_eq!(
            outcome.into_result().unwrap_err().to_string(),
            "HTTP 204 No Content"
        );
    }

    #[test]
    fn malformed_json_is_decode_failure() {
        let outcome =
            Outcome::from_transport(Ok(exchange(200, Some("application/json"), "{not json")));
        assert!(matches!(
            outcome,
            Outcome::Failure {
                failure: Failure::Decode(DecodeError::Json(_)),
                ..
            }
        ));
    }

    #[test]
    fn malformed_xml_is_decode_failure() {
        let outcome = Outcome::from_transport(Ok(exchange(200, Some("text/xml"), "<a><b></a>")));
        assert!(matches!(
            outcome,
            Outcome::Failure {
                failure: Failure::Decode(DecodeError::Xml(_)),
                ..
            }
        ));
    }

    #[test]
    fn xml_is_parsed_into_tree() {
        let body = r#"<?xml version="1.0"?>
            <repositoryFileDto>
                <id>abc</id>
                <name kind="file">sales.prpt</name>
            </repositoryFileDto>"#;
        let payload = decode(&exchange(200, Some("application/xml"), body)).unwrap();
        let root = payload.as_xml().unwrap();
        assert_eq!(root.name, "repositoryFileDto");
        assert_eq!(root.child("id").unwrap().text(), "abc");
        let name = root.child("name").unwrap();
        assert_eq!(name.text(), "sales.prpt");
        assert_eq!(name.attributes.get("kind").map(String::as_str), Some("file"));
        assert_eq!(root.elements().count(), 2);
    }

    #[test]
    fn script_is_delivered_as_text() {
        let payload = decode(&exchange(200, Some("text/javascript"), "alert(1)")).unwrap();
        assert_eq!(payload, Payload::Text("alert(1)".to_string()));
    }

    #[test]
    fn unknown_type_is_raw_text() {
        let payload = decode(&exchange(200, None, "plain")).unwrap();
        assert_eq!(payload.as_text(), Some("plain"));
    }

    #[test]
    fn binary_body_keeps_its_bytes() {
        let body = vec![0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];
        let payload = decode(&raw_exchange(200, Some("application/octet-stream"), body.clone()))
            .unwrap();
        assert_eq!(payload, Payload::Bytes(body.clone()));
        assert_eq!(payload.as_bytes(), Some(body.as_slice()));
        assert!(payload.as_text().is_none());
    }

    #[test]
    fn cancelled_transport_is_in_flight_abort() {
        let outcome = Outcome::from_transport(Err(TransportError::Cancelled));
        assert!(matches!(outcome, Outcome::Aborted { in_flight: true }));
        assert!(outcome.exchange().is_none());
        assert!(matches!(outcome.into_result(), Err(crate::Error::Aborted)));
    }

    #[test]
    fn transport_error_has_no_exchange() {
        let outcome = Outcome::from_transport(Err(TransportError::Timeout {
            message: "operation timed out".to_string(),
        }));
        assert!(outcome.exchange().is_none());
        assert!(matches!(
            outcome,
            Outcome::Failure {
                failure: Failure::Transport(TransportError::Timeout { .. }),
                ..
            }
        ));
    }

    #[test]
    fn payload_json_deserializes() {
        #[derive(serde::Deserialize)]
        struct Dir {
            path: String,
        }
        let payload = Payload::Json(serde_json::json!({"path": "/home/admin"}));
        let dir: Dir = payload.json().unwrap();
        assert_eq!(dir.path, "/home/admin");

        let text = Payload::Text("/home/admin".to_string());
        assert!(text.json::<Dir>().is_err());
    }
}
