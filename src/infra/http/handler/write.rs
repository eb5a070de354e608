//! Response body accumulation with JSON / JSONP encoding.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=UTF-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

static CALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("callback pattern must compile")
});

/// One piece of output passed to `write`.
#[derive(Debug, Clone)]
pub enum Chunk {
    /// Serialized as JSON, or JSONP when a callback is requested.
    Mapping(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<Value> for Chunk {
    fn from(value: Value) -> Self {
        Self::Mapping(value)
    }
}

impl From<String> for Chunk {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Chunk {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Whether `name` may be echoed back as a JSONP function name.
pub fn is_valid_callback(name: &str) -> bool {
    CALLBACK.is_match(name)
}

/// JSON text that is also safe to embed inside a `<script>` element.
pub fn encode_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

pub(crate) struct ResponseBuffer {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl ResponseBuffer {
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn write(&mut self, chunk: Chunk, callback: Option<&str>) {
        match chunk {
            Chunk::Mapping(value) => {
                let json = encode_json(&value);
                match callback {
                    Some(callback) => {
                        self.set_content_type(JAVASCRIPT_CONTENT_TYPE);
                        self.body
                            .extend_from_slice(format!("{callback}({json})").as_bytes());
                    }
                    None => {
                        self.set_content_type(JSON_CONTENT_TYPE);
                        self.body.extend_from_slice(json.as_bytes());
                    }
                }
            }
            Chunk::Text(text) => {
                self.default_content_type();
                self.body.extend_from_slice(text.as_bytes());
            }
            Chunk::Bytes(bytes) => {
                self.default_content_type();
                self.body.extend_from_slice(&bytes);
            }
        }
    }

    pub(crate) fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }

    fn set_content_type(&mut self, value: &'static str) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(value));
    }

    fn default_content_type(&mut self) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.set_content_type(HTML_CONTENT_TYPE);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content_type(buffer: &ResponseBuffer) -> Option<&str> {
        buffer
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    #[test]
    fn mapping_without_callback_is_json() {
        let mut buffer = ResponseBuffer::default();
        buffer.write(json!({"a": 1}).into(), None);
        assert_eq!(content_type(&buffer), Some(JSON_CONTENT_TYPE));
        assert_eq!(buffer.body, br#"{"a":1}"#);
    }

    #[test]
    fn mapping_with_callback_is_jsonp() {
        let mut buffer = ResponseBuffer::default();
        buffer.write(json!({"a": 1}).into(), Some("foo"));
        assert_eq!(content_type(&buffer), Some(JAVASCRIPT_CONTENT_TYPE));
        assert_eq!(buffer.body, br#"foo({"a":1})"#);
    }

    #[test]
    fn text_defaults_to_html_without_overriding() {
        let mut buffer = ResponseBuffer::default();
        buffer.write("<p>a</p>".into(), None);
        assert_eq!(content_type(&buffer), Some(HTML_CONTENT_TYPE));

        let mut buffer = ResponseBuffer::default();
        buffer.write(json!({}).into(), None);
        buffer.write(Chunk::Bytes(b" ".to_vec()), None);
        assert_eq!(content_type(&buffer), Some(JSON_CONTENT_TYPE));
        assert_eq!(buffer.body, b"{} ");
    }

    #[test]
    fn script_close_tags_are_escaped() {
        assert_eq!(
            encode_json(&json!({"html": "<p>x</p>"})),
            r#"{"html":"<p>x<\/p>"}"#
        );
    }

    #[test]
    fn callback_names() {
        assert!(is_valid_callback("foo"));
        assert!(is_valid_callback("jQuery_123.done"));
        assert!(is_valid_callback("$cb"));
        assert!(!is_valid_callback("alert(1)//"));
        assert!(!is_valid_callback("1abc"));
        assert!(!is_valid_callback("a..b"));
        assert!(!is_valid_callback(""));
    }
}
