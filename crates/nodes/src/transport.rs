//! HTTP transport seam.
//!
//! The node never talks to the network directly: it hands a [`FormRequest`]
//! to whatever [`HttpTransport`] the host injected. [`ReqwestTransport`] is
//! the production implementation; tests use
//! [`MockTransport`](crate::mock::MockTransport).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, Span};

use crate::TransportError;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Query parameters and headers whose values must never be logged.
const SECRET_NAMES: [&str; 2] = ["access_token", "authorization"];

/// A form-encoded POST request.
#[derive(Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl FormRequest {
    /// Value of the first query parameter named `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first form field named `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        lookup(&self.form, name)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

struct Redacted<'a>(&'a [(String, String)]);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (k, v) in self.0 {
            if SECRET_NAMES.iter().any(|s| k.eq_ignore_ascii_case(s)) {
                list.entry(&(k, "<redacted>"));
            } else {
                list.entry(&(k, v));
            }
        }
        list.finish()
    }
}

impl fmt::Debug for FormRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRequest")
            .field("url", &self.url)
            .field("query", &Redacted(&self.query))
            .field("headers", &Redacted(&self.headers))
            .field("form", &self.form)
            .finish()
    }
}

/// Host-provided HTTP client.
///
/// Implementations return the decoded JSON body. A body carrying the API's
/// `error` envelope is a successful transport call even on a non-2xx status;
/// interpreting it is the node's job.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_form(&self, request: FormRequest) -> Result<Value, TransportError>;
}

/// Tuning knobs for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on a single request, connect included.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// [`HttpTransport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given configuration.
    ///
    /// # Errors
    /// Returns [`TransportError::Request`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(
        name = "http_request",
        skip(self, request),
        fields(
            http.method = "POST",
            http.url = %request.url,
            http.status_code = tracing::field::Empty,
        )
    )]
    async fn post_form(&self, request: FormRequest) -> Result<Value, TransportError> {
        let mut builder = self.client.post(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        // Headers first so an explicit Content-Type is not duplicated.
        let response = builder
            .form(&request.form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) if status.is_success() || body.get("error").is_some() => {
                debug!(status = status.as_u16(), "received API envelope");
                Ok(body)
            }
            Ok(_) => Err(TransportError::HttpStatus {
                status: status.as_u16(),
                message: text,
            }),
            Err(_) if !status.is_success() => Err(TransportError::HttpStatus {
                status: status.as_u16(),
                message: text,
            }),
            Err(e) => Err(TransportError::InvalidEnvelope(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(server: &MockServer) -> FormRequest {
        FormRequest {
            url: format!("{}/method/wall.post", server.uri()),
            query: vec![
                ("access_token".into(), "tok".into()),
                ("v".into(), "5.199".into()),
            ],
            headers: vec![
                ("Authorization".into(), "Bearer tok".into()),
                (
                    "Content-Type".into(),
                    "application/x-www-form-urlencoded".into(),
                ),
            ],
            form: vec![
                ("owner_id".into(), "-123".into()),
                ("message".into(), "hello world".into()),
            ],
        }
    }

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn posts_form_body_with_query_and_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/method/wall.post"))
            .and(query_param("access_token", "tok"))
            .and(query_param("v", "5.199"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("owner_id=-123"))
            .and(body_string_contains("message=hello+world"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "response": { "post_id": 7 } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = transport().post_form(request(&server)).await.unwrap();
        assert_eq!(body, json!({ "response": { "post_id": 7 } }));
    }

    #[tokio::test]
    async fn error_envelope_on_non_success_status_is_returned() {
        let server = MockServer::start().await;
        let envelope = json!({
            "error": { "error_code": 5, "error_msg": "User authorization failed" }
        });

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(envelope.clone()))
            .mount(&server)
            .await;

        let body = transport().post_form(request(&server)).await.unwrap();
        assert_eq!(body, envelope);
    }

    #[tokio::test]
    async fn non_success_without_envelope_is_http_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = transport().post_form(request(&server)).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::HttpStatus {
                status: 502,
                message: "bad gateway".into()
            }
        );
    }

    #[tokio::test]
    async fn success_with_non_json_body_is_invalid_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = transport().post_form(request(&server)).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidEnvelope(_)));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let req = FormRequest {
            url: "https://api.vk.com/method/wall.post".into(),
            query: vec![("access_token".into(), "secret".into())],
            headers: vec![("Authorization".into(), "Bearer secret".into())],
            form: vec![],
        };
        let rendered = format!("{req:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
