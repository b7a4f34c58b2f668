//! Test doubles for the host services a node consumes.
//!
//! Useful in unit and integration tests where a real HTTP endpoint or
//! secret store is either unavailable or irrelevant.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::credentials::{CredentialProvider, OAuth2Settings, TokenExchanger, CREDENTIAL_NAME};
use crate::transport::{FormRequest, HttpTransport};
use crate::{NodeError, TransportError};

/// What `MockTransport` does for one call.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return this JSON body.
    Respond(Value),
    /// Fail with this transport error.
    Fail(TransportError),
}

/// A transport that records every request it receives and answers with
/// programmer-specified results.
///
/// Behaviours are consumed in order; the last one repeats.
pub struct MockTransport {
    behaviours: Mutex<VecDeque<MockBehaviour>>,
    /// All requests seen by this transport (in call order).
    pub calls: Arc<Mutex<Vec<FormRequest>>>,
}

impl MockTransport {
    pub fn sequence(behaviours: Vec<MockBehaviour>) -> Self {
        Self {
            behaviours: Mutex::new(behaviours.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `body`.
    pub fn responding(body: Value) -> Self {
        Self::sequence(vec![MockBehaviour::Respond(body)])
    }

    /// Always answer with a successful envelope wrapping `response`.
    pub fn succeeding(response: Value) -> Self {
        Self::responding(json!({ "response": response }))
    }

    /// Always fail with `err`.
    pub fn failing(err: TransportError) -> Self {
        Self::sequence(vec![MockBehaviour::Fail(err)])
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of requests sent through this transport.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<FormRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_behaviour(&self) -> MockBehaviour {
        let mut queue = self.behaviours.lock().unwrap();
        if queue.len() > 1 {
            if let Some(next) = queue.pop_front() {
                return next;
            }
        }
        queue
            .front()
            .cloned()
            .unwrap_or(MockBehaviour::Respond(Value::Null))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_form(&self, request: FormRequest) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(request);

        match self.next_behaviour() {
            MockBehaviour::Respond(body) => Ok(body),
            MockBehaviour::Fail(err) => Err(err),
        }
    }
}

/// A secret store holding a single `vkApi` record.
pub struct StaticCredentials {
    record: Option<Value>,
}

impl StaticCredentials {
    pub fn new(record: Value) -> Self {
        Self {
            record: Some(record),
        }
    }

    /// A bearer-token record with the default API version.
    pub fn bearer(access_token: &str) -> Self {
        Self::new(json!({ "type": "bearer_token", "access_token": access_token }))
    }

    /// A store with nothing in it.
    pub fn empty() -> Self {
        Self { record: None }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self, name: &str) -> Result<Value, NodeError> {
        match &self.record {
            Some(record) if name == CREDENTIAL_NAME => Ok(record.clone()),
            _ => Err(NodeError::Credentials {
                name: name.to_owned(),
                reason: "no credentials stored".to_owned(),
            }),
        }
    }
}

/// An OAuth2 subsystem that hands out a fixed token and records the client
/// ids it was asked about.
pub struct MockTokenExchanger {
    token: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTokenExchanger {
    pub fn returning(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenExchanger for MockTokenExchanger {
    async fn exchange(
        &self,
        client_id: &str,
        _client_secret: &str,
        _settings: &OAuth2Settings,
    ) -> Result<String, NodeError> {
        self.calls.lock().unwrap().push(client_id.to_owned());
        Ok(self.token.clone())
    }
}
