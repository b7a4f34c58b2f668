//! The `ExecutableNode` trait and the host services handed to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::credentials::{CredentialProvider, TokenExchanger};
use crate::description::NodeDescription;
use crate::transport::HttpTransport;
use crate::NodeError;

/// Host services and input for one execution of a node.
///
/// Each entry of `items` is the parameter bag the host resolved for that
/// input item (expressions already evaluated). Services are trait objects so
/// tests can swap in the doubles from [`crate::mock`].
#[derive(Clone)]
pub struct ExecutionContext {
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// Resolved node parameters, one object per input item.
    pub items: Vec<Value>,
    /// When set, item failures become error records instead of aborting.
    pub continue_on_fail: bool,
    pub credentials: Arc<dyn CredentialProvider>,
    pub http: Arc<dyn HttpTransport>,
    /// Host OAuth2 subsystem, if the deployment has one.
    pub oauth2: Option<Arc<dyn TokenExchanger>>,
}

impl ExecutionContext {
    pub fn new(
        items: Vec<Value>,
        credentials: Arc<dyn CredentialProvider>,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            items,
            continue_on_fail: false,
            credentials,
            http,
            oauth2: None,
        }
    }

    pub fn with_continue_on_fail(mut self, enabled: bool) -> Self {
        self.continue_on_fail = enabled;
        self
    }

    pub fn with_token_exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
        self.oauth2 = Some(exchanger);
        self
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Parameter `name` as resolved for item `item_index`.
    pub fn node_parameter(&self, name: &str, item_index: usize) -> Option<&Value> {
        self.items.get(item_index).and_then(|item| item.get(name))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("items", &self.items.len())
            .field("continue_on_fail", &self.continue_on_fail)
            .field("oauth2", &self.oauth2.is_some())
            .finish_non_exhaustive()
    }
}

/// Links an output record back to the input item it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    pub item: usize,
}

/// One record of a node's output, in the host's item convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub json: Value,
    pub paired_item: PairedItem,
}

impl OutputRecord {
    pub fn new(json: Value, item: usize) -> Self {
        Self {
            json,
            paired_item: PairedItem { item },
        }
    }

    /// Error captured as data under continue-on-failure.
    pub fn error(err: &NodeError, item: usize) -> Self {
        Self::new(json!({ "error": err.to_string() }), item)
    }
}

/// Output of one execution: one batch per output connection.
pub type NodeOutput = Vec<Vec<OutputRecord>>;

/// The core node trait.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Schema the host renders for this node type.
    fn description(&self) -> NodeDescription;

    /// Process every input item of `ctx` and return the output batch.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_record_uses_host_field_names() {
        let record = OutputRecord::new(json!({ "post_id": 1 }), 3);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "json": { "post_id": 1 }, "pairedItem": { "item": 3 } })
        );
    }

    #[test]
    fn error_record_carries_message() {
        let record = OutputRecord::error(&NodeError::MissingContent { item_index: 0 }, 0);
        assert_eq!(
            record.json,
            json!({ "error": "Either Message or Attachments must be provided." })
        );
    }
}
