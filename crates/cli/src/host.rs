//! Minimal stand-ins for the host services the node expects.

use async_trait::async_trait;
use serde_json::Value;
use vk_nodes::credentials::{CredentialProvider, CREDENTIAL_NAME};
use vk_nodes::{NodeError, VkCredentials};

/// Credentials taken from the command line / environment.
pub struct LocalCredentials {
    record: VkCredentials,
}

impl LocalCredentials {
    pub fn new(record: VkCredentials) -> Self {
        Self { record }
    }
}

#[async_trait]
impl CredentialProvider for LocalCredentials {
    async fn credentials(&self, name: &str) -> Result<Value, NodeError> {
        if name != CREDENTIAL_NAME {
            return Err(NodeError::Credentials {
                name: name.to_owned(),
                reason: "only vkApi credentials are configured".to_owned(),
            });
        }
        serde_json::to_value(&self.record).map_err(|e| NodeError::Credentials {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Parse an items file: a JSON array of parameter objects, or a single
/// object treated as one item.
pub fn parse_items(content: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => Ok(items),
        item @ Value::Object(_) => Ok(vec![item]),
        other => anyhow::bail!("expected an array of items or a single object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_is_one_item() {
        let items = parse_items(r#"{ "message": "hi" }"#).unwrap();
        assert_eq!(items, vec![json!({ "message": "hi" })]);
    }

    #[test]
    fn array_is_kept_in_order() {
        let items = parse_items(r#"[{ "message": "a" }, { "attachments": "photo1_2" }]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["attachments"], "photo1_2");
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(parse_items("42").is_err());
    }

    #[tokio::test]
    async fn local_credentials_round_trip_into_node_shape() {
        let provider = LocalCredentials::new(VkCredentials::bearer("tok"));
        let record = provider.credentials("vkApi").await.unwrap();
        assert_eq!(VkCredentials::from_value(record).unwrap(), VkCredentials::bearer("tok"));

        assert!(provider.credentials("other").await.is_err());
    }
}
