//! The VK node: publishes wall posts through the `wall.post` API method.
//!
//! For every input item the node:
//! 1. Resolves the operation (only `wallPost` exists).
//! 2. Reads the item's parameters and builds the form body.
//! 3. Rejects items with neither message nor attachments, before any I/O.
//! 4. Sends the request through the injected transport.
//! 5. Unwraps `response`, or turns an `error` envelope into
//!    [`NodeError::RemoteApi`].
//!
//! Items run sequentially in index order. Credentials are resolved once per
//! execution, before the first item.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::body::WallPostBody;
use crate::credentials::{AuthDecoration, VkCredentials, CREDENTIAL_NAME, DEFAULT_API_VERSION};
use crate::description::{
    ConnectionType, CredentialRequirement, NodeDefaults, NodeDescription, NodeProperty,
    OptionChoice, PropertyOption, PropertyType, TypeOptions,
};
use crate::params::{Operation, WallPostParams};
use crate::traits::{ExecutableNode, ExecutionContext, NodeOutput, OutputRecord};
use crate::transport::FormRequest;
use crate::{NodeError, TransportError};

/// Base URL of the VK REST API.
pub const VK_API_BASE_URL: &str = "https://api.vk.com/method";

const WALL_POST_METHOD: &str = "wall.post";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment settings for [`VkNode`].
#[derive(Debug, Clone)]
pub struct VkNodeConfig {
    /// Methods are called as `{api_base_url}/{method}`.
    pub api_base_url: String,
    /// Used when neither the node parameter nor the credential names a
    /// version.
    pub default_api_version: String,
}

impl Default for VkNodeConfig {
    fn default() -> Self {
        Self {
            api_base_url: VK_API_BASE_URL.to_owned(),
            default_api_version: DEFAULT_API_VERSION.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct VkNode {
    config: VkNodeConfig,
}

impl VkNode {
    pub fn new(config: VkNodeConfig) -> Self {
        Self { config }
    }

    /// Node parameter `apiVersion` (read from item 0) wins over the
    /// credential's version, which wins over the configured default.
    fn api_version(&self, ctx: &ExecutionContext, creds: &VkCredentials) -> String {
        [
            ctx.node_parameter("apiVersion", 0).and_then(Value::as_str),
            Some(creds.api_version.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .unwrap_or(self.config.default_api_version.as_str())
        .to_owned()
    }

    fn request(&self, method: &str, auth: &AuthDecoration, body: &WallPostBody) -> FormRequest {
        let mut headers = auth.headers.clone();
        headers.push((
            "Content-Type".to_owned(),
            "application/x-www-form-urlencoded".to_owned(),
        ));

        FormRequest {
            url: format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), method),
            query: auth.query.clone(),
            headers,
            form: body.to_form(),
        }
    }

    async fn process_item(
        &self,
        ctx: &ExecutionContext,
        auth: &AuthDecoration,
        item_index: usize,
    ) -> Result<Value, NodeError> {
        let item = &ctx.items[item_index];

        match Operation::from_item(item, item_index)? {
            Operation::WallPost => {
                let body = prepare_wall_post(item, item_index)?;

                debug!(item_index, fields = ?body.keys(), "posting to wall");
                let envelope = ctx
                    .http
                    .post_form(self.request(WALL_POST_METHOD, auth, &body))
                    .await
                    .map_err(|e| NodeError::from(e).at_item(item_index))?;

                unwrap_envelope(envelope, item_index)
            }
        }
    }
}

/// Read one item's parameters and build its `wall.post` body, without any
/// I/O.
///
/// # Errors
/// [`NodeError::InvalidParameter`] for wrongly typed parameters and
/// [`NodeError::MissingContent`] when the body would carry neither message
/// nor attachments.
pub fn prepare_wall_post(item: &Value, item_index: usize) -> Result<WallPostBody, NodeError> {
    let params = WallPostParams::from_item(item, item_index)?;
    let body = WallPostBody::build(&params);

    if !body.has_content() {
        return Err(NodeError::MissingContent { item_index });
    }
    Ok(body)
}

#[derive(Debug, Default, Deserialize)]
struct RemoteError {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Whether an `error` member signals a failure. `null`, `false`, `0` and `""`
/// do not.
fn is_error_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Unwrap `{ "response": .. }`, or map `{ "error": .. }` to
/// [`NodeError::RemoteApi`].
fn unwrap_envelope(mut envelope: Value, item_index: usize) -> Result<Value, NodeError> {
    if let Some(err) = envelope.get("error").filter(|e| is_error_set(e)) {
        let description = err.to_string();
        let remote = RemoteError::deserialize(err).unwrap_or_default();
        let message = if remote.error_msg.is_empty() {
            description.clone()
        } else {
            remote.error_msg
        };
        return Err(NodeError::RemoteApi {
            code: remote.error_code,
            message,
            description,
            item_index,
        });
    }

    match envelope.get_mut("response") {
        Some(response) => Ok(response.take()),
        None => Err(NodeError::from(TransportError::InvalidEnvelope(
            "neither `response` nor `error` present".to_owned(),
        ))
        .at_item(item_index)),
    }
}

#[async_trait]
impl ExecutableNode for VkNode {
    fn description(&self) -> NodeDescription {
        description()
    }

    #[instrument(
        name = "vk_execute",
        skip(self, ctx),
        fields(execution_id = %ctx.execution_id, items = ctx.item_count())
    )]
    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let creds = VkCredentials::from_value(ctx.credentials.credentials(CREDENTIAL_NAME).await?)?;
        let api_version = self.api_version(ctx, &creds);
        let auth = creds
            .credential
            .resolve(&api_version, ctx.oauth2.as_deref())
            .await?;
        info!(api_version = %api_version, "credentials resolved");

        let mut records = Vec::with_capacity(ctx.item_count());

        for item_index in 0..ctx.item_count() {
            match self.process_item(ctx, &auth, item_index).await {
                Ok(json) => records.push(OutputRecord::new(json, item_index)),

                Err(err) if ctx.continue_on_fail => {
                    warn!(item_index, error = %err, "item failed, recording error and continuing");
                    records.push(OutputRecord::error(&err, item_index));
                }

                Err(err) => {
                    error!(item_index, error = %err, "item failed, aborting execution");
                    return Err(err.at_item(item_index));
                }
            }
        }

        info!(records = records.len(), "execution finished");
        Ok(vec![records])
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Schema of the VK node as the host renders it.
pub fn description() -> NodeDescription {
    let on_wall_post = |p: NodeProperty| p.show_when("operation", &["wallPost"]);
    let flag = |display: &'static str, name: &'static str, description: &'static str| {
        PropertyOption::Field(
            NodeProperty::new(display, name, PropertyType::Boolean, json!(false))
                .description(description),
        )
    };

    NodeDescription {
        display_name: "VK",
        name: "vk",
        icon: "file:vk.svg",
        group: vec!["output"],
        version: 1,
        subtitle: r#"={{$parameter["operation"]}}"#,
        description: "Interact with the VK API",
        defaults: NodeDefaults { name: "VK" },
        inputs: vec![ConnectionType::Main],
        outputs: vec![ConnectionType::Main],
        credentials: vec![CredentialRequirement {
            name: CREDENTIAL_NAME,
            required: true,
        }],
        properties: vec![
            NodeProperty::new(
                "Operation",
                "operation",
                PropertyType::Options,
                json!(Operation::WallPost.as_str()),
            )
            .no_data_expression()
            .options(vec![PropertyOption::Choice(OptionChoice {
                name: "Create Post",
                value: Operation::WallPost.as_str(),
                description: "Create a post on a wall",
                action: "Create a post on a wall",
            })]),
            on_wall_post(
                NodeProperty::new("Owner ID", "ownerId", PropertyType::String, json!(""))
                    .description(
                        "User or community ID (negative for communities). If empty, posts on the current user wall.",
                    )
                    .placeholder("-123456"),
            ),
            on_wall_post(
                NodeProperty::new("Message", "message", PropertyType::String, json!(""))
                    .description("Post text. Required if attachments are not set.")
                    .type_options(TypeOptions {
                        rows: Some(5),
                        password: None,
                    }),
            ),
            on_wall_post(
                NodeProperty::new("Attachments", "attachments", PropertyType::String, json!(""))
                    .description(
                        "Comma-separated list of attachments (e.g., photo123_456,video-123_789). Required if message is not set.",
                    )
                    .placeholder("photo123_456,https://example.com"),
            ),
            on_wall_post(
                NodeProperty::new(
                    "Additional Fields",
                    "additionalFields",
                    PropertyType::Collection,
                    json!({}),
                )
                .placeholder("Add Field")
                .options(vec![
                    flag(
                        "From Group",
                        "fromGroup",
                        "Whether to post on behalf of the community (if owner_id is a community)",
                    ),
                    flag(
                        "Friends Only",
                        "friendsOnly",
                        "Whether the post should be visible only to friends",
                    ),
                    flag(
                        "Signed",
                        "signed",
                        "Whether to add the user signature (if posting from group as user)",
                    ),
                    PropertyOption::Field(
                        NodeProperty::new(
                            "Publish Date (Unix Timestamp)",
                            "publishDate",
                            PropertyType::Number,
                            json!(0),
                        )
                        .description(
                            "Unix timestamp for scheduled posting. Set 0 to publish immediately.",
                        ),
                    ),
                    flag(
                        "Mark as Ads",
                        "markAsAds",
                        "Whether to mark the post as advertisement (for community posts)",
                    ),
                    flag(
                        "Close Comments",
                        "closeComments",
                        "Whether to disable comments for the post",
                    ),
                    flag(
                        "Mute Notifications",
                        "muteNotifications",
                        "Whether to disable notifications for the post",
                    ),
                ]),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn envelope_response_is_unwrapped() {
        let value = unwrap_envelope(json!({ "response": { "post_id": 42 } }), 0).unwrap();
        assert_eq!(value, json!({ "post_id": 42 }));
    }

    #[test]
    fn envelope_error_keeps_remote_object_as_description() {
        let err = unwrap_envelope(
            json!({
                "error": {
                    "error_code": 214,
                    "error_msg": "Access to adding post denied",
                    "request_params": []
                }
            }),
            2,
        )
        .unwrap_err();

        match err {
            NodeError::RemoteApi {
                code,
                message,
                description,
                item_index,
            } => {
                assert_eq!(code, 214);
                assert_eq!(message, "Access to adding post denied");
                assert!(description.contains("request_params"));
                assert_eq!(item_index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn falsy_error_members_are_ignored() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!(0.0)] {
            let envelope = json!({ "error": falsy.clone(), "response": { "post_id": 3 } });
            let value = unwrap_envelope(envelope, 0).unwrap();
            assert_eq!(value, json!({ "post_id": 3 }), "error = {falsy}");
        }
    }

    #[test]
    fn truthy_scalar_error_is_a_remote_error() {
        let err = unwrap_envelope(json!({ "error": "flood control" }), 0).unwrap_err();
        match err {
            NodeError::RemoteApi {
                code,
                message,
                description,
                ..
            } => {
                assert_eq!(code, 0);
                assert_eq!(message, "\"flood control\"");
                assert_eq!(description, message);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn envelope_without_either_field_is_malformed() {
        let err = unwrap_envelope(json!({ "ok": true }), 1).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Transport {
                source: TransportError::InvalidEnvelope(_),
                item_index: Some(1)
            }
        ));
    }

    #[test]
    fn descriptor_exposes_single_operation_and_credential() {
        let d = description();
        assert_eq!(d.name, "vk");
        assert_eq!(d.credentials[0].name, "vkApi");

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["properties"][0]["options"][0]["value"], "wallPost");
        assert_eq!(json["properties"][0]["noDataExpression"], true);
        assert_eq!(json["properties"][4]["options"].as_array().unwrap().len(), 7);
        assert_eq!(json["properties"][4]["options"][3]["name"], "publishDate");
        assert_eq!(json["inputs"], json!(["main"]));
    }

    #[test]
    fn operation_fields_are_visible_for_wall_post() {
        let d = description();
        assert_eq!(
            d.visible_properties(&Map::new()),
            vec!["operation", "ownerId", "message", "attachments", "additionalFields"]
        );

        let mut params = Map::new();
        params.insert("operation".into(), json!("other"));
        assert_eq!(d.visible_properties(&params), vec!["operation"]);
    }

    #[test]
    fn prepare_rejects_items_without_content() {
        assert_eq!(
            prepare_wall_post(&json!({ "ownerId": "-1", "message": "" }), 3).unwrap_err(),
            NodeError::MissingContent { item_index: 3 }
        );

        let body = prepare_wall_post(&json!({ "attachments": "photo1_2" }), 0).unwrap();
        assert_eq!(body.keys(), vec!["attachments"]);
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let node = VkNode::new(VkNodeConfig {
            api_base_url: "http://localhost:9000/method/".into(),
            ..VkNodeConfig::default()
        });
        let req = node.request("wall.post", &AuthDecoration::default(), &WallPostBody::default());
        assert_eq!(req.url, "http://localhost:9000/method/wall.post");
        assert_eq!(
            req.header_value("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }
}
