//! Typed view of the per-item parameters of the wall-post operation.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::NodeError;

/// Operations the node supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `wall.post` — publish a post on a user or community wall.
    WallPost,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WallPost => "wallPost",
        }
    }

    /// Read and validate the `operation` parameter of one item.
    ///
    /// A missing value falls back to the field's default, `wallPost`.
    pub fn from_item(item: &Value, item_index: usize) -> Result<Self, NodeError> {
        let name = match item.get("operation") {
            None | Some(Value::Null) => return Ok(Self::WallPost),
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(invalid("operation", expected("a string", other), item_index));
            }
        };

        match name {
            "wallPost" => Ok(Self::WallPost),
            other => Err(NodeError::UnsupportedOperation {
                operation: other.to_owned(),
                item_index,
            }),
        }
    }
}

/// Optional flags of a wall post. `None` means the user never added the
/// field, which is distinct from an explicit `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFields {
    pub from_group: Option<bool>,
    pub friends_only: Option<bool>,
    pub signed: Option<bool>,
    /// Unix timestamp for delayed publication.
    #[serde(default, deserialize_with = "timestamp")]
    pub publish_date: Option<i64>,
    pub mark_as_ads: Option<bool>,
    pub close_comments: Option<bool>,
    pub mute_notifications: Option<bool>,
}

/// Accepts any JSON number. Fractional seconds are truncated toward zero,
/// values outside the `i64` range are rejected.
fn timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(n) = number.as_i64() {
        return Ok(Some(n));
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Some(f.trunc() as i64)),
        _ => Err(D::Error::custom(format!("timestamp {number} is out of range"))),
    }
}

/// Identifies one member of [`AdditionalFields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalField {
    FromGroup,
    FriendsOnly,
    Signed,
    PublishDate,
    MarkAsAds,
    CloseComments,
    MuteNotifications,
}

/// A set additional field, before translation to the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Flag(bool),
    Number(i64),
}

impl AdditionalFields {
    pub fn get(&self, field: AdditionalField) -> Option<FieldValue> {
        use AdditionalField::*;

        match field {
            FromGroup => self.from_group.map(FieldValue::Flag),
            FriendsOnly => self.friends_only.map(FieldValue::Flag),
            Signed => self.signed.map(FieldValue::Flag),
            PublishDate => self.publish_date.map(FieldValue::Number),
            MarkAsAds => self.mark_as_ads.map(FieldValue::Flag),
            CloseComments => self.close_comments.map(FieldValue::Flag),
            MuteNotifications => self.mute_notifications.map(FieldValue::Flag),
        }
    }
}

/// Everything needed to build one `wall.post` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WallPostParams {
    pub owner_id: String,
    pub message: String,
    pub attachments: String,
    pub additional_fields: AdditionalFields,
}

impl WallPostParams {
    /// Read the wall-post parameters from one item's parameter bag.
    ///
    /// # Errors
    /// [`NodeError::InvalidParameter`] if a parameter has the wrong JSON type.
    pub fn from_item(item: &Value, item_index: usize) -> Result<Self, NodeError> {
        let owner_id = match item.get("ownerId") {
            // Owner ids are integers on the wire; accept them unquoted.
            Some(Value::Number(n)) => n.to_string(),
            _ => string_param(item, "ownerId", item_index)?,
        };

        let additional_fields = match item.get("additionalFields") {
            None | Some(Value::Null) => AdditionalFields::default(),
            Some(value) => AdditionalFields::deserialize(value)
                .map_err(|e| invalid("additionalFields", e.to_string(), item_index))?,
        };

        Ok(Self {
            owner_id,
            message: string_param(item, "message", item_index)?,
            attachments: string_param(item, "attachments", item_index)?,
            additional_fields,
        })
    }
}

/// String parameter, defaulting to `""` when absent.
fn string_param(item: &Value, name: &str, item_index: usize) -> Result<String, NodeError> {
    match item.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(name, expected("a string", other), item_index)),
    }
}

fn expected(what: &str, got: &Value) -> String {
    let kind = match got {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("expected {what}, got {kind}")
}

fn invalid(name: &str, reason: String, item_index: usize) -> NodeError {
    NodeError::InvalidParameter {
        name: name.to_owned(),
        reason,
        item_index: Some(item_index),
    }
}
