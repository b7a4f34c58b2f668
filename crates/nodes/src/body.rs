//! Translation of [`WallPostParams`] into the form body of `wall.post`.

use serde_json::{Map, Value};

use crate::params::{AdditionalField, FieldValue, WallPostParams};

/// How a set additional field is written to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    /// `true`/`false` become `1`/`0`.
    Flag,
    /// Sent only when strictly positive.
    PositiveTimestamp,
}

struct FieldMapping {
    field: AdditionalField,
    wire: &'static str,
    transform: Transform,
}

const FIELD_MAPPINGS: [FieldMapping; 7] = [
    FieldMapping {
        field: AdditionalField::FromGroup,
        wire: "from_group",
        transform: Transform::Flag,
    },
    FieldMapping {
        field: AdditionalField::FriendsOnly,
        wire: "friends_only",
        transform: Transform::Flag,
    },
    FieldMapping {
        field: AdditionalField::Signed,
        wire: "signed",
        transform: Transform::Flag,
    },
    FieldMapping {
        field: AdditionalField::PublishDate,
        wire: "publish_date",
        transform: Transform::PositiveTimestamp,
    },
    FieldMapping {
        field: AdditionalField::MarkAsAds,
        wire: "mark_as_ads",
        transform: Transform::Flag,
    },
    FieldMapping {
        field: AdditionalField::CloseComments,
        wire: "close_comments",
        transform: Transform::Flag,
    },
    FieldMapping {
        field: AdditionalField::MuteNotifications,
        wire: "mute_notifications",
        transform: Transform::Flag,
    },
];

impl Transform {
    fn apply(self, value: FieldValue) -> Option<BodyValue> {
        match (self, value) {
            (Transform::Flag, FieldValue::Flag(b)) => Some(BodyValue::Int(i64::from(b))),
            (Transform::PositiveTimestamp, FieldValue::Number(n)) if n > 0 => {
                Some(BodyValue::Int(n))
            }
            _ => None,
        }
    }
}

/// A single body value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyValue {
    Text(String),
    Int(i64),
}

impl BodyValue {
    fn to_form(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::from(s.as_str()),
            Self::Int(n) => Value::from(*n),
        }
    }
}

/// Ordered key/value body of a `wall.post` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WallPostBody {
    fields: Vec<(&'static str, BodyValue)>,
}

impl WallPostBody {
    /// Build the body from parameters. Empty strings and unset fields are
    /// left out entirely.
    pub fn build(params: &WallPostParams) -> Self {
        let mut fields = Vec::new();

        let texts = [
            ("owner_id", &params.owner_id),
            ("message", &params.message),
            ("attachments", &params.attachments),
        ];
        for (key, value) in texts {
            if !value.is_empty() {
                fields.push((key, BodyValue::Text(value.clone())));
            }
        }

        for mapping in &FIELD_MAPPINGS {
            if let Some(value) = params
                .additional_fields
                .get(mapping.field)
                .and_then(|v| mapping.transform.apply(v))
            {
                fields.push((mapping.wire, value));
            }
        }

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&BodyValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the body carries something to publish.
    pub fn has_content(&self) -> bool {
        self.contains("message") || self.contains("attachments")
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(k, _)| *k).collect()
    }

    /// Pairs ready for form encoding.
    pub fn to_form(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.to_form()))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AdditionalFields;
    use serde_json::json;

    fn params(message: &str, attachments: &str, owner_id: &str) -> WallPostParams {
        WallPostParams {
            owner_id: owner_id.into(),
            message: message.into(),
            attachments: attachments.into(),
            additional_fields: AdditionalFields::default(),
        }
    }

    #[test]
    fn text_fields_are_copied_when_non_empty() {
        let body = WallPostBody::build(&params("hello", "", "-123"));
        assert_eq!(body.to_json(), json!({ "owner_id": "-123", "message": "hello" }));
        assert!(body.has_content());
    }

    #[test]
    fn empty_owner_id_is_omitted() {
        let body = WallPostBody::build(&params("hello", "", ""));
        assert!(!body.contains("owner_id"));
        assert_eq!(body.keys(), vec!["message"]);
    }

    #[test]
    fn empty_strings_do_not_count_as_content() {
        let body = WallPostBody::build(&params("", "", "-1"));
        assert!(!body.has_content());

        let body = WallPostBody::build(&params("", "photo1_2", ""));
        assert!(body.has_content());
    }

    #[test]
    fn unset_flags_are_omitted() {
        let body = WallPostBody::build(&params("hi", "", ""));
        for mapping in &FIELD_MAPPINGS {
            assert!(!body.contains(mapping.wire), "{} should be absent", mapping.wire);
        }
    }

    #[test]
    fn set_flags_are_coerced_to_integers() {
        let mut p = params("hi", "", "");
        p.additional_fields = AdditionalFields {
            from_group: Some(true),
            friends_only: Some(false),
            signed: Some(true),
            publish_date: None,
            mark_as_ads: Some(false),
            close_comments: Some(true),
            mute_notifications: Some(false),
        };

        let body = WallPostBody::build(&p);
        assert_eq!(
            body.to_json(),
            json!({
                "message": "hi",
                "from_group": 1,
                "friends_only": 0,
                "signed": 1,
                "mark_as_ads": 0,
                "close_comments": 1,
                "mute_notifications": 0
            })
        );
    }

    #[test]
    fn publish_date_is_sent_only_when_positive() {
        let mut p = params("hi", "", "");

        p.additional_fields.publish_date = Some(0);
        assert!(!WallPostBody::build(&p).contains("publish_date"));

        p.additional_fields.publish_date = Some(-5);
        assert!(!WallPostBody::build(&p).contains("publish_date"));

        p.additional_fields.publish_date = Some(1_700_000_000);
        assert_eq!(
            WallPostBody::build(&p).get("publish_date"),
            Some(&BodyValue::Int(1_700_000_000))
        );
    }

    #[test]
    fn float_publish_date_is_written_as_whole_seconds() {
        let item = json!({ "message": "hi", "additionalFields": { "publishDate": 1.7e9 } });
        let body = WallPostBody::build(&WallPostParams::from_item(&item, 0).unwrap());
        assert_eq!(body.to_form()[1], ("publish_date".to_owned(), "1700000000".to_owned()));

        let item = json!({ "message": "hi", "additionalFields": { "publishDate": 0.0 } });
        let body = WallPostBody::build(&WallPostParams::from_item(&item, 0).unwrap());
        assert!(!body.contains("publish_date"));
    }

    #[test]
    fn form_pairs_keep_build_order() {
        let mut p = params("hi", "photo1_2,video-3_4", "-9");
        p.additional_fields.signed = Some(true);

        assert_eq!(
            WallPostBody::build(&p).to_form(),
            vec![
                ("owner_id".to_owned(), "-9".to_owned()),
                ("message".to_owned(), "hi".to_owned()),
                ("attachments".to_owned(), "photo1_2,video-3_4".to_owned()),
                ("signed".to_owned(), "1".to_owned()),
            ]
        );
    }
}
