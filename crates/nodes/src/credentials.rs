//! Credential shape, resolution into request authentication, and the
//! `vkApi` credential type descriptor.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::description::{NodeProperty, PropertyType, TypeOptions};
use crate::NodeError;

/// Name under which the host stores VK credentials.
pub const CREDENTIAL_NAME: &str = "vkApi";

/// API version used when neither the node nor the credential sets one.
pub const DEFAULT_API_VERSION: &str = "5.199";

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

/// Secret material for authenticating against the API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// A long-lived user or community access token.
    BearerToken { access_token: String },
    /// An OAuth2 application; the token is filled in by the host once the
    /// PKCE flow has completed.
    #[serde(rename = "oauth2_client")]
    OAuth2Client {
        client_id: String,
        client_secret: String,
        #[serde(default)]
        access_token: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BearerToken { .. } => f
                .debug_struct("BearerToken")
                .field("access_token", &"<redacted>")
                .finish(),
            Self::OAuth2Client {
                client_id,
                access_token,
                ..
            } => f
                .debug_struct("OAuth2Client")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .field("has_token", &access_token.is_some())
                .finish(),
        }
    }
}

/// Stored `vkApi` credentials: the secret plus the API version to target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VkCredentials {
    #[serde(flatten)]
    pub credential: Credential,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl VkCredentials {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            credential: Credential::BearerToken {
                access_token: access_token.into(),
            },
            api_version: default_api_version(),
        }
    }

    /// Decode the host's raw credential record.
    ///
    /// # Errors
    /// [`NodeError::Credentials`] if the record does not have either shape.
    pub fn from_value(value: Value) -> Result<Self, NodeError> {
        serde_json::from_value(value).map_err(|e| NodeError::Credentials {
            name: CREDENTIAL_NAME.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Authentication applied to every outgoing request.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthDecoration {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl fmt::Debug for AuthDecoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query: Vec<&str> = self.query.iter().map(|(k, _)| k.as_str()).collect();
        let headers: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("AuthDecoration")
            .field("headers", &headers)
            .field("query", &query)
            .finish()
    }
}

impl AuthDecoration {
    fn bearer(token: &str, api_version: &str) -> Self {
        Self {
            headers: vec![("Authorization".to_owned(), format!("Bearer {token}"))],
            query: vec![
                ("access_token".to_owned(), token.to_owned()),
                ("v".to_owned(), api_version.to_owned()),
            ],
        }
    }
}

/// Host-side OAuth2 subsystem that turns an application's client id and
/// secret into an access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        settings: &OAuth2Settings,
    ) -> Result<String, NodeError>;
}

/// Host-side secret store.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Raw credential record stored under `name`.
    async fn credentials(&self, name: &str) -> Result<Value, NodeError>;
}

impl Credential {
    /// Produce the authentication decoration for `api_version`.
    ///
    /// An [`OAuth2Client`](Credential::OAuth2Client) without a token is
    /// exchanged through `exchanger`.
    ///
    /// # Errors
    /// [`NodeError::Credentials`] when a token exchange is needed and no
    /// exchanger is available, or whatever the exchanger returns.
    pub async fn resolve(
        &self,
        api_version: &str,
        exchanger: Option<&dyn TokenExchanger>,
    ) -> Result<AuthDecoration, NodeError> {
        match self {
            Self::BearerToken { access_token } => {
                Ok(AuthDecoration::bearer(access_token, api_version))
            }
            Self::OAuth2Client {
                access_token: Some(token),
                ..
            } => Ok(AuthDecoration::bearer(token, api_version)),
            Self::OAuth2Client {
                client_id,
                client_secret,
                access_token: None,
            } => {
                let exchanger = exchanger.ok_or_else(|| NodeError::Credentials {
                    name: CREDENTIAL_NAME.to_owned(),
                    reason: "OAuth2 client has no token and no token exchanger is configured"
                        .to_owned(),
                })?;
                debug!(client_id = %client_id, "exchanging OAuth2 client credentials");
                let token = exchanger
                    .exchange(client_id, client_secret, &VK_OAUTH2)
                    .await?;
                Ok(AuthDecoration::bearer(&token, api_version))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Credential type descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
    Pkce,
}

/// Where the token endpoint expects a credential field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldLocation {
    #[serde(rename = "in")]
    pub location: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCredentials {
    pub client_id: FieldLocation,
}

/// Provider endpoints and flow options for the host's OAuth2 subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Settings {
    pub auth_url: &'static str,
    pub access_token_url: &'static str,
    pub scope: &'static str,
    pub auth_code_grant_type: GrantType,
    pub token_credentials: TokenCredentials,
}

/// VK ID authorization server settings.
pub const VK_OAUTH2: OAuth2Settings = OAuth2Settings {
    auth_url: "https://id.vk.com/authorize",
    access_token_url: "https://id.vk.com/oauth2/auth",
    scope: "wall",
    auth_code_grant_type: GrantType::Pkce,
    token_credentials: TokenCredentials {
        client_id: FieldLocation { location: "body" },
    },
};

/// Describes the `vkApi` credential type to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialTypeDescription {
    pub name: &'static str,
    pub display_name: &'static str,
    pub authentication: Value,
    pub properties: Vec<NodeProperty>,
}

pub fn credential_type() -> CredentialTypeDescription {
    let mut authentication = json!({ "type": "oauth2" });
    if let (Some(obj), Ok(Value::Object(settings))) =
        (authentication.as_object_mut(), serde_json::to_value(VK_OAUTH2))
    {
        obj.extend(settings);
    }

    CredentialTypeDescription {
        name: CREDENTIAL_NAME,
        display_name: "VK API",
        authentication,
        properties: vec![
            NodeProperty::new("Client ID", "clientId", PropertyType::String, json!(""))
                .description("Client ID from your VK Application settings.")
                .required(),
            NodeProperty::new("Client Secret", "clientSecret", PropertyType::String, json!(""))
                .description(
                    "Client Secret from your VK Application settings (may not be required for PKCE web flow).",
                )
                .type_options(TypeOptions {
                    rows: None,
                    password: Some(true),
                })
                .required(),
            NodeProperty::new(
                "API Version",
                "apiVersion",
                PropertyType::String,
                json!(DEFAULT_API_VERSION),
            )
            .description("The VK API version to use (e.g., 5.199)"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTokenExchanger;

    #[tokio::test]
    async fn bearer_token_yields_header_and_query() {
        let auth = VkCredentials::bearer("tok")
            .credential
            .resolve("5.131", None)
            .await
            .unwrap();

        assert_eq!(
            auth.headers,
            vec![("Authorization".to_owned(), "Bearer tok".to_owned())]
        );
        assert_eq!(
            auth.query,
            vec![
                ("access_token".to_owned(), "tok".to_owned()),
                ("v".to_owned(), "5.131".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn oauth2_client_with_stored_token_skips_exchange() {
        let exchanger = MockTokenExchanger::returning("fresh");
        let credential = Credential::OAuth2Client {
            client_id: "app".into(),
            client_secret: "s3cret".into(),
            access_token: Some("stored".into()),
        };

        let auth = credential.resolve("5.199", Some(&exchanger)).await.unwrap();
        assert_eq!(auth.query[0].1, "stored");
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn oauth2_client_without_token_is_exchanged() {
        let exchanger = MockTokenExchanger::returning("fresh");
        let credential = Credential::OAuth2Client {
            client_id: "app".into(),
            client_secret: "s3cret".into(),
            access_token: None,
        };

        let auth = credential.resolve("5.199", Some(&exchanger)).await.unwrap();
        assert_eq!(
            auth,
            AuthDecoration::bearer("fresh", "5.199"),
            "exchange result is used exactly like a bearer token"
        );
        assert_eq!(exchanger.calls(), vec!["app".to_owned()]);
    }

    #[tokio::test]
    async fn oauth2_client_without_exchanger_is_a_credentials_error() {
        let credential = Credential::OAuth2Client {
            client_id: "app".into(),
            client_secret: "s3cret".into(),
            access_token: None,
        };

        let err = credential.resolve("5.199", None).await.unwrap_err();
        assert!(matches!(err, NodeError::Credentials { .. }));
    }

    #[test]
    fn stored_record_defaults_api_version() {
        let creds = VkCredentials::from_value(json!({
            "type": "bearer_token",
            "access_token": "tok"
        }))
        .unwrap();
        assert_eq!(creds, VkCredentials::bearer("tok"));

        let creds = VkCredentials::from_value(json!({
            "type": "oauth2_client",
            "client_id": "app",
            "client_secret": "s",
            "api_version": "5.131"
        }))
        .unwrap();
        assert_eq!(creds.api_version, "5.131");
    }

    #[test]
    fn unknown_record_shape_is_rejected() {
        let err = VkCredentials::from_value(json!({ "token": "x" })).unwrap_err();
        assert!(matches!(err, NodeError::Credentials { ref name, .. } if name == "vkApi"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", VkCredentials::bearer("very-secret"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn credential_type_describes_pkce_flow() {
        let described = serde_json::to_value(credential_type()).unwrap();
        assert_eq!(described["name"], "vkApi");
        assert_eq!(described["authentication"]["type"], "oauth2");
        assert_eq!(described["authentication"]["authUrl"], "https://id.vk.com/authorize");
        assert_eq!(described["authentication"]["authCodeGrantType"], "pkce");
        assert_eq!(
            described["authentication"]["tokenCredentials"]["clientId"]["in"],
            "body"
        );
        assert_eq!(described["properties"][2]["default"], "5.199");
        assert_eq!(described["properties"][1]["typeOptions"]["password"], true);
    }
}
