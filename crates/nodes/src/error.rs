//! Node-level error types.

use thiserror::Error;

/// Failures raised by an [`HttpTransport`](crate::transport::HttpTransport).
///
/// Opaque to the node: it is passed through as-is, only annotated with the
/// index of the item that triggered it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status and no API envelope.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The body was not the JSON envelope the API is documented to return.
    #[error("malformed response envelope: {0}")]
    InvalidEnvelope(String),
}

/// Errors returned by a node's `execute` method.
///
/// Item-level variants carry the index of the input item they belong to so
/// the host can point the user at the failing item.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The `operation` parameter names something this node cannot do.
    #[error("The operation \"{operation}\" is not supported.")]
    UnsupportedOperation { operation: String, item_index: usize },

    /// Neither `message` nor `attachments` ended up in the request body.
    #[error("Either Message or Attachments must be provided.")]
    MissingContent { item_index: usize },

    /// The API answered with an `error` envelope.
    #[error("VK API error: {message} (Code: {code})")]
    RemoteApi {
        code: i64,
        message: String,
        /// The remote error object, serialized as JSON.
        description: String,
        item_index: usize,
    },

    /// The HTTP transport failed.
    #[error("{source}")]
    Transport {
        #[source]
        source: TransportError,
        item_index: Option<usize>,
    },

    /// A parameter was present but had the wrong shape.
    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
        item_index: Option<usize>,
    },

    /// Stored credentials could not be read or turned into a token.
    #[error("credentials '{name}' unavailable: {reason}")]
    Credentials { name: String, reason: String },
}

impl NodeError {
    /// Index of the item this error was raised for, if known.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::UnsupportedOperation { item_index, .. }
            | Self::MissingContent { item_index }
            | Self::RemoteApi { item_index, .. } => Some(*item_index),
            Self::Transport { item_index, .. } | Self::InvalidParameter { item_index, .. } => {
                *item_index
            }
            Self::Credentials { .. } => None,
        }
    }

    /// Annotate the error with the failing item's index.
    ///
    /// Variants that already carry an index are overwritten so the value
    /// always reflects the item being processed when the error escaped.
    pub fn at_item(mut self, index: usize) -> Self {
        match &mut self {
            Self::UnsupportedOperation { item_index, .. }
            | Self::MissingContent { item_index }
            | Self::RemoteApi { item_index, .. } => *item_index = index,
            Self::Transport { item_index, .. } | Self::InvalidParameter { item_index, .. } => {
                *item_index = Some(index)
            }
            Self::Credentials { .. } => {}
        }
        self
    }
}

impl From<TransportError> for NodeError {
    fn from(source: TransportError) -> Self {
        Self::Transport {
            source,
            item_index: None,
        }
    }
}
