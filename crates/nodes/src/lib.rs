//! `vk-nodes` crate — the VK wall-post node and the host contract it runs
//! under.
//!
//! The host hands an [`ExecutionContext`] (per-item parameters, secret store,
//! HTTP transport, continue-on-failure flag) to [`ExecutableNode::execute`];
//! [`VkNode`] turns each item into one `wall.post` call.

pub mod body;
pub mod credentials;
pub mod description;
pub mod error;
pub mod mock;
pub mod params;
pub mod traits;
pub mod transport;
pub mod vk;

pub use credentials::{Credential, VkCredentials};
pub use error::{NodeError, TransportError};
pub use traits::{ExecutableNode, ExecutionContext, NodeOutput, OutputRecord};
pub use transport::{HttpTransport, ReqwestTransport, TransportConfig};
pub use vk::{VkNode, VkNodeConfig};
