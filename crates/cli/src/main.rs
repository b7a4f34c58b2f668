//! `vk-wall-post` CLI entry-point.
//!
//! Plays the host's part for local runs of the VK node:
//! - `post`     — run the node over a JSON file of items.
//! - `validate` — check the items offline, without calling the API.
//! - `describe` — print the node and credential descriptors.

mod host;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vk_nodes::credentials::{credential_type, DEFAULT_API_VERSION};
use vk_nodes::params::Operation;
use vk_nodes::vk::{prepare_wall_post, VK_API_BASE_URL};
use vk_nodes::{
    ExecutableNode, ExecutionContext, ReqwestTransport, TransportConfig, VkCredentials, VkNode,
    VkNodeConfig,
};

use crate::host::{parse_items, LocalCredentials};

#[derive(Parser)]
#[command(
    name = "vk-wall-post",
    about = "Publish VK wall posts from a JSON item file",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node and print the output batch as JSON.
    Post {
        /// Path to the items JSON file.
        path: PathBuf,
        #[arg(long, env = "VK_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "VK_API_VERSION", default_value = DEFAULT_API_VERSION)]
        api_version: String,
        #[arg(long, env = "VK_API_BASE_URL", default_value = VK_API_BASE_URL)]
        api_base_url: String,
        #[arg(long, env = "VK_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,
        /// Record failing items as error data instead of aborting.
        #[arg(long, env = "VK_CONTINUE_ON_FAIL")]
        continue_on_fail: bool,
    },
    /// Validate an items file without sending anything.
    Validate {
        /// Path to the items JSON file.
        path: PathBuf,
    },
    /// Print the node and credential type descriptors.
    Describe,
}

fn read_items(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    parse_items(&content).with_context(|| format!("invalid items file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Post {
            path,
            access_token,
            api_version,
            api_base_url,
            timeout_secs,
            continue_on_fail,
        } => {
            let items = read_items(&path)?;
            info!("Posting {} item(s) from {}", items.len(), path.display());

            let transport = ReqwestTransport::new(&TransportConfig {
                timeout: Duration::from_secs(timeout_secs),
            })?;
            let credentials = VkCredentials {
                api_version,
                ..VkCredentials::bearer(access_token)
            };
            let ctx = ExecutionContext::new(
                items,
                Arc::new(LocalCredentials::new(credentials)),
                Arc::new(transport),
            )
            .with_continue_on_fail(continue_on_fail);

            let node = VkNode::new(VkNodeConfig {
                api_base_url,
                ..VkNodeConfig::default()
            });

            let output = node.execute(&ctx).await.map_err(|err| {
                let at = err
                    .item_index()
                    .map(|i| format!(" at item {i}"))
                    .unwrap_or_default();
                anyhow::Error::new(err).context(format!("execution failed{at}"))
            })?;

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Validate { path } => {
            let items = read_items(&path)?;
            let mut failures = 0usize;

            for (index, item) in items.iter().enumerate() {
                let checked = Operation::from_item(item, index)
                    .and_then(|_| prepare_wall_post(item, index));
                match checked {
                    Ok(body) => println!("✅ item {index}: {}", body.to_json()),
                    Err(e) => {
                        failures += 1;
                        eprintln!("❌ item {index}: {e}");
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{failures} of {} item(s) are invalid", items.len());
            }
        }
        Command::Describe => {
            let described = json!({
                "node": VkNode::default().description(),
                "credential": credential_type(),
            });
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
    }

    Ok(())
}
