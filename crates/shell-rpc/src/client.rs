use anyhow::Context;
use futures::future::BoxFuture;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use tracing::debug;

use crate::template::{BlockTemplate, TemplateSource};

/// JSON-RPC client for the upstream Shell full node.
pub struct NodeRpcClient {
    client: HttpClient,
    url: String,
}

impl NodeRpcClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .build(url)
            .with_context(|| format!("building RPC client for {url}"))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TemplateSource for NodeRpcClient {
    fn fetch_template(&self) -> BoxFuture<'_, anyhow::Result<BlockTemplate>> {
        Box::pin(async move {
            let template: BlockTemplate = self
                .client
                .request("get_block_template", rpc_params![])
                .await
                .context("get_block_template")?;
            debug!(height = template.height, "fetched block template");
            Ok(template)
        })
    }

    fn submit_block(&self, block_hex: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let accepted: serde_json::Value = self
                .client
                .request("submit_block", rpc_params![block_hex])
                .await
                .context("submit_block")?;
            debug!(%accepted, "block submitted upstream");
            Ok(())
        })
    }
}
