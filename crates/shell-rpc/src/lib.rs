//! shell-rpc
//!
//! Client surface for the upstream full node: `get_block_template` and
//! `submit_block` over JSON-RPC. Both the mining orchestrator and the
//! stratum pool consume templates through the `TemplateSource` trait so
//! tests can substitute a static source.

pub mod client;
pub mod template;

pub use client::NodeRpcClient;
pub use template::{BlockTemplate, TemplateSource};
