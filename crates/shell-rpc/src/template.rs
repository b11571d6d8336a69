use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use shell_core::types::Hash256;

/// A block template from the upstream node. Hashes and the target travel
/// as hex strings on the wire; typed accessors parse them at the edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub height: u64,
    /// Previous block hash, 64 hex chars.
    pub prev_block: String,
    /// Raw transactions, hex-serialized.
    #[serde(default)]
    pub transactions: Vec<String>,
    pub coinbase_value: u64,
    /// 256-bit network target, 64 hex chars, big-endian.
    pub target: String,
    pub min_time: i64,
    pub cur_time: i64,
}

impl BlockTemplate {
    pub fn prev_block_hash(&self) -> anyhow::Result<Hash256> {
        Ok(Hash256::from_hex(&self.prev_block)?)
    }

    pub fn target_bytes(&self) -> anyhow::Result<[u8; 32]> {
        Ok(*Hash256::from_hex(&self.target)?.as_bytes())
    }
}

/// Upstream template/submission boundary. The node side is external; the
/// pool and orchestrator only ever see this trait.
pub trait TemplateSource: Send + Sync {
    /// `get_block_template` upstream call.
    fn fetch_template(&self) -> BoxFuture<'_, anyhow::Result<BlockTemplate>>;

    /// `submit_block` upstream call with the serialized block, hex-encoded.
    fn submit_block(&self, block_hex: String) -> BoxFuture<'_, anyhow::Result<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_json_round_trip() {
        let template = BlockTemplate {
            height: 42,
            prev_block: "11".repeat(32),
            transactions: vec!["deadbeef".into()],
            coinbase_value: 95 * 100_000_000,
            target: "ff".repeat(32),
            min_time: 100,
            cur_time: 200,
        };
        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(serde_json::from_str::<BlockTemplate>(&json).unwrap(), template);
    }

    #[test]
    fn typed_accessors_parse_hex() {
        let template = BlockTemplate {
            height: 1,
            prev_block: "22".repeat(32),
            transactions: vec![],
            coinbase_value: 0,
            target: "7f".repeat(32),
            min_time: 0,
            cur_time: 0,
        };
        assert_eq!(
            template.prev_block_hash().unwrap(),
            Hash256::from_bytes([0x22; 32])
        );
        assert_eq!(template.target_bytes().unwrap(), [0x7F; 32]);
    }

    #[test]
    fn malformed_target_is_an_error() {
        let template = BlockTemplate {
            height: 1,
            prev_block: "zz".into(),
            transactions: vec![],
            coinbase_value: 0,
            target: "short".into(),
            min_time: 0,
            cur_time: 0,
        };
        assert!(template.prev_block_hash().is_err());
        assert!(template.target_bytes().is_err());
    }
}
