use crate::partition::router::ShardRouter;
use clap::Parser;
use std::net::SocketAddr;

/// Command-line options for one shard process.
#[derive(Parser, Debug, Clone)]
#[command(name = "param-shard")]
pub struct ShardArgs {
    /// HTTP listen address of this shard.
    #[arg(long, env = "PS_BIND")]
    pub bind: SocketAddr,

    /// Position of this shard in `--peer` order.
    #[arg(long, env = "PS_SHARD_INDEX", default_value_t = 0)]
    pub shard_index: u32,

    /// Address of every shard in index order, this one included.
    /// Leave empty to run a single-shard cluster.
    #[arg(long = "peer")]
    pub peers: Vec<SocketAddr>,

    #[arg(long, env = "PS_LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,
}

impl ShardArgs {
    /// Builds the shard router, checking that this shard is part of the peer list.
    pub fn router(&self) -> anyhow::Result<ShardRouter> {
        if self.peers.is_empty() {
            if self.shard_index != 0 {
                anyhow::bail!(
                    "--shard-index {} requires --peer addresses",
                    self.shard_index
                );
            }
            return Ok(ShardRouter::new(0, vec![self.bind]));
        }

        if self.shard_index as usize >= self.peers.len() {
            anyhow::bail!(
                "--shard-index {} is outside the {} configured peers",
                self.shard_index,
                self.peers.len()
            );
        }
        Ok(ShardRouter::new(self.shard_index, self.peers.clone()))
    }
}
