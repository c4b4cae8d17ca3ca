use super::types::{Partition, PartitionTable};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Stable identity of a registered shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ShardId {
    pub index: u32,
    pub addr: SocketAddr,
}

/// Maps partitions to the shards hosting them.
///
/// Placement is the table's round-robin `partition_id mod shard_count`; the
/// router only adds the network identity of each shard index and knows which
/// index is local.
#[derive(Debug, Clone)]
pub struct ShardRouter {
    local_index: u32,
    shards: Vec<ShardId>,
}

impl ShardRouter {
    /// `addrs` are listed in shard-index order.
    pub fn new(local_index: u32, addrs: Vec<SocketAddr>) -> Self {
        let shards = addrs
            .into_iter()
            .enumerate()
            .map(|(index, addr)| ShardId {
                index: index as u32,
                addr,
            })
            .collect();
        Self {
            local_index,
            shards,
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shards.len() as u32
    }

    pub fn local_index(&self) -> u32 {
        self.local_index
    }

    pub fn local(&self) -> Option<&ShardId> {
        self.shards.get(self.local_index as usize)
    }

    pub fn get_owner(&self, table: &PartitionTable, partition_id: u32) -> Option<&ShardId> {
        table.get(partition_id)?;
        self.shards.get(table.shard_index(partition_id) as usize)
    }

    pub fn is_local(&self, table: &PartitionTable, partition_id: u32) -> bool {
        self.get_owner(table, partition_id)
            .map(|owner| owner.index == self.local_index)
            .unwrap_or(false)
    }

    /// Partitions of `table` this shard is responsible for.
    pub fn my_partitions<'a>(&self, table: &'a PartitionTable) -> Vec<&'a Partition> {
        table.partitions_for_shard(self.local_index)
    }
}
