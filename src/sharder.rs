//! Deterministic bucketing of (client, feature) pairs.

/// Number of buckets a rollout percentage is measured against.
pub const TOTAL_BUCKETS: u64 = 100;

pub trait Sharder {
    /// Map `input` to a stable shard in `[0, total_shards)`.
    fn get_shard(&self, input: &str, total_shards: u64) -> u64;

    /// Rollout bucket of a client for a feature, in `[0, 100)`.
    fn bucket(&self, client_uuid: &str, feature_name: &str) -> u64 {
        self.get_shard(&format!("{client_uuid}-{feature_name}"), TOTAL_BUCKETS)
    }
}

/// Hashes with MD5 and reads the first four bytes big-endian.
///
/// Pure function of the input: no process seed, so buckets survive restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Sharder;

impl Sharder for Md5Sharder {
    fn get_shard(&self, input: &str, total_shards: u64) -> u64 {
        let digest = md5::compute(input);
        let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        u64::from(value) % total_shards
    }
}

#[cfg(test)]
pub struct DeterministicSharder(pub std::collections::HashMap<String, u64>);

#[cfg(test)]
impl Sharder for DeterministicSharder {
    fn get_shard(&self, input: &str, total_shards: u64) -> u64 {
        self.0.get(input).copied().unwrap_or(0) % total_shards
    }
}
