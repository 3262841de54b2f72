pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const MAX_MINING_ATTEMPTS: u64 = 1_000_000;
pub const POW_HEX_PREFIX: &str = "000";
pub const MAX_IDENTITY_LEN: usize = 64;
pub const GENESIS_MARKER_SUFFIX: &str = "'s diary";
