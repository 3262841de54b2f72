pub(crate) const SESSION_TOKEN_BYTES: usize = 32;
pub(crate) const MAX_ENTRY_BYTES: usize = 64 * 1024;
pub(crate) const CREDENTIALS_DIR: &str = "passwd";
pub(crate) const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
