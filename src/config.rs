pub const DEFAULT_PORT: u16 = 6480;
pub const DEFAULT_REMOVE_BATCH_SIZE: usize = 5000;
pub const DEFAULT_MAX_REPLY_ARGS: usize = 1024 * 1024;
pub const DEFAULT_MAX_REPLY_BULK_LEN: usize = 512 * 1024 * 1024; // 512 MiB
pub const DEFAULT_MAX_REPLY_LINE_LEN: usize = 64 * 1024;

/// Client settings, read from `KVNS_ZSET_*` environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Candidates sent per `remove_all` script invocation.
    pub remove_batch_size: usize,
    /// `COUNT` hint for `ZSCAN`. `None` leaves the batch size to the store.
    pub scan_count: Option<usize>,
    pub max_reply_args: usize,
    pub max_reply_bulk_len: usize,
    pub max_reply_line_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            remove_batch_size: DEFAULT_REMOVE_BATCH_SIZE,
            scan_count: None,
            max_reply_args: DEFAULT_MAX_REPLY_ARGS,
            max_reply_bulk_len: DEFAULT_MAX_REPLY_BULK_LEN,
            max_reply_line_len: DEFAULT_MAX_REPLY_LINE_LEN,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("KVNS_ZSET_HOST").ok().as_deref(),
            std::env::var("KVNS_ZSET_PORT").ok().as_deref(),
            std::env::var("KVNS_ZSET_REMOVE_BATCH").ok().as_deref(),
            std::env::var("KVNS_ZSET_SCAN_COUNT").ok().as_deref(),
            std::env::var("KVNS_ZSET_MAX_REPLY_ARGS").ok().as_deref(),
            std::env::var("KVNS_ZSET_MAX_REPLY_BULK").ok().as_deref(),
            std::env::var("KVNS_ZSET_MAX_REPLY_LINE").ok().as_deref(),
        )
    }

    fn from_vars(
        host: Option<&str>,
        port: Option<&str>,
        remove_batch: Option<&str>,
        scan_count: Option<&str>,
        max_reply_args: Option<&str>,
        max_reply_bulk: Option<&str>,
        max_reply_line: Option<&str>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            host: host
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.host),
            port: port
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            remove_batch_size: positive(remove_batch).unwrap_or(defaults.remove_batch_size),
            scan_count: positive(scan_count).or(defaults.scan_count),
            max_reply_args: positive(max_reply_args).unwrap_or(defaults.max_reply_args),
            max_reply_bulk_len: positive(max_reply_bulk).unwrap_or(defaults.max_reply_bulk_len),
            max_reply_line_len: positive(max_reply_line).unwrap_or(defaults.max_reply_line_len),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Zero is as unusable as garbage for every size setting.
fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}
