/// 默认封禁记录键前缀
pub const DEFAULT_BLOCK_PREFIX: &str = "blocked";

/// 生成限流记录键: `{prefix}:{identifier}`
pub fn rate_limit_key(prefix: &str, identifier: &str) -> String {
    format!("{}:{}", prefix, identifier)
}

/// 生成封禁记录键: `{prefix}:{identifier}`，默认前缀为 `blocked`
pub fn block_key(prefix: &str, identifier: &str) -> String {
    format!("{}:{}", prefix, identifier)
}
