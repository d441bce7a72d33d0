/// 缓存键模块
/// 提供各种缓存键生成函数

// 限流缓存键模块
pub mod rate_limit_keys;

// 表单缓存键模块
pub mod form_keys;

// 重新导出常用的键生成函数
pub use form_keys::contact_email_index_key;
pub use rate_limit_keys::{DEFAULT_BLOCK_PREFIX, block_key, rate_limit_key};
