//! 基于键值存储的滑动窗口限流
//!
//! 限流器本身无状态，所有记录都保存在外部的 [`KeyValueStore`](crate::cache::KeyValueStore)
//! 中。支持两种策略：
//!
//! - 简单模式：每个窗口内每个标识只接受一次操作，接受的操作会重置窗口
//! - 递增模式：窗口内最多接受 `max_attempts` 次，超出后封禁一段时间
//!
//! 检查与写入是两次独立的存储操作，并发请求在窗口边界可能同时被放行。

pub mod clock;
pub mod error;
pub mod limiter;
pub mod policy;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{RateLimitError, TOO_MANY_REQUESTS};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use policy::{
    EscalatingPolicy, MissingStore, PolicyError, PolicyTable, RateLimitPolicy,
    SlidingWindowPolicy,
};
